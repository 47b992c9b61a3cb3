//! Type registry.
//!
//! Executable types are materialized from the schema document on first
//! lookup and cached for the lifetime of the schema. Object and interface
//! fields sit behind thunks, so building a type never builds the types its
//! fields refer to.

use crate::ast_convert::{convert_arguments, convert_type, deprecation_reason};
use crate::context::Context;
use crate::directive::Capability;
use crate::error::{ResolverError, SchemaError};
use crate::introspection;
use crate::namespace::studly_case;
use crate::node::{ArgBuilders, FieldValue, TypeValue};
use crate::resolver::{default_field_resolver, into_field_resolver, FieldResolverFn};
use crate::scalars::{standard_scalar, Scalar, BUILTIN_SCALAR_NAMESPACE, STANDARD_SCALARS};
use crate::schema::BuildContext;
use crate::store::{basename, MODEL_KEY};
use crate::types::{
    AbstractResolver, EnumType, EnumValue, ExecutableField, ExecutableType, FieldMap,
    InputObjectType, InterfaceType, ObjectType, ScalarType, Thunk, UnionType,
};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use strata_syntax as ast;

/// Builds a type registered with [`TypeRegistry::register_lazy`].
pub type TypeFactory =
    Arc<dyn Fn(&TypeRegistry) -> Result<ExecutableType, SchemaError> + Send + Sync>;

struct RegistryInner {
    context: Arc<BuildContext>,
    /// Materialized types; `None` marks a name confirmed absent.
    types: RwLock<FxHashMap<String, Option<Arc<ExecutableType>>>>,
    lazy: RwLock<IndexMap<String, TypeFactory>>,
    /// Eagerly registered types, in registration order.
    registered: RwLock<Vec<String>>,
    possible: Mutex<Option<IndexMap<String, Arc<ExecutableType>>>>,
    document_scans: AtomicUsize,
}

#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Result<TypeRegistry, SchemaError> {
        self.0
            .upgrade()
            .map(|inner| TypeRegistry { inner })
            .ok_or_else(|| SchemaError::internal("the type registry was dropped"))
    }
}

/// Materializes and caches the executable types of one schema.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct TypeRegistry {
    inner: Arc<RegistryInner>,
}

impl TypeRegistry {
    pub fn new(context: Arc<BuildContext>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                context,
                types: RwLock::new(FxHashMap::default()),
                lazy: RwLock::new(IndexMap::new()),
                registered: RwLock::new(Vec::new()),
                possible: Mutex::new(None),
                document_scans: AtomicUsize::new(0),
            }),
        }
    }

    /// A handle that does not keep the registry alive, for closures stored
    /// in the registry's own types.
    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    pub fn context(&self) -> &Arc<BuildContext> {
        &self.inner.context
    }

    /// How often the schema document was searched for a type definition.
    pub fn document_scans(&self) -> usize {
        self.inner.document_scans.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the type named `name`, building it on first access.
    pub fn get(&self, name: &str) -> Result<Arc<ExecutableType>, SchemaError> {
        self.search(name)?
            .ok_or_else(|| SchemaError::unknown_type(name))
    }

    /// Like [`get`](Self::get), but `Ok(None)` for unknown names.
    ///
    /// Absent names are cached too, so a second search for the same name
    /// does not scan the document again.
    pub fn search(&self, name: &str) -> Result<Option<Arc<ExecutableType>>, SchemaError> {
        if let Some(cached) = self.inner.types.read().get(name) {
            return Ok(cached.clone());
        }

        let built = self.materialize(name)?.map(Arc::new);
        let mut types = self.inner.types.write();
        Ok(types.entry(name.to_string()).or_insert(built).clone())
    }

    /// Whether `name` can be resolved, without building it.
    pub fn has_type(&self, name: &str) -> bool {
        if let Some(cached) = self.inner.types.read().get(name) {
            return cached.is_some();
        }
        STANDARD_SCALARS.contains(&name)
            || self.inner.lazy.read().contains_key(name)
            || self.find_definition(name).is_some()
    }

    fn find_definition(&self, name: &str) -> Option<&ast::TypeDefinition> {
        self.inner.document_scans.fetch_add(1, Ordering::Relaxed);
        self.inner.context.document.type_definition(name)
    }

    fn materialize(&self, name: &str) -> Result<Option<ExecutableType>, SchemaError> {
        let factory = self.inner.lazy.read().get(name).cloned();
        if let Some(factory) = factory {
            tracing::debug!(type_name = name, "building lazily registered type");
            return factory(self).map(Some);
        }
        if let Some(definition) = self.find_definition(name) {
            tracing::debug!(type_name = name, kind = definition.kind(), "building type");
            return self.build(definition.clone()).map(Some);
        }
        Ok(standard_scalar(name).map(|implementation| {
            ExecutableType::Scalar(ScalarType {
                name: name.to_string(),
                description: None,
                implementation,
            })
        }))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    fn is_taken(&self, name: &str) -> bool {
        matches!(self.inner.types.read().get(name), Some(Some(_)))
            || self.inner.lazy.read().contains_key(name)
            || self.find_definition(name).is_some()
    }

    /// Adds a prebuilt type.
    pub fn register(&self, ty: ExecutableType) -> Result<(), SchemaError> {
        if self.is_taken(ty.name()) {
            return Err(SchemaError::DuplicateType {
                name: ty.name().to_string(),
            });
        }
        self.overwrite(ty);
        Ok(())
    }

    /// Adds a type built on first lookup.
    pub fn register_lazy<F>(&self, name: &str, factory: F) -> Result<(), SchemaError>
    where
        F: Fn(&TypeRegistry) -> Result<ExecutableType, SchemaError> + Send + Sync + 'static,
    {
        if self.is_taken(name) {
            return Err(SchemaError::DuplicateType {
                name: name.to_string(),
            });
        }
        self.overwrite_lazy(name, factory);
        Ok(())
    }

    /// Adds a prebuilt type, replacing any type of the same name.
    pub fn overwrite(&self, ty: ExecutableType) {
        let name = ty.name().to_string();
        {
            let mut registered = self.inner.registered.write();
            if !registered.contains(&name) {
                registered.push(name.clone());
            }
        }
        self.inner.types.write().insert(name, Some(Arc::new(ty)));
        *self.inner.possible.lock() = None;
    }

    /// Adds a lazily built type, replacing any type of the same name.
    pub fn overwrite_lazy<F>(&self, name: &str, factory: F)
    where
        F: Fn(&TypeRegistry) -> Result<ExecutableType, SchemaError> + Send + Sync + 'static,
    {
        self.inner.types.write().remove(name);
        self.inner
            .lazy
            .write()
            .insert(name.to_string(), Arc::new(factory));
        *self.inner.possible.lock() = None;
    }

    /// Every type of the schema: document types, lazily registered types,
    /// eagerly registered types and the standard scalars.
    pub fn possible_types(&self) -> Result<IndexMap<String, Arc<ExecutableType>>, SchemaError> {
        if let Some(types) = self.inner.possible.lock().as_ref() {
            return Ok(types.clone());
        }

        let mut names: Vec<String> = self
            .inner
            .context
            .document
            .type_definitions()
            .map(|definition| definition.name().to_string())
            .collect();
        names.extend(self.inner.lazy.read().keys().cloned());
        names.extend(self.inner.registered.read().iter().cloned());
        names.extend(STANDARD_SCALARS.iter().map(|name| (*name).to_string()));

        let mut types = IndexMap::new();
        for name in names {
            if !types.contains_key(&name) {
                let ty = self.get(&name)?;
                types.insert(name, ty);
            }
        }
        tracing::debug!(count = types.len(), "materialized every type");
        *self.inner.possible.lock() = Some(types.clone());
        Ok(types)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Builds a type definition: type middleware first, then an exclusive
    /// type resolver directive if there is one, else the rule of its kind.
    pub fn build(&self, definition: ast::TypeDefinition) -> Result<ExecutableType, SchemaError> {
        let cx = self.context();
        let mut value = TypeValue::new(definition);

        for directive in cx
            .locator
            .associated_of_type(value.directives(), Capability::TypeMiddleware)?
        {
            if let Some(middleware) = directive.as_type_middleware() {
                middleware.handle_type(&mut value, cx)?;
            }
        }

        let resolver = cx.locator.exclusive_of_type(
            value.directives(),
            Capability::TypeResolver,
            value.name(),
        )?;
        if let Some(directive) = resolver {
            if let Some(resolver) = directive.as_type_resolver() {
                return resolver.resolve_type(&value, self);
            }
        }
        self.build_default(&value)
    }

    /// Builds a type by the rule of its kind, ignoring type resolver
    /// directives.
    pub fn build_default(&self, value: &TypeValue) -> Result<ExecutableType, SchemaError> {
        let cx = self.context();
        let name = value.name().to_string();
        let description = value.definition().description().map(str::to_string);

        Ok(match value.definition() {
            ast::TypeDefinition::Object(definition) => ExecutableType::Object(ObjectType {
                name: name.clone(),
                description,
                interfaces: names(&definition.implements),
                fields: self.fields_thunk(value),
                model: value
                    .model()
                    .map(str::to_string)
                    .or_else(|| cx.catalog.get(&name).map(|model| model.name.clone())),
            }),
            ast::TypeDefinition::Interface(definition) => {
                ExecutableType::Interface(InterfaceType {
                    name: name.clone(),
                    description,
                    interfaces: names(&definition.implements),
                    fields: self.fields_thunk(value),
                    resolver: self.conventional_resolver(&cx.config.namespaces.interfaces, &name),
                })
            }
            ast::TypeDefinition::Union(definition) => ExecutableType::Union(UnionType {
                name: name.clone(),
                description,
                members: names(&definition.members),
                resolver: self.conventional_resolver(&cx.config.namespaces.unions, &name),
            }),
            ast::TypeDefinition::Enum(definition) => {
                let mut values = IndexMap::new();
                for enum_value in &definition.values {
                    let name = enum_value.name.value.clone();
                    let internal = cx
                        .locator
                        .associated_of_type(&enum_value.directives, Capability::EnumValue)?
                        .iter()
                        .find_map(|directive| directive.as_enum_value().map(|d| d.value()))
                        .unwrap_or_else(|| Value::String(name.clone()));
                    values.insert(
                        name.clone(),
                        EnumValue {
                            name,
                            value: internal,
                            description: enum_value.description.clone(),
                            deprecation_reason: deprecation_reason(&enum_value.directives),
                        },
                    );
                }
                ExecutableType::Enum(EnumType {
                    name,
                    description,
                    values,
                })
            }
            ast::TypeDefinition::Scalar(_) => ExecutableType::Scalar(ScalarType {
                implementation: self.scalar_implementation(value)?,
                name,
                description,
            }),
            ast::TypeDefinition::InputObject(definition) => {
                let lookup = |type_name: &str| self.has_type(type_name);
                ExecutableType::InputObject(InputObjectType {
                    name,
                    description,
                    fields: convert_arguments(&definition.fields, &lookup)?,
                })
            }
        })
    }

    /// A type resolver class named like the abstract type, if registered.
    fn conventional_resolver(&self, namespaces: &[String], name: &str) -> AbstractResolver {
        self.context()
            .type_resolvers
            .find(namespaces, name)
            .map_or(AbstractResolver::Fallback, |(_, resolver)| {
                AbstractResolver::Custom(Arc::clone(resolver))
            })
    }

    fn scalar_implementation(
        &self,
        value: &TypeValue,
    ) -> Result<Arc<dyn Scalar>, SchemaError> {
        let cx = self.context();
        let class = cx
            .locator
            .exclusive_of_type(value.directives(), Capability::Scalar, value.name())?
            .and_then(|directive| {
                directive
                    .as_scalar()
                    .map(|scalar| scalar.implementation_class().to_string())
            })
            .unwrap_or_else(|| value.name().to_string());

        if let Some(standard) = standard_scalar(&class) {
            return Ok(standard);
        }

        let mut namespaces = cx.config.namespaces.scalars.clone();
        namespaces.push(BUILTIN_SCALAR_NAMESPACE.to_string());
        let found = if class.contains('.') {
            cx.scalars.get(&class).cloned()
        } else {
            cx.scalars
                .find(&namespaces, &class)
                .map(|(_, scalar)| Arc::clone(scalar))
        };
        found.ok_or_else(|| SchemaError::UnresolvableScalar {
            name: value.name().to_string(),
            class,
            namespaces: namespaces.join(", "),
        })
    }

    fn fields_thunk(&self, value: &TypeValue) -> Thunk<FieldMap> {
        let registry = self.downgrade();
        let parent = Arc::new(value.clone());
        Thunk::new(move || {
            let definitions = parent.definition().fields().unwrap_or_default().to_vec();
            Ok(definitions
                .into_iter()
                .map(|definition| {
                    let registry = registry.clone();
                    let parent = Arc::clone(&parent);
                    let name = definition.name.value.clone();
                    let field = Thunk::new(move || {
                        registry.upgrade()?.build_field(&parent, &definition)
                    });
                    (name, field)
                })
                .collect())
        })
    }

    /// Builds one output field: arguments, base resolver, then middleware.
    fn build_field(
        &self,
        parent: &Arc<TypeValue>,
        definition: &ast::FieldDefinition,
    ) -> Result<ExecutableField, SchemaError> {
        let cx = self.context();
        let lookup = |name: &str| self.has_type(name);
        let ty = convert_type(&definition.ty, &lookup)?;
        let arguments = convert_arguments(&definition.arguments, &lookup)?;

        if parent.name().starts_with("__") {
            let resolver = introspection::field_resolver(parent.name(), &definition.name.value, self)
                .unwrap_or_else(default_field_resolver);
            return Ok(ExecutableField {
                name: definition.name.value.clone(),
                description: definition.description.clone(),
                ty,
                arguments,
                resolver,
                deprecation_reason: deprecation_reason(&definition.directives),
            });
        }

        let mut arg_builders = ArgBuilders::new();
        for argument in &definition.arguments {
            for directive in cx
                .locator
                .associated_of_type(&argument.directives, Capability::ArgBuilder)?
            {
                arg_builders.push(argument.name.value.clone(), directive);
            }
        }

        let root = cx.roots.operation_of(parent.name());
        let field = FieldValue::new(Arc::clone(parent), definition.clone(), ty.clone(), root)
            .with_arg_builders(arg_builders);

        let mut resolver = self.base_resolver(&field)?;

        let mut middleware = Vec::new();
        for name in &cx.config.global_field_middleware {
            middleware.push(cx.locator.create(name)?);
        }
        middleware.extend(
            cx.locator
                .associated_of_type(field.directives(), Capability::FieldMiddleware)?,
        );
        // The first declared middleware ends up outermost and runs first.
        for directive in middleware.iter().rev() {
            if let Some(wrapper) = directive.as_field_middleware() {
                resolver = wrapper.wrap(&field, resolver, cx)?;
            }
        }

        tracing::trace!(field = %field.node_name(), middleware = middleware.len(), "built field");
        Ok(ExecutableField {
            name: definition.name.value.clone(),
            description: definition.description.clone(),
            ty,
            arguments,
            resolver,
            deprecation_reason: deprecation_reason(&definition.directives),
        })
    }

    fn base_resolver(&self, field: &FieldValue) -> Result<FieldResolverFn, SchemaError> {
        let cx = self.context();
        let node = field.node_name();
        let exclusive =
            cx.locator
                .exclusive_of_type(field.directives(), Capability::FieldResolver, &node)?;
        if let Some(directive) = exclusive {
            if let Some(resolver) = directive.as_field_resolver() {
                return resolver.resolve_field(field, cx);
            }
        }

        let Some(operation) = field.root_operation() else {
            return Ok(default_field_resolver());
        };
        let class = studly_case(field.name());
        let namespaces = cx.config.namespaces.for_operation(operation);
        if let Some((qualified, resolver)) = cx.resolvers.find(namespaces, &class) {
            tracing::trace!(field = %node, class = %qualified, "resolver found by convention");
            return Ok(into_field_resolver(Arc::clone(resolver)));
        }
        Err(SchemaError::MissingResolver {
            type_name: field.parent_name().to_string(),
            field: field.name().to_string(),
            help: format!(
                "Add a resolver directive such as @field or @all to the field, \
                 or register a resolver class `{class}` in one of [{}].",
                namespaces.join(", ")
            ),
        })
    }

    // =========================================================================
    // Abstract types
    // =========================================================================

    /// Object types that belong to an interface or union.
    pub fn members(&self, abstract_type: &ExecutableType) -> Result<Vec<Arc<ExecutableType>>, SchemaError> {
        match abstract_type {
            ExecutableType::Union(union) => union
                .members
                .iter()
                .map(|member| self.get(member))
                .collect(),
            ExecutableType::Interface(interface) => Ok(self
                .possible_types()?
                .into_values()
                .filter(|ty| {
                    matches!(ty.as_ref(), ExecutableType::Object(_))
                        && ty.interfaces().iter().any(|name| *name == interface.name)
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Whether `object` is a possible type of `abstract_type`.
    pub fn is_member(&self, abstract_type: &ExecutableType, object: &ExecutableType) -> bool {
        match abstract_type {
            ExecutableType::Union(union) => union.members.iter().any(|m| m == object.name()),
            ExecutableType::Interface(interface) => {
                object.interfaces().iter().any(|name| *name == interface.name)
            }
            ExecutableType::Object(ty) => ty.name == object.name(),
            _ => false,
        }
    }

    /// Picks the concrete object type of `value`.
    pub fn resolve_abstract(
        &self,
        abstract_type: &ExecutableType,
        value: &Value,
        context: &Context,
    ) -> Result<Arc<ExecutableType>, ResolverError> {
        let name = match abstract_type.abstract_resolver() {
            Some(AbstractResolver::Custom(resolver)) => {
                resolver.resolve_type(value, context, abstract_type.name())?
            }
            _ => self.fallback_type_name(abstract_type, value)?,
        };
        let resolved = self.get(&name)?;
        if !matches!(resolved.as_ref(), ExecutableType::Object(_))
            || !self.is_member(abstract_type, &resolved)
        {
            return Err(ResolverError::custom(format!(
                "Abstract type {} must resolve to an object type at runtime. Received \"{name}\".",
                abstract_type.name()
            )));
        }
        Ok(resolved)
    }

    /// `__typename`, then the model mapping of the member types, then the
    /// basename of the model.
    fn fallback_type_name(
        &self,
        abstract_type: &ExecutableType,
        value: &Value,
    ) -> Result<String, ResolverError> {
        if let Some(typename) = value.get("__typename").and_then(Value::as_str) {
            return Ok(typename.to_string());
        }

        if let Some(model) = value.get(MODEL_KEY).and_then(Value::as_str) {
            let members = self.members(abstract_type)?;
            let mapped: Vec<&str> = members
                .iter()
                .filter(|member| match member.as_ref() {
                    ExecutableType::Object(object) => object.model.as_deref() == Some(model),
                    _ => false,
                })
                .map(|member| member.name())
                .collect();
            match mapped.as_slice() {
                [single] => return Ok((*single).to_string()),
                [] => {}
                _ => {
                    return Err(SchemaError::AmbiguousAbstractType {
                        abstract_type: abstract_type.name().to_string(),
                        candidates: mapped.join(", "),
                    }
                    .into())
                }
            }

            let base = basename(model);
            if members.iter().any(|member| member.name() == base) {
                return Ok(base.to_string());
            }
        }

        Err(ResolverError::custom(format!(
            "Could not resolve the concrete type of a value of the abstract type {}.",
            abstract_type.name()
        )))
    }
}

fn names(names: &[ast::Name]) -> Vec<String> {
    names.iter().map(|name| name.value.clone()).collect()
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.inner.types.read().len())
            .field("lazy", &self.inner.lazy.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::store::Model;
    use serde_json::json;

    fn schema(sdl: &str) -> Schema {
        Schema::builder()
            .sdl(sdl)
            .model(Model::new("User", "users"))
            .model(Model::new("Post", "posts"))
            .build()
            .unwrap()
    }

    const BLOG: &str = r#"
        type Query { users: [User!]! @all search: [SearchResult!]! @all(model: "User") }
        type User implements Node { id: ID! friends: [User!]! }
        type Post implements Node { id: ID! }
        interface Node { id: ID! }
        union SearchResult = User | Post
        enum Status { ACTIVE @enum(value: 1) GONE @deprecated(reason: "gone") }
    "#;

    #[test]
    fn test_get_returns_cached_identity() {
        let schema = schema(BLOG);
        let registry = schema.registry();
        let first = registry.get("User").unwrap();
        let second = registry.get("User").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            registry.get("Nope").unwrap_err(),
            SchemaError::unknown_type("Nope")
        );
    }

    #[test]
    fn test_search_caches_absent_names() {
        let schema = schema(BLOG);
        let registry = schema.registry();
        assert!(registry.search("Ghost").unwrap().is_none());
        let scans = registry.document_scans();
        assert!(registry.search("Ghost").unwrap().is_none());
        assert_eq!(registry.document_scans(), scans);
        assert!(!registry.has_type("Ghost"));
        assert_eq!(registry.document_scans(), scans);
    }

    #[test]
    fn test_self_referential_fields_are_lazy() {
        let schema = schema(BLOG);
        let user = schema.registry().get("User").unwrap();
        let ExecutableType::Object(object) = user.as_ref() else {
            panic!("expected an object type");
        };
        assert!(!object.fields.is_evaluated());
        let friends = user.field("friends").unwrap().unwrap();
        assert_eq!(friends.ty.to_string(), "[User!]!");
        assert_eq!(object.model.as_deref(), Some("User"));
    }

    #[test]
    fn test_enum_values() {
        let schema = schema(BLOG);
        let status = schema.registry().get("Status").unwrap();
        let ExecutableType::Enum(status) = status.as_ref() else {
            panic!("expected an enum type");
        };
        assert_eq!(status.values["ACTIVE"].value, json!(1));
        assert_eq!(status.values["GONE"].value, json!("GONE"));
        assert_eq!(status.values["GONE"].deprecation_reason.as_deref(), Some("gone"));
    }

    #[test]
    fn test_duplicate_registration() {
        let schema = schema(BLOG);
        let registry = schema.registry();
        let error = registry
            .register_lazy("User", |registry| {
                Ok(ExecutableType::Scalar(ScalarType {
                    name: "User".into(),
                    description: None,
                    implementation: standard_scalar("String")
                        .ok_or_else(|| SchemaError::internal("no String scalar"))?,
                }))
            })
            .unwrap_err();
        assert_eq!(error, SchemaError::DuplicateType { name: "User".into() });

        registry
            .register_lazy("Color", |_| {
                Ok(ExecutableType::Enum(EnumType {
                    name: "Color".into(),
                    description: None,
                    values: IndexMap::new(),
                }))
            })
            .unwrap();
        assert!(registry.has_type("Color"));
        assert!(registry.possible_types().unwrap().contains_key("Color"));
    }

    #[test]
    fn test_abstract_fallback_chain() {
        let schema = schema(BLOG);
        let registry = schema.registry();
        let context = Context::default();
        let node = registry.get("Node").unwrap();
        let search = registry.get("SearchResult").unwrap();

        let by_typename = registry
            .resolve_abstract(&node, &json!({"__typename": "Post"}), &context)
            .unwrap();
        assert_eq!(by_typename.name(), "Post");

        let by_model = registry
            .resolve_abstract(&search, &json!({"__model": "User"}), &context)
            .unwrap();
        assert_eq!(by_model.name(), "User");

        let by_basename = registry
            .resolve_abstract(&search, &json!({"__model": "App.Models.Post"}), &context)
            .unwrap();
        assert_eq!(by_basename.name(), "Post");

        assert!(registry
            .resolve_abstract(&search, &json!({"id": 1}), &context)
            .is_err());
    }

    #[test]
    fn test_ambiguous_model_mapping() {
        let schema = schema(
            r#"
            type Query { people: [Person!]! @all(model: "User") }
            type User { id: ID! }
            type Admin @model(class: "User") { id: ID! }
            union Person = User | Admin
            "#,
        );
        let registry = schema.registry();
        let person = registry.get("Person").unwrap();
        let error = registry
            .resolve_abstract(&person, &json!({"__model": "User"}), &Context::default())
            .unwrap_err();
        assert!(matches!(
            error,
            ResolverError::Schema(SchemaError::AmbiguousAbstractType { .. })
        ));
    }

    #[test]
    fn test_unresolvable_scalar() {
        let schema = schema("type Query { at: Moment @field(resolver: \"Now\") } scalar Moment");
        let error = schema.registry().get("Moment").unwrap_err();
        assert!(matches!(
            error,
            SchemaError::UnresolvableScalar { ref class, .. } if class == "Moment"
        ));
    }
}
