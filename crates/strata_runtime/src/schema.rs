//! Schema construction.
//!
//! [`SchemaBuilder`] collects SDL sources and the classes the schema refers
//! to (directives, resolvers, type resolvers, scalars, models), prepares
//! the schema document and hands it to a fresh [`TypeRegistry`].

use crate::config::StrataConfig;
use crate::context::{Context, Services};
use crate::directive::builtin::register_builtin_directives;
use crate::directive::{DirectiveClass, DirectiveLocator};
use crate::error::SchemaError;
use crate::manipulator::{parse_sdl, AstBuilder};
use crate::namespace::ClassRegistry;
use crate::registry::{TypeFactory, TypeRegistry};
use crate::resolver::Resolver;
use crate::scalars::{register_builtin_scalars, Scalar};
use crate::store::{DataStore, MemoryStore, Model, ModelCatalog};
use crate::types::{ExecutableType, TypeResolver};
use std::sync::Arc;
use strata_syntax::{self as ast, OperationType};

/// Everything type construction needs, shared by the registry and every
/// closure it builds.
pub struct BuildContext {
    pub config: Arc<StrataConfig>,
    pub catalog: Arc<ModelCatalog>,
    pub locator: DirectiveLocator,
    pub resolvers: ClassRegistry<Arc<dyn Resolver>>,
    pub type_resolvers: ClassRegistry<Arc<dyn TypeResolver>>,
    pub scalars: ClassRegistry<Arc<dyn Scalar>>,
    /// The prepared schema document.
    pub document: ast::Document,
    pub roots: RootTypes,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("locator", &self.locator)
            .field("roots", &self.roots)
            .field("definitions", &self.document.definitions.len())
            .finish_non_exhaustive()
    }
}

/// Names of the root operation types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTypes {
    pub query: String,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
}

impl RootTypes {
    /// Roots declared by a `schema` definition, else the conventional
    /// `Query`, `Mutation` and `Subscription` types that exist.
    pub fn from_document(document: &ast::Document) -> Self {
        if let Some(schema) = document.schema_definition() {
            let declared = |operation: OperationType| {
                schema
                    .operations
                    .iter()
                    .find(|(declared, _)| *declared == operation)
                    .map(|(_, name)| name.value.clone())
            };
            return Self {
                query: declared(OperationType::Query)
                    .unwrap_or_else(|| OperationType::Query.default_type_name().to_string()),
                mutation: declared(OperationType::Mutation),
                subscription: declared(OperationType::Subscription),
            };
        }

        let conventional = |operation: OperationType| {
            let name = operation.default_type_name();
            document
                .type_definition(name)
                .map(|_| name.to_string())
        };
        Self {
            query: OperationType::Query.default_type_name().to_string(),
            mutation: conventional(OperationType::Mutation),
            subscription: conventional(OperationType::Subscription),
        }
    }

    /// The operation a type is the root of, if any.
    pub fn operation_of(&self, type_name: &str) -> Option<OperationType> {
        if self.query == type_name {
            Some(OperationType::Query)
        } else if self.mutation.as_deref() == Some(type_name) {
            Some(OperationType::Mutation)
        } else if self.subscription.as_deref() == Some(type_name) {
            Some(OperationType::Subscription)
        } else {
            None
        }
    }

    pub fn name_of(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => Some(&self.query),
            OperationType::Mutation => self.mutation.as_deref(),
            OperationType::Subscription => self.subscription.as_deref(),
        }
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    sources: Vec<String>,
    config: StrataConfig,
    directives: ClassRegistry<DirectiveClass>,
    plugin_namespaces: Vec<String>,
    resolvers: ClassRegistry<Arc<dyn Resolver>>,
    type_resolvers: ClassRegistry<Arc<dyn TypeResolver>>,
    scalars: ClassRegistry<Arc<dyn Scalar>>,
    catalog: ModelCatalog,
    store: Option<Arc<dyn DataStore>>,
    lazy_types: Vec<(String, TypeFactory)>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a builder with the built-in directives and scalars
    /// registered.
    pub fn new() -> Self {
        let mut directives = ClassRegistry::new();
        register_builtin_directives(&mut directives);
        let mut scalars = ClassRegistry::new();
        register_builtin_scalars(&mut scalars);

        Self {
            sources: Vec::new(),
            config: StrataConfig::default(),
            directives,
            plugin_namespaces: Vec::new(),
            resolvers: ClassRegistry::new(),
            type_resolvers: ClassRegistry::new(),
            scalars,
            catalog: ModelCatalog::new(),
            store: None,
            lazy_types: Vec::new(),
        }
    }

    /// Adds an SDL source. Sources are concatenated in order.
    pub fn sdl(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn config(mut self, config: StrataConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a directive class, e.g. `("App.GraphQL.Directives",
    /// "UpperDirective", class)` for `@upper`.
    pub fn directive(mut self, namespace: &str, class: &str, directive: DirectiveClass) -> Self {
        self.directives.register(namespace, class, directive);
        self
    }

    /// Adds a namespace searched for directives after the user namespaces.
    pub fn plugin_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.plugin_namespaces.push(namespace.into());
        self
    }

    /// Registers a resolver class under a qualified name such as
    /// `App.GraphQL.Queries.Users`.
    pub fn resolver<R: Resolver + 'static>(mut self, qualified: &str, resolver: R) -> Self {
        self.resolvers.insert(qualified, Arc::new(resolver));
        self
    }

    pub fn type_resolver<R: TypeResolver + 'static>(mut self, qualified: &str, resolver: R) -> Self {
        self.type_resolvers.insert(qualified, Arc::new(resolver));
        self
    }

    pub fn scalar<S: Scalar + 'static>(mut self, qualified: &str, scalar: S) -> Self {
        self.scalars.insert(qualified, Arc::new(scalar));
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.catalog.register(model);
        self
    }

    /// The store relation and model resolvers read from. Defaults to an
    /// empty [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registers a type built on first lookup instead of from the document.
    pub fn lazy_type<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&TypeRegistry) -> Result<ExecutableType, SchemaError> + Send + Sync + 'static,
    {
        let factory: TypeFactory = Arc::new(factory);
        self.lazy_types.push((name.into(), factory));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut document = ast::Document::default();
        for source in &self.sources {
            document.definitions.extend(parse_sdl(source)?.definitions);
        }

        let locator = DirectiveLocator::new(
            self.directives,
            self.config.namespaces.directives.as_slice(),
            self.plugin_namespaces.as_slice(),
        );
        let document = AstBuilder::new(&locator, &self.config).build(document)?;
        for name in &self.config.global_field_middleware {
            locator.resolve(name)?;
        }

        let roots = RootTypes::from_document(&document);
        let config = Arc::new(self.config);
        let catalog = Arc::new(self.catalog);
        let context = Arc::new(BuildContext {
            config: Arc::clone(&config),
            catalog: Arc::clone(&catalog),
            locator,
            resolvers: self.resolvers,
            type_resolvers: self.type_resolvers,
            scalars: self.scalars,
            document,
            roots,
        });

        let registry = TypeRegistry::new(Arc::clone(&context));
        for (name, factory) in self.lazy_types {
            registry.register_lazy(&name, move |registry: &TypeRegistry| factory(registry))?;
        }
        registry.get(&context.roots.query)?;

        tracing::info!(
            query = %context.roots.query,
            mutation = ?context.roots.mutation,
            "schema built"
        );
        Ok(Schema {
            registry,
            services: Arc::new(Services {
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                catalog,
                config,
            }),
        })
    }
}

/// A built schema. Cloning is cheap.
#[derive(Clone)]
pub struct Schema {
    registry: TypeRegistry,
    services: Arc<Services>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn config(&self) -> &StrataConfig {
        &self.services.config
    }

    pub fn roots(&self) -> &RootTypes {
        &self.registry.context().roots
    }

    /// The root type of an operation, `None` if the schema has none.
    pub fn root_type(
        &self,
        operation: OperationType,
    ) -> Result<Option<Arc<ExecutableType>>, SchemaError> {
        match self.roots().name_of(operation) {
            Some(name) => self.registry.search(name),
            None => Ok(None),
        }
    }

    /// The prepared schema document as SDL.
    pub fn sdl(&self) -> String {
        strata_syntax::print(&self.registry.context().document)
    }

    /// Builds every type and every field, surfacing errors that would
    /// otherwise only show up when a field is first resolved.
    pub fn assert_valid(&self) -> Result<(), SchemaError> {
        for ty in self.registry.possible_types()?.values() {
            if let Some(fields) = ty.fields()? {
                for field in fields.values() {
                    field.get()?;
                }
            }
        }
        Ok(())
    }

    /// A fresh context for one request.
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.services))
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("roots", self.roots())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FnResolver;
    use crate::types::{FieldMap, ObjectType, Thunk};
    use serde_json::json;

    #[test]
    fn test_conventional_roots() {
        let document = parse_sdl("type Query { a: Int } type Mutation { b: Int }").unwrap();
        let roots = RootTypes::from_document(&document);
        assert_eq!(roots.query, "Query");
        assert_eq!(roots.mutation.as_deref(), Some("Mutation"));
        assert_eq!(roots.subscription, None);
        assert_eq!(roots.operation_of("Mutation"), Some(OperationType::Mutation));
        assert_eq!(roots.operation_of("User"), None);
    }

    #[test]
    fn test_declared_roots() {
        let document =
            parse_sdl("schema { query: Root mutation: Change } type Root { a: Int }").unwrap();
        let roots = RootTypes::from_document(&document);
        assert_eq!(roots.query, "Root");
        assert_eq!(roots.name_of(OperationType::Mutation), Some("Change"));
    }

    #[test]
    fn test_root_field_without_resolver_fails_validation() {
        let schema = Schema::builder()
            .sdl("type Query { users: [String!]! }")
            .build()
            .unwrap();
        let error = schema.assert_valid().unwrap_err();
        assert!(matches!(
            error,
            SchemaError::MissingResolver { ref type_name, ref field, .. }
                if type_name == "Query" && field == "users"
        ));
    }

    #[test]
    fn test_resolver_found_by_convention() {
        let schema = Schema::builder()
            .sdl("type Query { latestNews: String }")
            .resolver(
                "App.GraphQL.Queries.LatestNews",
                FnResolver::new(|_, _, _, _| Ok(json!("hello"))),
            )
            .build()
            .unwrap();
        schema.assert_valid().unwrap();
    }

    #[test]
    fn test_unknown_field_type_is_reported() {
        let schema = Schema::builder()
            .sdl("type Query { a: Int @field(resolver: \"A\") } type User { pet: Pet }")
            .resolver("App.GraphQL.Queries.A", FnResolver::new(|_, _, _, _| Ok(json!(1))))
            .build()
            .unwrap();
        assert_eq!(schema.assert_valid().unwrap_err(), SchemaError::unknown_type("Pet"));
    }

    #[test]
    fn test_lazy_type_is_registered() {
        let schema = Schema::builder()
            .sdl("type Query { a: Int @field(resolver: \"A\") }")
            .resolver("App.GraphQL.Queries.A", FnResolver::new(|_, _, _, _| Ok(json!(1))))
            .lazy_type("Extra", |_| {
                Ok(ExecutableType::Object(ObjectType {
                    name: "Extra".into(),
                    description: None,
                    interfaces: Vec::new(),
                    fields: Thunk::ready(FieldMap::new()),
                    model: None,
                }))
            })
            .build()
            .unwrap();
        assert!(schema.registry().has_type("Extra"));
        assert_eq!(schema.registry().get("Extra").unwrap().name(), "Extra");
        assert!(schema.registry().possible_types().unwrap().contains_key("Extra"));
    }

    #[test]
    fn test_sdl_includes_used_directives() {
        let schema = Schema::builder()
            .sdl("type Query { users: [User!]! @all } type User { id: ID! }")
            .model(Model::new("User", "users"))
            .build()
            .unwrap();
        let sdl = schema.sdl();
        assert!(sdl.contains("directive @all"));
        assert!(sdl.contains("type __Schema"));
        assert!(schema.root_type(OperationType::Mutation).unwrap().is_none());
    }
}
