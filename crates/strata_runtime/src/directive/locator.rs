use super::{Capability, Directive, DirectiveClass, DirectiveNode};
use crate::error::SchemaError;
use crate::namespace::{lcfirst, studly_case, ClassRegistry};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use strata_syntax as ast;

/// Namespace of the directives shipped with the runtime.
pub const BUILTIN_DIRECTIVE_NAMESPACE: &str = "Strata.Directives";

/// Directives handled by type construction and execution themselves.
pub const NATIVE_DIRECTIVES: [&str; 4] = ["deprecated", "skip", "include", "specifiedBy"];

const CLASS_SUFFIX: &str = "Directive";

/// Resolves directive names to directive classes.
///
/// Namespaces are searched in priority order: user namespaces, then plugin
/// namespaces, then the built-in namespace. A directive named `hasMany` is
/// implemented by a class named `HasManyDirective`; the first namespace
/// holding such a class wins, so user classes shadow built-ins.
pub struct DirectiveLocator {
    classes: ClassRegistry<DirectiveClass>,
    namespaces: Vec<String>,
    resolved: Mutex<FxHashMap<String, Option<DirectiveClass>>>,
}

impl DirectiveLocator {
    pub fn new<S: AsRef<str>>(
        classes: ClassRegistry<DirectiveClass>,
        user_namespaces: &[S],
        plugin_namespaces: &[S],
    ) -> Self {
        let mut namespaces: Vec<String> = Vec::new();
        for namespace in user_namespaces.iter().chain(plugin_namespaces) {
            let namespace = namespace.as_ref();
            if namespace != BUILTIN_DIRECTIVE_NAMESPACE
                && !namespaces.iter().any(|n| n == namespace)
            {
                namespaces.push(namespace.to_string());
            }
        }
        namespaces.push(BUILTIN_DIRECTIVE_NAMESPACE.to_string());

        Self {
            classes,
            namespaces,
            resolved: Mutex::new(FxHashMap::default()),
        }
    }

    /// Namespaces in search order; the built-in namespace is always last.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// The conventional class name of a directive: `hasMany` -> `HasManyDirective`.
    pub fn class_name(directive: &str) -> String {
        format!("{}{CLASS_SUFFIX}", studly_case(directive))
    }

    /// Every directive reachable by short name, first namespace winning.
    pub fn classes(&self) -> IndexMap<String, DirectiveClass> {
        let mut classes = IndexMap::new();
        for namespace in &self.namespaces {
            for (class, directive) in self.classes.in_namespace(namespace) {
                let Some(stem) = class.strip_suffix(CLASS_SUFFIX) else {
                    continue;
                };
                classes
                    .entry(lcfirst(stem))
                    .or_insert_with(|| directive.clone());
            }
        }
        classes
    }

    /// Resolves a directive name to its class, caching the outcome.
    pub fn resolve(&self, name: &str) -> Result<DirectiveClass, SchemaError> {
        if let Some(cached) = self.resolved.lock().get(name) {
            return cached.clone().ok_or_else(|| self.unknown(name));
        }

        let class = Self::class_name(name);
        let found = self
            .classes
            .find(&self.namespaces, &class)
            .map(|(qualified, directive)| {
                tracing::trace!(directive = name, class = %qualified, "resolved directive");
                directive.clone()
            });
        self.resolved.lock().insert(name.to_string(), found.clone());
        found.ok_or_else(|| self.unknown(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    fn unknown(&self, name: &str) -> SchemaError {
        SchemaError::UnknownDirective {
            name: name.to_string(),
            class: Self::class_name(name),
            namespaces: self.namespaces.join(", "),
        }
    }

    /// Creates an instance with no arguments.
    pub fn create(&self, name: &str) -> Result<Arc<dyn Directive>, SchemaError> {
        self.resolve(name)?.instantiate(DirectiveNode::new(name))
    }

    /// Creates an instance bound to a directive usage.
    pub fn hydrate(&self, directive: &ast::Directive) -> Result<Arc<dyn Directive>, SchemaError> {
        self.resolve(&directive.name.value)?
            .instantiate(DirectiveNode::from_ast(directive))
    }

    /// Instances of every directive attached to a node, in declaration order.
    pub fn associated(
        &self,
        directives: &[ast::Directive],
    ) -> Result<Vec<Arc<dyn Directive>>, SchemaError> {
        directives
            .iter()
            .filter(|directive| !NATIVE_DIRECTIVES.contains(&directive.name.as_str()))
            .map(|directive| self.hydrate(directive))
            .collect()
    }

    pub fn associated_of_type(
        &self,
        directives: &[ast::Directive],
        capability: Capability,
    ) -> Result<Vec<Arc<dyn Directive>>, SchemaError> {
        Ok(self
            .associated(directives)?
            .into_iter()
            .filter(|directive| capability.implemented_by(directive.as_ref()))
            .collect())
    }

    /// The single directive of an exclusive capability, if any.
    pub fn exclusive_of_type(
        &self,
        directives: &[ast::Directive],
        capability: Capability,
        node: &str,
    ) -> Result<Option<Arc<dyn Directive>>, SchemaError> {
        let mut matches = self.associated_of_type(directives, capability)?;
        if matches.len() > 1 {
            return Err(SchemaError::MultipleExclusiveDirectives {
                node: node.to_string(),
                capability: capability.to_string(),
                directives: matches
                    .iter()
                    .map(|directive| format!("@{}", directive.name()))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(matches.pop())
    }

    /// SDL definitions of every reachable directive.
    pub fn definitions(&self) -> Result<Vec<ast::DirectiveDefinition>, SchemaError> {
        self.classes()
            .values()
            .map(DirectiveClass::parsed_definition)
            .collect()
    }
}

impl std::fmt::Debug for DirectiveLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveLocator")
            .field("namespaces", &self.namespaces)
            .field("classes", &self.classes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::builtin::register_builtin_directives;
    use crate::directive::{DefinedDirective, FieldResolverDirective};
    use crate::node::FieldValue;
    use crate::resolver::{default_field_resolver, FieldResolverFn};
    use crate::schema::BuildContext;

    struct CustomAll {
        node: DirectiveNode,
    }

    impl Directive for CustomAll {
        fn node(&self) -> &DirectiveNode {
            &self.node
        }

        fn as_field_resolver(&self) -> Option<&dyn FieldResolverDirective> {
            Some(self)
        }
    }

    impl FieldResolverDirective for CustomAll {
        fn resolve_field(
            &self,
            _field: &FieldValue,
            _cx: &BuildContext,
        ) -> Result<FieldResolverFn, SchemaError> {
            Ok(default_field_resolver())
        }
    }

    impl DefinedDirective for CustomAll {
        const DEFINITION: &'static str = "directive @all on FIELD_DEFINITION";

        fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
            Ok(Self { node })
        }
    }

    fn locator(user: &[&str]) -> DirectiveLocator {
        let mut classes = ClassRegistry::new();
        register_builtin_directives(&mut classes);
        classes.register("App.Directives", "AllDirective", DirectiveClass::of::<CustomAll>());
        DirectiveLocator::new(classes, user, &["Plugin.Directives"])
    }

    fn field_directives(sdl: &str) -> Vec<ast::Directive> {
        let parsed = strata_syntax::parse(sdl);
        let directives = parsed.document.type_definitions().next().unwrap().fields().unwrap()[0]
            .directives
            .clone();
        directives
    }

    #[test]
    fn test_builtin_namespace_sorts_last() {
        let locator = locator(&["Strata.Directives", "App.Directives"]);
        assert_eq!(
            locator.namespaces(),
            &["App.Directives", "Plugin.Directives", "Strata.Directives"]
        );
    }

    #[test]
    fn test_user_namespace_shadows_builtin() {
        let shadowed = locator(&["App.Directives"]).classes();
        assert_eq!(shadowed["all"].definition(), CustomAll::DEFINITION);
        assert!(shadowed.contains_key("hasMany"));

        let plain = locator(&[]).classes();
        assert_ne!(plain["all"].definition(), CustomAll::DEFINITION);
    }

    #[test]
    fn test_unknown_directive() {
        let error = locator(&[]).create("nope").err().unwrap();
        assert!(matches!(
            error,
            SchemaError::UnknownDirective { ref class, .. } if class == "NopeDirective"
        ));
        // cached negative result gives the same error
        assert!(locator(&[]).create("nope").is_err());
    }

    #[test]
    fn test_exclusive_directives_are_named() {
        let locator = locator(&[]);
        let directives = field_directives("type Query { users: [User] @all @field(resolver: \"Users\") }");
        let error = locator
            .exclusive_of_type(&directives, Capability::FieldResolver, "Query.users")
            .err()
            .unwrap();
        assert_eq!(
            error,
            SchemaError::MultipleExclusiveDirectives {
                node: "Query.users".into(),
                capability: "FieldResolver".into(),
                directives: "@all, @field".into(),
            }
        );
    }

    #[test]
    fn test_associated_keeps_order_and_skips_native() {
        let locator = locator(&[]);
        let directives =
            field_directives("type Query { users(name: String): [User] @trim @deprecated @all }");
        let names: Vec<String> = locator
            .associated(&directives)
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["trim", "all"]);

        let middleware = locator
            .associated_of_type(&directives, Capability::FieldMiddleware)
            .unwrap();
        assert_eq!(middleware.len(), 1);
    }

    #[test]
    fn test_definitions_parse() {
        let definitions = locator(&[]).definitions().unwrap();
        assert!(definitions.iter().any(|d| d.name.value == "hasMany"));
    }
}
