//! Namespaced class registries and name-casing helpers.
//!
//! Resolvers, scalars, type resolvers and directives are all registered
//! under a qualified name (`App.GraphQL.Queries.Users`) and looked up by
//! short name across an ordered list of namespaces.

use indexmap::IndexMap;

/// Classes registered under qualified names.
#[derive(Debug, Clone)]
pub struct ClassRegistry<T> {
    classes: IndexMap<String, T>,
}

impl<T> Default for ClassRegistry<T> {
    fn default() -> Self {
        Self {
            classes: IndexMap::new(),
        }
    }
}

impl<T> ClassRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `class` in `namespace`, replacing an earlier registration.
    pub fn register(&mut self, namespace: &str, class: &str, value: T) {
        self.classes.insert(qualify(namespace, class), value);
    }

    /// Registers a value under an already qualified name.
    pub fn insert(&mut self, qualified: impl Into<String>, value: T) {
        self.classes.insert(qualified.into(), value);
    }

    pub fn get(&self, qualified: &str) -> Option<&T> {
        self.classes.get(qualified)
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.classes.contains_key(qualified)
    }

    /// Finds `class` in the first namespace that has it.
    pub fn find<'a, I, S>(&'a self, namespaces: I, class: &str) -> Option<(String, &'a T)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        namespaces.into_iter().find_map(|namespace| {
            let qualified = qualify(namespace.as_ref(), class);
            let value = self.classes.get(&qualified)?;
            Some((qualified, value))
        })
    }

    /// Classes registered directly in `namespace`, as `(class, value)`.
    pub fn in_namespace<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = (&'a str, &'a T)> {
        self.classes.iter().filter_map(move |(qualified, value)| {
            let (ns, class) = split_qualified(qualified);
            (ns == namespace).then_some((class, value))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Joins a namespace and a class name.
pub fn qualify(namespace: &str, class: &str) -> String {
    if namespace.is_empty() {
        class.to_string()
    } else {
        format!("{namespace}.{class}")
    }
}

/// Splits `A.B.C` into `("A.B", "C")`.
pub fn split_qualified(qualified: &str) -> (&str, &str) {
    match qualified.rfind('.') {
        Some(index) => (&qualified[..index], &qualified[index + 1..]),
        None => ("", qualified),
    }
}

/// `hasMany`, `has_many` and `has-many` all become `HasMany`.
pub fn studly_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper = true;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            upper = true;
        } else if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// `postsCount` becomes `posts_count`.
pub fn snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut previous_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if previous_lower {
                result.push('_');
            }
            result.extend(c.to_lowercase());
            previous_lower = false;
        } else {
            previous_lower = c.is_lowercase() || c.is_ascii_digit();
            result.push(c);
        }
    }
    result
}

/// `HasMany` becomes `hasMany`.
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casing() {
        assert_eq!(studly_case("hasMany"), "HasMany");
        assert_eq!(studly_case("convert_empty_strings_to_null"), "ConvertEmptyStringsToNull");
        assert_eq!(snake_case("firstName"), "first_name");
        assert_eq!(snake_case("postsCount"), "posts_count");
        assert_eq!(snake_case("id"), "id");
        assert_eq!(snake_case("ID"), "id");
        assert_eq!(lcfirst("BelongsToMany"), "belongsToMany");
    }

    #[test]
    fn test_find_respects_namespace_order() {
        let mut registry = ClassRegistry::new();
        registry.register("Strata.Directives", "AllDirective", 1);
        registry.register("App.Directives", "AllDirective", 2);

        let (qualified, value) = registry
            .find(["App.Directives", "Strata.Directives"], "AllDirective")
            .unwrap();
        assert_eq!(qualified, "App.Directives.AllDirective");
        assert_eq!(*value, 2);

        assert!(registry.find(["Other"], "AllDirective").is_none());
        assert_eq!(
            registry.in_namespace("Strata.Directives").collect::<Vec<_>>(),
            vec![("AllDirective", &1)]
        );
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("App.Models.User"), ("App.Models", "User"));
        assert_eq!(split_qualified("User"), ("", "User"));
    }
}
