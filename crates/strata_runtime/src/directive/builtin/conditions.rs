//! Argument directives that turn argument values into query conditions.

use crate::directive::{ArgBuilder, DefinedDirective, Directive, DirectiveNode};
use crate::error::SchemaError;
use crate::store::{Condition, Operator, Select};
use serde::Deserialize;
use serde_json::Value;
use std::marker::PhantomData;

/// A fixed comparison operator together with the SDL of its directive.
pub trait ConditionOperator: Send + Sync + 'static {
    const OPERATOR: Operator;
    const DEFINITION: &'static str;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyArgs {
    key: Option<String>,
}

/// Compares the column named by `key` (default: the argument name) with
/// the argument value.
pub struct ConditionDirective<O> {
    node: DirectiveNode,
    key: Option<String>,
    operator: PhantomData<O>,
}

impl<O: ConditionOperator> DefinedDirective for ConditionDirective<O> {
    const DEFINITION: &'static str = O::DEFINITION;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let KeyArgs { key } = node.parse_args()?;
        Ok(Self {
            node,
            key,
            operator: PhantomData,
        })
    }
}

impl<O: ConditionOperator> Directive for ConditionDirective<O> {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_arg_builder(&self) -> Option<&dyn ArgBuilder> {
        Some(self)
    }
}

impl<O: ConditionOperator> ArgBuilder for ConditionDirective<O> {
    fn apply_to_query(&self, select: &mut Select, argument: &str, value: &Value) {
        let column = self.key.as_deref().unwrap_or(argument);
        select.push_condition(Condition::new(column, O::OPERATOR, value.clone()));
    }
}

macro_rules! condition_operator {
    ($marker:ident, $alias:ident, $operator:ident, $definition:expr) => {
        #[derive(Debug)]
        pub struct $marker;

        impl ConditionOperator for $marker {
            const OPERATOR: Operator = Operator::$operator;
            const DEFINITION: &'static str = $definition;
        }

        pub type $alias = ConditionDirective<$marker>;
    };
}

condition_operator!(
    Equals,
    EqDirective,
    Eq,
    r#"
"""
Use an input value as a `=` filter.
"""
directive @eq(
  """
  The column to filter on, if it differs from the argument name.
  """
  key: String
) on ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION
"#
);

condition_operator!(
    NotEquals,
    NeqDirective,
    Neq,
    r#"
"""
Use an input value as a `!=` filter.
"""
directive @neq(
  """
  The column to filter on, if it differs from the argument name.
  """
  key: String
) on ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION
"#
);

condition_operator!(
    Within,
    InDirective,
    In,
    r#"
"""
Use a list of input values as an `IN` filter.
"""
directive @in(
  """
  The column to filter on, if it differs from the argument name.
  """
  key: String
) on ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION
"#
);

condition_operator!(
    NotWithin,
    NotInDirective,
    NotIn,
    r#"
"""
Use a list of input values as a `NOT IN` filter.
"""
directive @notIn(
  """
  The column to filter on, if it differs from the argument name.
  """
  key: String
) on ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION
"#
);

// =============================================================================
// @where
// =============================================================================

fn default_operator() -> String {
    "=".to_string()
}

#[derive(Debug, Deserialize)]
struct WhereArgs {
    #[serde(default = "default_operator")]
    operator: String,
    #[serde(default)]
    key: Option<String>,
}

/// `@where(operator: ">=", key: "votes")`: a condition with any operator.
pub struct WhereDirective {
    node: DirectiveNode,
    operator: Operator,
    key: Option<String>,
}

impl DefinedDirective for WhereDirective {
    const DEFINITION: &'static str = r#"
"""
Use an input value as a filter with a custom operator.
"""
directive @where(
  """
  The operator: `=`, `!=`, `>`, `>=`, `<`, `<=`, `like`, `in` or `not in`.
  """
  operator: String = "="
  """
  The column to filter on, if it differs from the argument name.
  """
  key: String
) on ARGUMENT_DEFINITION | INPUT_FIELD_DEFINITION
"#;

    fn from_node(node: DirectiveNode) -> Result<Self, SchemaError> {
        let args: WhereArgs = node.parse_args()?;
        let operator = Operator::parse(&args.operator).ok_or_else(|| {
            SchemaError::InvalidDirectiveArguments {
                directive: node.name.clone(),
                message: format!("unknown operator `{}`", args.operator),
            }
        })?;
        Ok(Self {
            node,
            operator,
            key: args.key,
        })
    }
}

impl Directive for WhereDirective {
    fn node(&self) -> &DirectiveNode {
        &self.node
    }

    fn as_arg_builder(&self) -> Option<&dyn ArgBuilder> {
        Some(self)
    }
}

impl ArgBuilder for WhereDirective {
    fn apply_to_query(&self, select: &mut Select, argument: &str, value: &Value) {
        let column = self.key.as_deref().unwrap_or(argument);
        select.push_condition(Condition::new(column, self.operator, value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_overrides_argument_name() {
        let directive =
            InDirective::from_node(DirectiveNode::new("in").with_argument("key", json!("id")))
                .unwrap();
        let mut select = Select::new("users");
        directive.apply_to_query(&mut select, "ids", &json!([1, 2]));
        assert_eq!(
            select.conditions,
            vec![Condition::new("id", Operator::In, json!([1, 2]))]
        );
    }

    #[test]
    fn test_where_operator() {
        let node = DirectiveNode::new("where").with_argument("operator", json!(">="));
        let directive = WhereDirective::from_node(node).unwrap();
        let mut select = Select::new("posts");
        directive.apply_to_query(&mut select, "votes", &json!(3));
        assert_eq!(select.conditions[0].operator, Operator::Gte);
        assert_eq!(select.conditions[0].column, "votes");

        let node = DirectiveNode::new("where").with_argument("operator", json!("~"));
        assert!(WhereDirective::from_node(node).is_err());

        let default = WhereDirective::from_node(DirectiveNode::new("where")).unwrap();
        assert_eq!(default.operator, Operator::Eq);
    }
}
