//! Scalar implementations.
//!
//! The five standard scalars are always available. Custom scalars are
//! resolved by class name from the scalar namespaces; `Strata.Scalars`
//! ships `JSON` and `Date`.

use crate::error::ResolverError;
use crate::namespace::ClassRegistry;
use serde_json::Value;
use std::sync::Arc;

/// Namespace of the scalars shipped with the runtime.
pub const BUILTIN_SCALAR_NAMESPACE: &str = "Strata.Scalars";

/// Names of the standard scalars.
pub const STANDARD_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Serialization and input parsing of a scalar type.
pub trait Scalar: Send + Sync {
    /// Converts a resolved value for the response.
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError>;

    /// Validates and converts an input value (literal or variable).
    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError>;
}

fn invalid(scalar: &str, value: &Value) -> ResolverError {
    ResolverError::custom(format!("{scalar} cannot represent value: {value}"))
}

#[derive(Debug, Default)]
pub struct IntScalar;

impl Scalar for IntScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i32::MAX as f64)
                .map(|f| Value::from(f as i64))
                .ok_or_else(|| invalid("Int", value)),
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("Int", value)),
            _ => Err(invalid("Int", value)),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            _ => Err(invalid("Int", value)),
        }
    }
}

#[derive(Debug, Default)]
pub struct FloatScalar;

impl Scalar for FloatScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                .ok_or_else(|| invalid("Float", value)),
            _ => Err(invalid("Float", value)),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Number(_) => Ok(value.clone()),
            _ => Err(invalid("Float", value)),
        }
    }
}

#[derive(Debug, Default)]
pub struct StringScalar;

impl Scalar for StringScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid("String", value)),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(invalid("String", value)),
        }
    }
}

#[derive(Debug, Default)]
pub struct BooleanScalar;

impl Scalar for BooleanScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            _ => Err(invalid("Boolean", value)),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(invalid("Boolean", value)),
        }
    }
}

/// Serialized as a string; accepts strings and integers as input.
#[derive(Debug, Default)]
pub struct IdScalar;

impl Scalar for IdScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err(invalid("ID", value)),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err(invalid("ID", value)),
        }
    }
}

/// Arbitrary JSON, passed through unchanged.
#[derive(Debug, Default)]
pub struct JsonScalar;

impl Scalar for JsonScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        Ok(value.clone())
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        Ok(value.clone())
    }
}

/// A calendar date written as `YYYY-MM-DD`.
#[derive(Debug, Default)]
pub struct DateScalar;

impl DateScalar {
    fn check(value: &Value) -> Result<Value, ResolverError> {
        let text = value.as_str().ok_or_else(|| invalid("Date", value))?;
        let date = text.get(..10).unwrap_or(text);
        let mut parts = date.splitn(3, '-');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(y), Some(m), Some(d)) => {
                y.len() == 4
                    && y.parse::<u16>().is_ok()
                    && m.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
                    && d.parse::<u8>().is_ok_and(|d| (1..=31).contains(&d))
            }
            _ => false,
        };
        if valid {
            Ok(Value::String(date.to_string()))
        } else {
            Err(invalid("Date", value))
        }
    }
}

impl Scalar for DateScalar {
    fn serialize(&self, value: &Value) -> Result<Value, ResolverError> {
        Self::check(value)
    }

    fn parse_value(&self, value: &Value) -> Result<Value, ResolverError> {
        Self::check(value)
    }
}

/// The implementation of a standard scalar.
pub fn standard_scalar(name: &str) -> Option<Arc<dyn Scalar>> {
    match name {
        "Int" => Some(Arc::new(IntScalar)),
        "Float" => Some(Arc::new(FloatScalar)),
        "String" => Some(Arc::new(StringScalar)),
        "Boolean" => Some(Arc::new(BooleanScalar)),
        "ID" => Some(Arc::new(IdScalar)),
        _ => None,
    }
}

pub fn is_standard_scalar(name: &str) -> bool {
    STANDARD_SCALARS.contains(&name)
}

/// Registers the scalars shipped with the runtime.
pub fn register_builtin_scalars(registry: &mut ClassRegistry<Arc<dyn Scalar>>) {
    registry.register(BUILTIN_SCALAR_NAMESPACE, "JSON", Arc::new(JsonScalar));
    registry.register(BUILTIN_SCALAR_NAMESPACE, "Date", Arc::new(DateScalar));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_coercion() {
        assert_eq!(IntScalar.serialize(&json!(3.0)).unwrap(), json!(3));
        assert_eq!(IntScalar.serialize(&json!("12")).unwrap(), json!(12));
        assert!(IntScalar.serialize(&json!(3.5)).is_err());
        assert!(IntScalar.parse_value(&json!("12")).is_err());
    }

    #[test]
    fn test_id_accepts_integers() {
        assert_eq!(IdScalar.serialize(&json!(7)).unwrap(), json!("7"));
        assert_eq!(IdScalar.parse_value(&json!(7)).unwrap(), json!("7"));
        assert!(IdScalar.parse_value(&json!(true)).is_err());
    }

    #[test]
    fn test_date() {
        assert_eq!(
            DateScalar.serialize(&json!("2024-02-29 10:00:00")).unwrap(),
            json!("2024-02-29")
        );
        assert!(DateScalar.parse_value(&json!("2024-13-01")).is_err());
        assert!(DateScalar.parse_value(&json!(20240101)).is_err());
    }

    #[test]
    fn test_builtin_registration() {
        let mut registry = ClassRegistry::new();
        register_builtin_scalars(&mut registry);
        assert!(registry.contains("Strata.Scalars.JSON"));
        assert!(standard_scalar("ID").is_some());
        assert!(standard_scalar("JSON").is_none());
    }
}
