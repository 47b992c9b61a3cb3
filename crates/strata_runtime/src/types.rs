//! Executable types.
//!
//! An [`ExecutableType`] is the runtime form of an SDL type definition.
//! Types reference each other by name through [`TypeHandle`], and the field
//! maps of objects and interfaces sit behind a [`Thunk`] so a
//! self-referential type graph is never built eagerly.

use crate::context::Context;
use crate::error::{ResolverError, SchemaError};
use crate::resolver::FieldResolverFn;
use crate::scalars::Scalar;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

// =============================================================================
// Type handles
// =============================================================================

/// A reference to a type, with list and non-null wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    Named(String),
    List(Box<TypeHandle>),
    NonNull(Box<TypeHandle>),
}

impl TypeHandle {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeHandle) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeHandle) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// The innermost named type.
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.name(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Whether a list wrapper appears anywhere in the handle.
    pub fn is_list(&self) -> bool {
        match self {
            Self::Named(_) => false,
            Self::List(_) => true,
            Self::NonNull(inner) => inner.is_list(),
        }
    }

    /// Strips one non-null wrapper, if present.
    pub fn nullable(&self) -> &TypeHandle {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

// =============================================================================
// Thunks
// =============================================================================

type ThunkInit<T> = Box<dyn FnOnce() -> Result<T, SchemaError> + Send>;

/// A lazily computed value, memoized on first access.
///
/// A failed computation is memoized too; every later access returns the
/// same error.
pub struct Thunk<T> {
    cell: OnceLock<Result<T, SchemaError>>,
    init: Mutex<Option<ThunkInit<T>>>,
}

impl<T> Thunk<T> {
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce() -> Result<T, SchemaError> + Send + 'static,
    {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(Some(Box::new(init))),
        }
    }

    /// A thunk that is already evaluated.
    pub fn ready(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(value));
        Self {
            cell,
            init: Mutex::new(None),
        }
    }

    /// Evaluates the thunk on first call.
    pub fn get(&self) -> Result<&T, SchemaError> {
        let result = self.cell.get_or_init(|| {
            let init = self.init.lock().take();
            match init {
                Some(init) => init(),
                None => Err(SchemaError::internal("thunk evaluated recursively")),
            }
        });
        result.as_ref().map_err(Clone::clone)
    }

    pub fn is_evaluated(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Thunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(Ok(value)) => f.debug_tuple("Thunk").field(value).finish(),
            Some(Err(error)) => f.debug_tuple("Thunk").field(error).finish(),
            None => f.write_str("Thunk(<pending>)"),
        }
    }
}

// =============================================================================
// Fields and input values
// =============================================================================

/// Argument or input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeHandle,
    pub default_value: Option<Value>,
}

/// Output field of an object or interface, with its resolver chain built.
#[derive(Clone)]
pub struct ExecutableField {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeHandle,
    pub arguments: IndexMap<String, InputValue>,
    pub resolver: FieldResolverFn,
    pub deprecation_reason: Option<String>,
}

impl fmt::Debug for ExecutableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Fields of an object or interface; each one is built on first access.
pub type FieldMap = IndexMap<String, Thunk<ExecutableField>>;

// =============================================================================
// Abstract type resolution
// =============================================================================

/// Picks the concrete object type of a value of an abstract type.
pub trait TypeResolver: Send + Sync {
    fn resolve_type(
        &self,
        value: &Value,
        context: &Context,
        abstract_type: &str,
    ) -> Result<String, ResolverError>;
}

/// How an interface or union finds the concrete type of a value.
#[derive(Clone, Default)]
pub enum AbstractResolver {
    /// `__typename`, then the model mapping, then the model basename.
    #[default]
    Fallback,
    Custom(Arc<dyn TypeResolver>),
}

impl fmt::Debug for AbstractResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fallback => f.write_str("Fallback"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

// =============================================================================
// Executable types
// =============================================================================

#[derive(Debug)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Thunk<FieldMap>,
    /// The model whose rows resolve to this type.
    pub model: Option<String>,
}

#[derive(Debug)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Thunk<FieldMap>,
    pub resolver: AbstractResolver,
}

#[derive(Debug)]
pub struct UnionType {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
    pub resolver: AbstractResolver,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    /// Internal value; defaults to the name.
    pub value: Value,
    pub description: Option<String>,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: IndexMap<String, EnumValue>,
}

impl EnumType {
    /// Maps an internal value to the name of its enum value.
    pub fn serialize(&self, value: &Value) -> Option<&str> {
        self.values
            .values()
            .find(|v| &v.value == value)
            .map(|v| v.name.as_str())
    }

    /// Maps an enum value name to its internal value.
    pub fn parse(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|v| &v.value)
    }
}

pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
    pub implementation: Arc<dyn Scalar>,
}

impl fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValue>,
}

/// Introspection kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::InputObject => "INPUT_OBJECT",
        }
    }
}

/// The runtime form of a type definition.
#[derive(Debug)]
pub enum ExecutableType {
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    Scalar(ScalarType),
    InputObject(InputObjectType),
}

impl ExecutableType {
    pub fn name(&self) -> &str {
        match self {
            Self::Object(ty) => &ty.name,
            Self::Interface(ty) => &ty.name,
            Self::Union(ty) => &ty.name,
            Self::Enum(ty) => &ty.name,
            Self::Scalar(ty) => &ty.name,
            Self::InputObject(ty) => &ty.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Object(ty) => ty.description.as_deref(),
            Self::Interface(ty) => ty.description.as_deref(),
            Self::Union(ty) => ty.description.as_deref(),
            Self::Enum(ty) => ty.description.as_deref(),
            Self::Scalar(ty) => ty.description.as_deref(),
            Self::InputObject(ty) => ty.description.as_deref(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Object(_) => TypeKind::Object,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::Scalar(_) => TypeKind::Scalar,
            Self::InputObject(_) => TypeKind::InputObject,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Enum(_) | Self::Scalar(_))
    }

    /// The output fields, building the field map on first access.
    pub fn fields(&self) -> Result<Option<&FieldMap>, SchemaError> {
        match self {
            Self::Object(ty) => ty.fields.get().map(Some),
            Self::Interface(ty) => ty.fields.get().map(Some),
            _ => Ok(None),
        }
    }

    /// Looks up and builds one output field.
    pub fn field(&self, name: &str) -> Result<Option<&ExecutableField>, SchemaError> {
        match self.fields()?.and_then(|fields| fields.get(name)) {
            Some(field) => field.get().map(Some),
            None => Ok(None),
        }
    }

    pub fn interfaces(&self) -> &[String] {
        match self {
            Self::Object(ty) => &ty.interfaces,
            Self::Interface(ty) => &ty.interfaces,
            _ => &[],
        }
    }

    /// Replaces the abstract type resolver of an interface or union.
    #[must_use]
    pub fn with_abstract_resolver(mut self, resolver: AbstractResolver) -> Self {
        match &mut self {
            Self::Interface(ty) => ty.resolver = resolver,
            Self::Union(ty) => ty.resolver = resolver,
            _ => {}
        }
        self
    }

    pub fn abstract_resolver(&self) -> Option<&AbstractResolver> {
        match self {
            Self::Interface(ty) => Some(&ty.resolver),
            Self::Union(ty) => Some(&ty.resolver),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_type_handle_display() {
        let handle = TypeHandle::non_null(TypeHandle::list(TypeHandle::non_null(
            TypeHandle::named("Post"),
        )));
        assert_eq!(handle.to_string(), "[Post!]!");
        assert_eq!(handle.name(), "Post");
        assert!(handle.is_list());
        assert_eq!(handle.nullable().to_string(), "[Post!]");
    }

    #[test]
    fn test_thunk_evaluates_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let thunk = Thunk::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(41 + 1)
        });
        assert!(!thunk.is_evaluated());
        assert_eq!(*thunk.get().unwrap(), 42);
        assert_eq!(*thunk.get().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thunk_memoizes_errors() {
        let thunk: Thunk<u32> = Thunk::new(|| Err(SchemaError::unknown_type("Missing")));
        assert!(thunk.get().is_err());
        assert_eq!(
            thunk.get().unwrap_err(),
            SchemaError::unknown_type("Missing")
        );
    }

    #[test]
    fn test_enum_mapping() {
        let mut values = IndexMap::new();
        values.insert(
            "ACTIVE".to_string(),
            EnumValue {
                name: "ACTIVE".into(),
                value: Value::from(1),
                description: None,
                deprecation_reason: None,
            },
        );
        let ty = EnumType {
            name: "Status".into(),
            description: None,
            values,
        };
        assert_eq!(ty.serialize(&Value::from(1)), Some("ACTIVE"));
        assert_eq!(ty.parse("ACTIVE"), Some(&Value::from(1)));
        assert_eq!(ty.parse("GONE"), None);
    }
}
