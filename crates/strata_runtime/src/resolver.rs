//! Resolver system.
//!
//! A built field carries a [`FieldResolverFn`]: an owned closure producing a
//! future of [`ResolvedValue`]. Resolver classes implement [`Resolver`] and
//! are adapted into that closure form by the resolver provider.

use crate::context::Context;
use crate::error::{PathSegment, ResolverError};
use crate::namespace::snake_case;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Arguments passed to a resolver, after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs {
    args: IndexMap<String, Value>,
}

impl ResolverArgs {
    /// Creates new resolver args.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolver args from a list of (name, value) pairs.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
        }
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, returning an error if not found.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.args
            .get(name)
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
            .and_then(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ResolverError::ArgumentParseError(name.to_string(), e.to_string()))
            })
    }

    /// Returns all arguments.
    pub fn all(&self) -> &IndexMap<String, Value> {
        &self.args
    }

    pub fn all_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.args
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveInfo {
    /// The field name being resolved.
    pub field_name: String,

    /// The parent type name.
    pub parent_type: String,

    /// The return type, as written in the schema (`[Post!]!`).
    pub return_type: String,

    /// Path to this field in the response.
    pub path: Vec<PathSegment>,
}

impl ResolveInfo {
    /// Creates new resolve info.
    pub fn new(field_name: impl Into<String>, parent_type: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            parent_type: parent_type.into(),
            return_type: String::new(),
            path: Vec::new(),
        }
    }

    /// Sets the return type.
    pub fn with_return_type(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    /// Sets the path.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Future returned by [`Resolver::resolve`].
pub type ResolverFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResolvedValue, ResolverError>> + Send + 'a>>;

/// Future returned by a built field resolver.
pub type FieldFuture = ResolverFuture<'static>;

/// The resolver closure of a built field, after middleware wrapping.
pub type FieldResolverFn = Arc<dyn Fn(ResolveParams) -> FieldFuture + Send + Sync>;

/// Everything a field resolver closure receives.
#[derive(Debug, Clone)]
pub struct ResolveParams {
    pub parent: Value,
    pub args: ResolverArgs,
    pub context: Context,
    pub info: Arc<ResolveInfo>,
}

/// A value that is computed when first forced.
///
/// Batch loaders hand these out; the executor forces every deferred value of
/// a level only after all fields of that level have been invoked.
pub struct Deferred {
    future: Pin<Box<dyn Future<Output = ResolverResult> + Send>>,
}

impl Deferred {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }

    /// Forces the value.
    pub async fn force(self) -> ResolverResult {
        self.future.await
    }

    /// Post-processes the value once it is available.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> ResolverResult + Send + 'static,
    {
        let future = self.future;
        Self::new(async move { f(future.await?) })
    }
}

impl Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Deferred")
    }
}

/// Outcome of invoking a field resolver.
#[derive(Debug)]
pub enum ResolvedValue {
    Value(Value),
    Deferred(Deferred),
}

impl ResolvedValue {
    /// Applies `f` to the value, now or once the deferred value is forced.
    pub fn map<F>(self, f: F) -> Result<Self, ResolverError>
    where
        F: FnOnce(Value) -> ResolverResult + Send + 'static,
    {
        match self {
            Self::Value(value) => f(value).map(Self::Value),
            Self::Deferred(deferred) => Ok(Self::Deferred(deferred.map(f))),
        }
    }

    /// Forces the value if it is deferred.
    pub async fn force(self) -> ResolverResult {
        match self {
            Self::Value(value) => Ok(value),
            Self::Deferred(deferred) => deferred.force().await,
        }
    }
}

impl From<Value> for ResolvedValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Deferred> for ResolvedValue {
    fn from(deferred: Deferred) -> Self {
        Self::Deferred(deferred)
    }
}

/// Trait for resolver classes.
pub trait Resolver: Send + Sync {
    /// Resolves a field value.
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolveInfo,
    ) -> ResolverFuture<'a>;
}

/// Adapts a resolver class into a field resolver closure.
pub fn into_field_resolver(resolver: Arc<dyn Resolver>) -> FieldResolverFn {
    Arc::new(move |params: ResolveParams| {
        let resolver = Arc::clone(&resolver);
        Box::pin(async move {
            resolver
                .resolve(&params.parent, &params.args, &params.context, &params.info)
                .await
        })
    })
}

/// A sync resolver function.
pub type SyncResolverFn =
    Arc<dyn Fn(&Value, &ResolverArgs, &Context, &ResolveInfo) -> ResolverResult + Send + Sync>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    /// Creates a new function resolver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolveInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolveInfo,
    ) -> ResolverFuture<'a> {
        let result = (self.func)(parent, args, ctx, info).map(ResolvedValue::Value);
        Box::pin(async move { result })
    }
}

/// An async resolver function type.
pub type AsyncResolverFn = Arc<
    dyn Fn(Value, ResolverArgs, Context, ResolveInfo) -> Pin<Box<dyn Future<Output = ResolverResult> + Send>>
        + Send
        + Sync,
>;

/// A wrapper for async resolver functions.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ResolverArgs, Context, ResolveInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |parent, args, ctx, info| Box::pin(f(parent, args, ctx, info))),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        args: &'a ResolverArgs,
        ctx: &'a Context,
        info: &'a ResolveInfo,
    ) -> ResolverFuture<'a> {
        let future = (self.func)(parent.clone(), args.clone(), ctx.clone(), info.clone());
        Box::pin(async move { future.await.map(ResolvedValue::Value) })
    }
}

/// Default resolver that accesses properties from the parent object.
pub struct DefaultResolver;

impl DefaultResolver {
    fn lookup(parent: &Value, field_name: &str) -> ResolverResult {
        match parent {
            Value::Object(map) => Ok(map
                .get(field_name)
                .or_else(|| map.get(&snake_case(field_name)))
                .cloned()
                .unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            _ => Err(ResolverError::FieldNotFound(field_name.to_string())),
        }
    }
}

impl Resolver for DefaultResolver {
    fn resolve<'a>(
        &'a self,
        parent: &'a Value,
        _args: &'a ResolverArgs,
        _ctx: &'a Context,
        info: &'a ResolveInfo,
    ) -> ResolverFuture<'a> {
        let result = Self::lookup(parent, &info.field_name).map(ResolvedValue::Value);
        Box::pin(async move { result })
    }
}

/// Field resolver closure reading `field_name` (or its snake_case form)
/// from the parent value.
pub fn default_field_resolver() -> FieldResolverFn {
    Arc::new(|params: ResolveParams| {
        let result =
            DefaultResolver::lookup(&params.parent, &params.info.field_name).map(ResolvedValue::Value);
        Box::pin(async move { result })
    })
}

/// Field resolver closure reading `attribute` from the parent value.
pub fn attribute_resolver(attribute: String) -> FieldResolverFn {
    Arc::new(move |params: ResolveParams| {
        let result = DefaultResolver::lookup(&params.parent, &attribute).map(ResolvedValue::Value);
        Box::pin(async move { result })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(parent: Value, field: &str) -> ResolveParams {
        ResolveParams {
            parent,
            args: ResolverArgs::new(),
            context: Context::default(),
            info: Arc::new(ResolveInfo::new(field, "User")),
        }
    }

    #[test]
    fn test_resolver_args() {
        let mut args = ResolverArgs::new();
        args.set("id", json!(123));
        args.set("name", json!("test"));

        assert_eq!(args.get_as::<i64>("id"), Some(123));
        assert_eq!(args.get_as::<String>("name"), Some("test".to_string()));
        assert_eq!(args.get_as::<i64>("missing"), None);
        assert!(matches!(
            args.require::<i64>("name"),
            Err(ResolverError::ArgumentParseError(..))
        ));
    }

    #[tokio::test]
    async fn test_default_resolver() {
        let resolver = DefaultResolver;
        let parent = json!({"name": "Alice", "created_at": "2024-01-01"});
        let args = ResolverArgs::new();
        let ctx = Context::default();

        let info = ResolveInfo::new("name", "User");
        let result = resolver.resolve(&parent, &args, &ctx, &info).await.unwrap();
        assert_eq!(result.force().await.unwrap(), json!("Alice"));

        let info = ResolveInfo::new("createdAt", "User");
        let result = resolver.resolve(&parent, &args, &ctx, &info).await.unwrap();
        assert_eq!(result.force().await.unwrap(), json!("2024-01-01"));
    }

    #[tokio::test]
    async fn test_fn_resolver_through_field_closure() {
        let resolver = into_field_resolver(Arc::new(FnResolver::new(|_parent, args, _ctx, _info| {
            let id: i64 = args.require("id")?;
            Ok(json!({"id": id}))
        })));

        let mut params = params(json!({}), "user");
        params.args.set("id", json!(42));
        let value = resolver(params).await.unwrap().force().await.unwrap();
        assert_eq!(value, json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_async_fn_resolver() {
        let resolver = AsyncFnResolver::new(|parent: Value, _args, _ctx, _info| async move {
            Ok(json!(parent["n"].as_i64().unwrap_or_default() * 2))
        });
        let parent = json!({"n": 21});
        let value = resolver
            .resolve(&parent, &ResolverArgs::new(), &Context::default(), &ResolveInfo::new("double", "Query"))
            .await
            .unwrap()
            .force()
            .await
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[tokio::test]
    async fn test_deferred_map_is_lazy() {
        let deferred = Deferred::new(async { Ok(json!(2)) }).map(|v| Ok(json!(v.as_i64().unwrap() + 1)));
        assert_eq!(deferred.force().await.unwrap(), json!(3));

        let mapped = ResolvedValue::Value(json!("x"))
            .map(|_| Err(ResolverError::custom("nope")));
        assert!(mapped.is_err());
    }

    #[tokio::test]
    async fn test_attribute_resolver() {
        let resolver = attribute_resolver("full_name".into());
        let value = resolver(params(json!({"full_name": "Ada"}), "name"))
            .await
            .unwrap()
            .force()
            .await
            .unwrap();
        assert_eq!(value, json!("Ada"));
    }
}
