//! Directive-driven GraphQL execution runtime for strata.
//!
//! This crate turns SDL into an executable schema and runs requests
//! against it:
//! - `directive`: directive classes, capabilities and their lookup
//! - `manipulator`: schema document rewriting before types are built
//! - `registry`: lazily built executable types
//! - `schema`: the schema builder and the built schema
//! - `resolver`: resolvers and the field middleware pipeline
//! - `batch`: per-request batch loaders
//! - `relation`: relation fetchers over a data store
//! - `store`: models and the data store abstraction
//! - `graphql`: request execution, validation and error handling

pub mod ast_convert;
pub mod batch;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod error_handler;
pub mod executor;
pub mod graphql;
pub mod introspection;
pub mod manipulator;
pub mod namespace;
pub mod node;
pub mod registry;
pub mod relation;
pub mod resolver;
pub mod scalars;
pub mod schema;
pub mod store;
pub mod types;
pub mod validation;
pub mod values;

pub use batch::{BatchLoader, BatchLoaderRegistry, BatchResolve};
pub use config::{Namespaces, PaginationConfig, SecurityConfig, StrataConfig};
pub use context::{Context, Services};
pub use directive::{
    ArgBuilder, Capability, DefinedDirective, Directive, DirectiveClass, DirectiveFactory,
    DirectiveLocator, DirectiveNode, EnumValueDirective, FieldManipulator, FieldMiddleware,
    FieldResolverDirective, ScalarDirective, TypeMiddleware, TypeResolverDirective,
};
pub use error::{ErrorCategory, GraphQLError, PathSegment, ResolverError, SchemaError};
pub use error_handler::{ErrorHandler, ErrorNext, ErrorPipeline, ErrorPool};
pub use graphql::{ExecutionListener, ExecutionResult, GraphQL, Request};
pub use manipulator::{AstBuilder, ManipulationContext};
pub use node::{FieldValue, TypeValue};
pub use registry::TypeRegistry;
pub use relation::{
    AggregateModelsLoader, CountModelsLoader, PaginatedModelsLoader, RelationBatchLoader,
    SimpleModelsLoader,
};
pub use resolver::{
    AsyncFnResolver, Deferred, FieldResolverFn, FnResolver, ResolveInfo, ResolveParams,
    ResolvedValue, Resolver, ResolverArgs, ResolverResult,
};
pub use scalars::Scalar;
pub use schema::{RootTypes, Schema, SchemaBuilder};
pub use store::{DataStore, MemoryStore, Model, ModelCatalog, RelationKind, Row, StoreError};
pub use types::{ExecutableField, ExecutableType, TypeHandle, TypeKind, TypeResolver};
