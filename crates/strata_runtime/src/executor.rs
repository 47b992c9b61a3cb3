//! Operation execution.
//!
//! Fields are executed level by level. Every field of a level is invoked
//! first, which lets batch loaders collect the keys of all siblings; only
//! then are the deferred values forced and completed, which schedules the
//! fields of the next level. Mutation root fields run one at a time, each
//! with its whole subtree.
//!
//! The response is kept in an arena so a null can be propagated to the
//! nearest nullable ancestor after its siblings were already scheduled;
//! work below a nulled node is skipped.

use crate::context::Context;
use crate::error::{GraphQLError, PathSegment, ResolverError};
use crate::introspection;
use crate::registry::TypeRegistry;
use crate::resolver::{ResolveInfo, ResolveParams, ResolvedValue};
use crate::types::{ExecutableField, ExecutableType, TypeHandle};
use crate::values::{coerce_arguments, value_to_json};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use std::sync::Arc;
use strata_core::LineIndex;
use strata_syntax::{self as ast, OperationType};

/// Picks the operation to run from an executable document.
pub fn select_operation<'a>(
    document: &'a ast::Document,
    operation_name: Option<&str>,
) -> Result<&'a ast::OperationDefinition, GraphQLError> {
    match operation_name {
        Some(name) => document
            .operations()
            .find(|operation| operation.name.as_ref().is_some_and(|n| n.value == name))
            .ok_or_else(|| GraphQLError::new(format!("Unknown operation named \"{name}\"."))),
        None => {
            let mut operations = document.operations();
            match (operations.next(), operations.next()) {
                (Some(operation), None) => Ok(operation),
                (None, _) => Err(GraphQLError::new("Must provide an operation.")),
                (Some(_), Some(_)) => Err(GraphQLError::new(
                    "Must provide operation name if query contains multiple operations.",
                )),
            }
        }
    }
}

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug)]
enum Slot {
    Pending,
    Null,
    Leaf(Value),
    List(Vec<NodeId>),
    Object(IndexMap<String, NodeId>),
}

#[derive(Debug)]
struct Node {
    slot: Slot,
    parent: Option<NodeId>,
    non_null: bool,
}

/// One field to resolve on one parent value.
struct FieldTask<'a> {
    node: NodeId,
    object: Arc<ExecutableType>,
    field: Arc<ExecutableField>,
    parent: Arc<Value>,
    /// Selections merged under the same response key.
    selections: Vec<&'a ast::Field>,
    path: Vec<PathSegment>,
}

impl FieldTask<'_> {
    fn node_name(&self) -> String {
        format!("{}.{}", self.object.name(), self.field.name)
    }
}

/// Executes one operation of a document against a schema.
pub struct Executor<'a> {
    registry: &'a TypeRegistry,
    context: Context,
    fragments: FxHashMap<&'a str, &'a ast::FragmentDefinition>,
    lines: LineIndex,
    nodes: Vec<Node>,
    fields: FxHashMap<(String, String), Arc<ExecutableField>>,
    errors: Vec<GraphQLError>,
}

impl<'a> Executor<'a> {
    /// `source` is the text `document` was parsed from, for error
    /// locations. Variables are read from `context`.
    pub fn new(
        registry: &'a TypeRegistry,
        document: &'a ast::Document,
        source: &str,
        context: Context,
    ) -> Self {
        Self {
            registry,
            context,
            fragments: document
                .fragments()
                .map(|fragment| (fragment.name.as_str(), fragment))
                .collect(),
            lines: LineIndex::new(source),
            nodes: vec![Node {
                slot: Slot::Pending,
                parent: None,
                non_null: false,
            }],
            fields: FxHashMap::default(),
            errors: Vec::new(),
        }
    }

    /// Runs `operation`; returns the `data` entry and the field errors.
    pub async fn execute(
        mut self,
        operation: &'a ast::OperationDefinition,
    ) -> (Option<Value>, Vec<GraphQLError>) {
        let root_name = self.registry.context().roots.name_of(operation.operation);
        let root = match (operation.operation, root_name) {
            (OperationType::Subscription, _) => {
                return (None, vec![self.located("Subscriptions are not supported.", operation.span)]);
            }
            (_, None) => {
                let message = format!(
                    "Schema is not configured for {}s.",
                    operation.operation.as_str()
                );
                return (None, vec![self.located(&message, operation.span)]);
            }
            (_, Some(name)) => match self.registry.get(name) {
                Ok(root) => root,
                Err(error) => return (None, vec![GraphQLError::from(error)]),
            },
        };

        tracing::debug!(
            operation = operation.operation.as_str(),
            name = operation.name.as_ref().map(|name| name.as_str()),
            "executing operation"
        );

        let parent = Arc::new(Value::Object(Map::new()));
        let selections = self.collect_fields(&root, std::iter::once(&operation.selection_set));
        self.nodes[ROOT].slot = Slot::Object(IndexMap::new());

        let mut tasks = Vec::new();
        for (key, fields) in selections {
            let path = vec![PathSegment::Field(key.clone())];
            self.schedule(ROOT, &root, &parent, key, fields, path, &mut tasks);
        }

        if operation.operation == OperationType::Mutation {
            for task in tasks {
                self.run(vec![task]).await;
            }
        } else {
            self.run(tasks).await;
        }

        let data = self.value_of(ROOT);
        (Some(data), self.errors)
    }

    fn located(&self, message: &str, span: strata_core::Span) -> GraphQLError {
        GraphQLError::new(message).with_location(self.lines.span_location(span))
    }

    /// Executes levels until no fields are left.
    async fn run(&mut self, mut level: Vec<FieldTask<'a>>) {
        let mut depth = 0;
        while !level.is_empty() {
            depth += 1;
            tracing::trace!(depth, fields = level.len(), "executing level");

            let mut invoked = Vec::with_capacity(level.len());
            for task in level {
                if self.is_cancelled(task.node) {
                    continue;
                }
                match self.invoke(&task).await {
                    Ok(resolved) => invoked.push((task, resolved)),
                    Err(error) => self.fail(&task, task.node, &error, task.path.clone()),
                }
            }

            let mut next = Vec::new();
            for (task, resolved) in invoked {
                if self.is_cancelled(task.node) {
                    continue;
                }
                match resolved.force().await {
                    Ok(value) => {
                        let ty = task.field.ty.clone();
                        self.complete(&task, task.node, &ty, value, task.path.clone(), &mut next);
                    }
                    Err(error) => self.fail(&task, task.node, &error, task.path.clone()),
                }
            }
            level = next;
        }
    }

    async fn invoke(&self, task: &FieldTask<'a>) -> Result<ResolvedValue, ResolverError> {
        let field = &task.field;
        let arguments = task
            .selections
            .first()
            .map_or(&[][..], |selection| selection.arguments.as_slice());
        let args = coerce_arguments(
            &field.arguments,
            arguments,
            self.context.variables(),
            self.registry,
        )?;
        let info = ResolveInfo::new(&field.name, task.object.name())
            .with_return_type(field.ty.to_string())
            .with_path(task.path.clone());
        (field.resolver)(ResolveParams {
            parent: Value::clone(&task.parent),
            args,
            context: self.context.clone(),
            info: Arc::new(info),
        })
        .await
    }

    // =========================================================================
    // Completion
    // =========================================================================

    fn complete(
        &mut self,
        task: &FieldTask<'a>,
        node: NodeId,
        ty: &TypeHandle,
        value: Value,
        path: Vec<PathSegment>,
        next: &mut Vec<FieldTask<'a>>,
    ) {
        if let Err(error) = self.try_complete(task, node, ty, value, &path, next) {
            self.fail(task, node, &error, path);
        }
    }

    fn try_complete(
        &mut self,
        task: &FieldTask<'a>,
        node: NodeId,
        ty: &TypeHandle,
        value: Value,
        path: &[PathSegment],
        next: &mut Vec<FieldTask<'a>>,
    ) -> Result<(), ResolverError> {
        if value.is_null() {
            if ty.is_non_null() {
                return Err(ResolverError::NullValue(task.node_name()));
            }
            self.nodes[node].slot = Slot::Null;
            return Ok(());
        }

        match ty.nullable() {
            TypeHandle::List(item_type) => {
                let Value::Array(items) = value else {
                    return Err(ResolverError::custom(format!(
                        "Expected a list for field {}, got {value}.",
                        task.node_name()
                    )));
                };
                let ids: Vec<NodeId> = items
                    .iter()
                    .map(|_| self.alloc(node, item_type.is_non_null()))
                    .collect();
                self.nodes[node].slot = Slot::List(ids.clone());
                for (index, (id, item)) in ids.into_iter().zip(items).enumerate() {
                    let mut item_path = path.to_vec();
                    item_path.push(PathSegment::Index(index));
                    self.complete(task, id, item_type, item, item_path, next);
                    if self.is_cancelled(node) {
                        break;
                    }
                }
                Ok(())
            }
            other => {
                let named = self.registry.get(other.name())?;
                match named.as_ref() {
                    ExecutableType::Scalar(scalar) => {
                        let serialized = scalar.implementation.serialize(&value)?;
                        self.nodes[node].slot = Slot::Leaf(serialized);
                        Ok(())
                    }
                    ExecutableType::Enum(enum_type) => {
                        let name = enum_type
                            .serialize(&value)
                            .or_else(|| value.as_str().filter(|n| enum_type.values.contains_key(*n)))
                            .ok_or_else(|| {
                                ResolverError::custom(format!(
                                    "Enum \"{}\" cannot represent value: {value}",
                                    enum_type.name
                                ))
                            })?;
                        self.nodes[node].slot = Slot::Leaf(Value::String(name.to_string()));
                        Ok(())
                    }
                    ExecutableType::InputObject(input) => Err(ResolverError::internal(format!(
                        "input type {} used as an output type",
                        input.name
                    ))),
                    _ => {
                        let object = if named.is_abstract() {
                            self.registry.resolve_abstract(&named, &value, &self.context)?
                        } else {
                            Arc::clone(&named)
                        };
                        let selections = self.collect_fields(
                            &object,
                            task.selections.iter().copied().map(|field| &field.selection_set),
                        );
                        let parent = Arc::new(value);
                        self.nodes[node].slot = Slot::Object(IndexMap::new());
                        for (key, fields) in selections {
                            let mut field_path = path.to_vec();
                            field_path.push(PathSegment::Field(key.clone()));
                            self.schedule(node, &object, &parent, key, fields, field_path, next);
                        }
                        Ok(())
                    }
                }
            }
        }
    }

    /// Adds the node of one selected field to an object node and queues
    /// its resolution. `__typename` is answered on the spot.
    #[allow(clippy::too_many_arguments)]
    fn schedule(
        &mut self,
        object_node: NodeId,
        object: &Arc<ExecutableType>,
        parent: &Arc<Value>,
        key: String,
        selections: Vec<&'a ast::Field>,
        path: Vec<PathSegment>,
        next: &mut Vec<FieldTask<'a>>,
    ) {
        let Some(&first) = selections.first() else {
            return;
        };
        let field_name = first.name.as_str();

        if field_name == "__typename" {
            let id = self.alloc(object_node, true);
            self.nodes[id].slot = Slot::Leaf(Value::String(object.name().to_string()));
            self.insert_child(object_node, key, id);
            return;
        }

        match self.field_definition(object, field_name) {
            Ok(field) => {
                let id = self.alloc(object_node, field.ty.is_non_null());
                self.insert_child(object_node, key, id);
                next.push(FieldTask {
                    node: id,
                    object: Arc::clone(object),
                    field,
                    parent: Arc::clone(parent),
                    selections,
                    path,
                });
            }
            Err(error) => {
                let id = self.alloc(object_node, false);
                self.insert_child(object_node, key, id);
                let mut converted = GraphQLError::from_resolver(&error, path);
                converted = converted.with_location(self.lines.span_location(first.span));
                self.errors.push(converted);
                self.nodes[id].slot = Slot::Null;
            }
        }
    }

    /// The definition of a selected field; `__schema` and `__type` exist
    /// on the query root only.
    fn field_definition(
        &mut self,
        object: &ExecutableType,
        name: &str,
    ) -> Result<Arc<ExecutableField>, ResolverError> {
        let key = (object.name().to_string(), name.to_string());
        if let Some(field) = self.fields.get(&key) {
            return Ok(Arc::clone(field));
        }
        let is_query_root = self.registry.context().roots.query == object.name();
        let field = match name {
            "__schema" if is_query_root => introspection::schema_field(),
            "__type" if is_query_root => introspection::type_field(self.registry),
            _ => object
                .field(name)?
                .cloned()
                .ok_or_else(|| ResolverError::FieldNotFound(format!("{}.{name}", object.name())))?,
        };
        let field = Arc::new(field);
        self.fields.insert(key, Arc::clone(&field));
        Ok(field)
    }

    // =========================================================================
    // Field collection
    // =========================================================================

    fn collect_fields<I>(&self, object: &ExecutableType, sets: I) -> IndexMap<String, Vec<&'a ast::Field>>
    where
        I: IntoIterator<Item = &'a ast::SelectionSet>,
    {
        let mut collected = IndexMap::new();
        let mut visited = FxHashSet::default();
        for set in sets {
            self.collect_into(object, set, &mut collected, &mut visited);
        }
        collected
    }

    fn collect_into(
        &self,
        object: &ExecutableType,
        set: &'a ast::SelectionSet,
        collected: &mut IndexMap<String, Vec<&'a ast::Field>>,
        visited: &mut FxHashSet<&'a str>,
    ) {
        for selection in &set.selections {
            match selection {
                ast::Selection::Field(field) => {
                    if self.included(&field.directives) {
                        collected
                            .entry(field.response_key().to_string())
                            .or_default()
                            .push(field);
                    }
                }
                ast::Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives) || !visited.insert(spread.name.as_str()) {
                        continue;
                    }
                    let Some(&fragment) = self.fragments.get(spread.name.as_str()) else {
                        continue;
                    };
                    if self.applies(object, fragment.type_condition.as_str()) {
                        self.collect_into(object, &fragment.selection_set, collected, visited);
                    }
                }
                ast::Selection::InlineFragment(inline) => {
                    if !self.included(&inline.directives) {
                        continue;
                    }
                    let applies = inline
                        .type_condition
                        .as_ref()
                        .map_or(true, |condition| self.applies(object, condition.as_str()));
                    if applies {
                        self.collect_into(object, &inline.selection_set, collected, visited);
                    }
                }
            }
        }
    }

    /// `@skip(if:)` and `@include(if:)`.
    fn included(&self, directives: &[ast::Directive]) -> bool {
        let condition = |name: &str| {
            directives
                .iter()
                .find(|directive| directive.name.as_str() == name)
                .and_then(|directive| directive.argument("if"))
                .map(|value| value_to_json(value, self.context.variables()) == Value::Bool(true))
        };
        condition("skip") != Some(true) && condition("include") != Some(false)
    }

    fn applies(&self, object: &ExecutableType, condition: &str) -> bool {
        if object.name() == condition {
            return true;
        }
        match self.registry.search(condition) {
            Ok(Some(ty)) => self.registry.is_member(&ty, object),
            _ => false,
        }
    }

    // =========================================================================
    // Response arena
    // =========================================================================

    fn alloc(&mut self, parent: NodeId, non_null: bool) -> NodeId {
        self.nodes.push(Node {
            slot: Slot::Pending,
            parent: Some(parent),
            non_null,
        });
        self.nodes.len() - 1
    }

    fn insert_child(&mut self, object: NodeId, key: String, child: NodeId) {
        if let Slot::Object(children) = &mut self.nodes[object].slot {
            children.insert(key, child);
        }
    }

    /// Whether the node or one of its ancestors was nulled.
    fn is_cancelled(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if matches!(self.nodes[id].slot, Slot::Null) {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    /// Records `error` and nulls `node`, propagating to the nearest
    /// nullable ancestor.
    fn fail(&mut self, task: &FieldTask<'a>, node: NodeId, error: &ResolverError, path: Vec<PathSegment>) {
        let mut converted = GraphQLError::from_resolver(error, path);
        if let Some(selection) = task.selections.first() {
            converted = converted.with_location(self.lines.span_location(selection.span));
        }
        self.errors.push(converted);
        self.nullify(node);
    }

    fn nullify(&mut self, node: NodeId) {
        let mut current = node;
        loop {
            self.nodes[current].slot = Slot::Null;
            match self.nodes[current].parent {
                Some(parent) if self.nodes[current].non_null => current = parent,
                _ => break,
            }
        }
    }

    fn value_of(&self, node: NodeId) -> Value {
        match &self.nodes[node].slot {
            Slot::Pending | Slot::Null => Value::Null,
            Slot::Leaf(value) => value.clone(),
            Slot::List(items) => Value::Array(items.iter().map(|id| self.value_of(*id)).collect()),
            Slot::Object(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, id)| (key.clone(), self.value_of(*id)))
                    .collect(),
            ),
        }
    }
}
