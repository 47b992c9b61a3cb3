//! Abstract syntax tree for GraphQL documents.
//!
//! The tree is owned (no borrowed source text) so a parsed schema document
//! can be shared across threads for the lifetime of a built schema.

use crate::token::DirectiveLocation;
use std::fmt;
use strata_core::Span;

/// A complete document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub definitions: Vec<Definition>,
    pub span: Span,
}

impl Document {
    /// Iterates over the type definitions (not extensions).
    pub fn type_definitions(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Type(ty) => Some(ty),
            _ => None,
        })
    }

    /// Finds a type definition by name.
    #[must_use]
    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.type_definitions().find(|ty| ty.name() == name)
    }

    pub fn directive_definitions(&self) -> impl Iterator<Item = &DirectiveDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Directive(directive) => Some(directive),
            _ => None,
        })
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Operation(op) => Some(op),
            _ => None,
        })
    }

    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.definitions.iter().filter_map(|def| match def {
            Definition::Fragment(fragment) => Some(fragment),
            _ => None,
        })
    }

    /// The schema definition, if the document declares one.
    #[must_use]
    pub fn schema_definition(&self) -> Option<&SchemaDefinition> {
        self.definitions.iter().find_map(|def| match def {
            Definition::Schema(schema) => Some(schema),
            _ => None,
        })
    }
}

/// A top-level definition.
#[derive(Debug, Clone)]
pub enum Definition {
    Schema(SchemaDefinition),
    Type(TypeDefinition),
    /// `extend type Foo { ... }` and friends.
    TypeExtension(TypeDefinition),
    Directive(DirectiveDefinition),
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

/// `schema { query: Query }`.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub description: Option<String>,
    pub directives: Vec<Directive>,
    pub operations: Vec<(OperationType, Name)>,
    pub span: Span,
}

/// Kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// The conventional root type name (`Query`, `Mutation`, `Subscription`).
    #[must_use]
    pub const fn default_type_name(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
            Self::Subscription => "Subscription",
        }
    }
}

/// Type definitions.
#[derive(Debug, Clone)]
pub enum TypeDefinition {
    Object(ObjectTypeDefinition),
    Interface(InterfaceTypeDefinition),
    Union(UnionTypeDefinition),
    Enum(EnumTypeDefinition),
    InputObject(InputObjectTypeDefinition),
    Scalar(ScalarTypeDefinition),
}

impl TypeDefinition {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name_node().value
    }

    #[must_use]
    pub fn name_node(&self) -> &Name {
        match self {
            Self::Object(def) => &def.name,
            Self::Interface(def) => &def.name,
            Self::Union(def) => &def.name,
            Self::Enum(def) => &def.name,
            Self::InputObject(def) => &def.name,
            Self::Scalar(def) => &def.name,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Object(def) => def.description.as_deref(),
            Self::Interface(def) => def.description.as_deref(),
            Self::Union(def) => def.description.as_deref(),
            Self::Enum(def) => def.description.as_deref(),
            Self::InputObject(def) => def.description.as_deref(),
            Self::Scalar(def) => def.description.as_deref(),
        }
    }

    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        match self {
            Self::Object(def) => &def.directives,
            Self::Interface(def) => &def.directives,
            Self::Union(def) => &def.directives,
            Self::Enum(def) => &def.directives,
            Self::InputObject(def) => &def.directives,
            Self::Scalar(def) => &def.directives,
        }
    }

    pub fn directives_mut(&mut self) -> &mut Vec<Directive> {
        match self {
            Self::Object(def) => &mut def.directives,
            Self::Interface(def) => &mut def.directives,
            Self::Union(def) => &mut def.directives,
            Self::Enum(def) => &mut def.directives,
            Self::InputObject(def) => &mut def.directives,
            Self::Scalar(def) => &mut def.directives,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Object(def) => def.span,
            Self::Interface(def) => def.span,
            Self::Union(def) => def.span,
            Self::Enum(def) => def.span,
            Self::InputObject(def) => def.span,
            Self::Scalar(def) => def.span,
        }
    }

    /// SDL keyword of this definition kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) => "type",
            Self::Interface(_) => "interface",
            Self::Union(_) => "union",
            Self::Enum(_) => "enum",
            Self::InputObject(_) => "input",
            Self::Scalar(_) => "scalar",
        }
    }

    /// Output fields, for objects and interfaces.
    #[must_use]
    pub fn fields(&self) -> Option<&[FieldDefinition]> {
        match self {
            Self::Object(def) => Some(&def.fields),
            Self::Interface(def) => Some(&def.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Vec<FieldDefinition>> {
        match self {
            Self::Object(def) => Some(&mut def.fields),
            Self::Interface(def) => Some(&mut def.fields),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub implements: Vec<Name>,
    pub directives: Vec<Directive>,
    pub fields: Vec<FieldDefinition>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub implements: Vec<Name>,
    pub directives: Vec<Directive>,
    pub fields: Vec<FieldDefinition>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnionTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub directives: Vec<Directive>,
    pub members: Vec<Name>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub directives: Vec<Directive>,
    pub values: Vec<EnumValueDefinition>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumValueDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InputObjectTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub directives: Vec<Directive>,
    pub fields: Vec<InputValueDefinition>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ScalarTypeDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Field of an object or interface.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub arguments: Vec<InputValueDefinition>,
    pub ty: Type,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Argument or input field definition.
#[derive(Debug, Clone)]
pub struct InputValueDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
    pub directives: Vec<Directive>,
    pub span: Span,
}

/// Type reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Named(Name),
    List(Box<Type>, Span),
    NonNull(Box<Type>, Span),
}

impl Type {
    /// The innermost named type.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => &name.value,
            Self::List(inner, _) | Self::NonNull(inner, _) => inner.name(),
        }
    }

    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(..))
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Named(name) => name.span,
            Self::List(_, span) | Self::NonNull(_, span) => *span,
        }
    }

    /// Builds a named type without source position, for generated nodes.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(Name::synthetic(name))
    }

    #[must_use]
    pub fn non_null(inner: Type) -> Self {
        Self::NonNull(Box::new(inner), Span::default())
    }

    #[must_use]
    pub fn list(inner: Type) -> Self {
        Self::List(Box::new(inner), Span::default())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(&name.value),
            Self::List(inner, _) => write!(f, "[{inner}]"),
            Self::NonNull(inner, _) => write!(f, "{inner}!"),
        }
    }
}

/// `directive @name(args) repeatable on LOCATIONS`.
#[derive(Debug, Clone)]
pub struct DirectiveDefinition {
    pub description: Option<String>,
    pub name: Name,
    pub arguments: Vec<InputValueDefinition>,
    pub repeatable: bool,
    pub locations: Vec<DirectiveLocation>,
    pub span: Span,
}

/// Directive usage.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl Directive {
    /// Looks up an argument value by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|arg| arg.name.value == name)
            .map(|arg| &arg.value)
    }

    /// Builds a directive without source position, for generated nodes.
    #[must_use]
    pub fn synthetic(name: impl Into<String>, arguments: Vec<(String, Value)>) -> Self {
        Self {
            name: Name::synthetic(name),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| Argument {
                    name: Name::synthetic(name),
                    value,
                    span: Span::default(),
                })
                .collect(),
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Name,
    pub value: Value,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct OperationDefinition {
    pub operation: OperationType,
    pub name: Option<Name>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
    pub directives: Vec<Directive>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FragmentDefinition {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Selection set. An absent selection set is represented as empty.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
    pub span: Span,
}

impl SelectionSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

/// Field selection.
#[derive(Debug, Clone)]
pub struct Field {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

impl Field {
    /// The key this field is written under in the response.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_ref().unwrap_or(&self.name).value.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct FragmentSpread {
    pub name: Name,
    pub directives: Vec<Directive>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InlineFragment {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub span: Span,
}

/// Input value literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(Name),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(Name, Value)>),
}

impl Value {
    /// Returns true if the literal (recursively) contains no variables.
    #[must_use]
    pub fn is_const(&self) -> bool {
        match self {
            Self::Variable(_) => false,
            Self::List(items) => items.iter().all(Value::is_const),
            Self::Object(fields) => fields.iter().all(|(_, v)| v.is_const()),
            _ => true,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "${}", name.value),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Enum(e) => f.write_str(e),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", name.value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Name with span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

impl Name {
    #[must_use]
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            span,
        }
    }

    /// A name that does not originate from source text.
    #[must_use]
    pub fn synthetic(value: impl Into<String>) -> Self {
        Self::new(value, Span::default())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
