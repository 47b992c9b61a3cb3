//! Recursive descent parser for GraphQL schema and executable documents.

use crate::ast::*;
use crate::lexer::{block_string_value, string_value, Lexer};
use crate::token::{DirectiveLocation, Token, TokenKind};
use strata_core::{diagnostics::codes, DiagnosticBag, Span};

/// Parser for GraphQL documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// End of the previously consumed token.
    prev_end: u32,
    diagnostics: DiagnosticBag,
}

/// Result of parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

/// Parses a source string into a document.
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            prev_end: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Returns true if at a name token spelled `keyword`.
    fn at_keyword(&self, keyword: &str) -> bool {
        self.at_kind(TokenKind::Name) && self.current_text() == keyword
    }

    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.current = self.lexer.next_token();
    }

    /// Consumes `kind` if present.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            self.error_expected(&format!("\"{keyword}\""));
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.diagnostics.error(code, message, self.current.span);
    }

    fn error_expected(&mut self, expected: &str) {
        let (code, found) = match self.at() {
            TokenKind::Eof => (codes::UNEXPECTED_EOF, "<EOF>".to_string()),
            TokenKind::Error => (codes::INVALID_SYNTAX, format!("\"{}\"", self.current_text())),
            _ => (codes::UNEXPECTED_TOKEN, format!("\"{}\"", self.current_text())),
        };
        self.error(code, format!("Expected {expected}, found {found}."));
    }

    /// Parses a block of items delimited by `open`/`close`, guaranteeing
    /// progress on malformed input.
    fn delimited<T>(
        &mut self,
        open: TokenKind,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> T,
    ) -> Vec<T> {
        let mut items = Vec::new();
        if !self.expect(open) {
            return items;
        }
        while !self.at_kind(close) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            items.push(item(self));
            if self.current.span.start == before {
                self.advance();
            }
        }
        self.expect(close);
        items
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
            if self.current.span.start == before {
                // Recovery: skip the offending token.
                self.advance();
            }
        }

        Document {
            definitions,
            span: self.span_from(start),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        if self.at_kind(TokenKind::LBrace) {
            return Some(Definition::Operation(self.parse_operation()));
        }

        let description = self.parse_description();

        if !self.at_kind(TokenKind::Name) {
            self.error_expected("a definition");
            return None;
        }

        match self.current_text() {
            "schema" => Some(Definition::Schema(self.parse_schema_definition(description))),
            "directive" => Some(Definition::Directive(
                self.parse_directive_definition(description),
            )),
            "extend" => {
                let start = self.current.span.start;
                self.advance();
                let def = self.parse_type_definition(None, start)?;
                Some(Definition::TypeExtension(def))
            }
            "query" | "mutation" | "subscription" if description.is_none() => {
                Some(Definition::Operation(self.parse_operation()))
            }
            "fragment" if description.is_none() => {
                Some(Definition::Fragment(self.parse_fragment_definition()))
            }
            _ => {
                let start = self.current.span.start;
                self.parse_type_definition(description, start)
                    .map(Definition::Type)
            }
        }
    }

    fn parse_type_definition(
        &mut self,
        description: Option<String>,
        start: u32,
    ) -> Option<TypeDefinition> {
        let keyword = self.current_text();
        let def = match keyword {
            "type" => TypeDefinition::Object(self.parse_object_type(description, start)),
            "interface" => TypeDefinition::Interface(self.parse_interface_type(description, start)),
            "union" => TypeDefinition::Union(self.parse_union_type(description, start)),
            "enum" => TypeDefinition::Enum(self.parse_enum_type(description, start)),
            "input" => TypeDefinition::InputObject(self.parse_input_object_type(description, start)),
            "scalar" => TypeDefinition::Scalar(self.parse_scalar_type(description, start)),
            _ => {
                self.error_expected("a definition");
                return None;
            }
        };
        Some(def)
    }

    fn parse_description(&mut self) -> Option<String> {
        let value = match self.at() {
            TokenKind::StringLiteral => string_value(self.current_text()),
            TokenKind::BlockStringLiteral => Some(block_string_value(self.current_text())),
            _ => return None,
        };
        if value.is_none() {
            self.error(codes::INVALID_ESCAPE, "Invalid escape sequence in string.");
        }
        self.advance();
        value
    }

    fn parse_name(&mut self) -> Name {
        if self.at_kind(TokenKind::Name) {
            let name = Name::new(self.current_text(), self.current.span);
            self.advance();
            name
        } else {
            self.error_expected("Name");
            Name::new("", Span::empty(self.current.span.start))
        }
    }

    fn parse_schema_definition(&mut self, description: Option<String>) -> SchemaDefinition {
        let start = self.current.span.start;
        self.expect_keyword("schema");
        let directives = self.parse_directives(false);
        let operations = self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
            let kind = p.parse_operation_type().unwrap_or(OperationType::Query);
            p.expect(TokenKind::Colon);
            (kind, p.parse_name())
        });
        SchemaDefinition {
            description,
            directives,
            operations,
            span: self.span_from(start),
        }
    }

    fn parse_operation_type(&mut self) -> Option<OperationType> {
        let kind = match self.current_text() {
            "query" if self.at_kind(TokenKind::Name) => OperationType::Query,
            "mutation" if self.at_kind(TokenKind::Name) => OperationType::Mutation,
            "subscription" if self.at_kind(TokenKind::Name) => OperationType::Subscription,
            _ => {
                self.error_expected("\"query\", \"mutation\" or \"subscription\"");
                return None;
            }
        };
        self.advance();
        Some(kind)
    }

    fn parse_object_type(&mut self, description: Option<String>, start: u32) -> ObjectTypeDefinition {
        self.expect_keyword("type");
        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives(false);
        let fields = self.parse_field_definitions();
        ObjectTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_interface_type(
        &mut self,
        description: Option<String>,
        start: u32,
    ) -> InterfaceTypeDefinition {
        self.expect_keyword("interface");
        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives(false);
        let fields = self.parse_field_definitions();
        InterfaceTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_union_type(&mut self, description: Option<String>, start: u32) -> UnionTypeDefinition {
        self.expect_keyword("union");
        let name = self.parse_name();
        let directives = self.parse_directives(false);
        let mut members = Vec::new();
        if self.eat(TokenKind::Eq) {
            self.eat(TokenKind::Pipe);
            members.push(self.parse_name());
            while self.eat(TokenKind::Pipe) {
                members.push(self.parse_name());
            }
        }
        UnionTypeDefinition {
            description,
            name,
            directives,
            members,
            span: self.span_from(start),
        }
    }

    fn parse_enum_type(&mut self, description: Option<String>, start: u32) -> EnumTypeDefinition {
        self.expect_keyword("enum");
        let name = self.parse_name();
        let directives = self.parse_directives(false);
        let values = if self.at_kind(TokenKind::LBrace) {
            self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
                let start = p.current.span.start;
                let description = p.parse_description();
                let name = p.parse_name();
                if matches!(name.as_str(), "true" | "false" | "null") {
                    p.diagnostics.error(
                        codes::INVALID_SYNTAX,
                        format!("Enum value cannot be named \"{name}\"."),
                        name.span,
                    );
                }
                let directives = p.parse_directives(false);
                EnumValueDefinition {
                    description,
                    name,
                    directives,
                    span: p.span_from(start),
                }
            })
        } else {
            Vec::new()
        };
        EnumTypeDefinition {
            description,
            name,
            directives,
            values,
            span: self.span_from(start),
        }
    }

    fn parse_input_object_type(
        &mut self,
        description: Option<String>,
        start: u32,
    ) -> InputObjectTypeDefinition {
        self.expect_keyword("input");
        let name = self.parse_name();
        let directives = self.parse_directives(false);
        let fields = if self.at_kind(TokenKind::LBrace) {
            self.delimited(TokenKind::LBrace, TokenKind::RBrace, Self::parse_input_value_definition)
        } else {
            Vec::new()
        };
        InputObjectTypeDefinition {
            description,
            name,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_scalar_type(&mut self, description: Option<String>, start: u32) -> ScalarTypeDefinition {
        self.expect_keyword("scalar");
        let name = self.parse_name();
        let directives = self.parse_directives(false);
        ScalarTypeDefinition {
            description,
            name,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_directive_definition(&mut self, description: Option<String>) -> DirectiveDefinition {
        let start = self.current.span.start;
        self.expect_keyword("directive");
        self.expect(TokenKind::At);
        let name = self.parse_name();
        let arguments = self.parse_argument_definitions();
        let repeatable = if self.at_keyword("repeatable") {
            self.advance();
            true
        } else {
            false
        };
        self.expect_keyword("on");

        let mut locations = Vec::new();
        self.eat(TokenKind::Pipe);
        loop {
            let text = self.current_text();
            match DirectiveLocation::parse(text).filter(|_| self.at_kind(TokenKind::Name)) {
                Some(location) => {
                    locations.push(location);
                    self.advance();
                }
                None => {
                    self.error(
                        codes::UNKNOWN_DIRECTIVE_LOCATION,
                        format!("Unexpected directive location \"{text}\"."),
                    );
                    break;
                }
            }
            if !self.eat(TokenKind::Pipe) {
                break;
            }
        }

        DirectiveDefinition {
            description,
            name,
            arguments,
            repeatable,
            locations,
            span: self.span_from(start),
        }
    }

    fn parse_implements(&mut self) -> Vec<Name> {
        let mut names = Vec::new();
        if self.at_keyword("implements") {
            self.advance();
            self.eat(TokenKind::Amp);
            names.push(self.parse_name());
            while self.eat(TokenKind::Amp) {
                names.push(self.parse_name());
            }
        }
        names
    }

    fn parse_field_definitions(&mut self) -> Vec<FieldDefinition> {
        if !self.at_kind(TokenKind::LBrace) {
            return Vec::new();
        }
        self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
            let start = p.current.span.start;
            let description = p.parse_description();
            let name = p.parse_name();
            let arguments = p.parse_argument_definitions();
            p.expect(TokenKind::Colon);
            let ty = p.parse_type();
            let directives = p.parse_directives(false);
            FieldDefinition {
                description,
                name,
                arguments,
                ty,
                directives,
                span: p.span_from(start),
            }
        })
    }

    fn parse_argument_definitions(&mut self) -> Vec<InputValueDefinition> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.delimited(TokenKind::LParen, TokenKind::RParen, Self::parse_input_value_definition)
    }

    fn parse_input_value_definition(&mut self) -> InputValueDefinition {
        let start = self.current.span.start;
        let description = self.parse_description();
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();
        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };
        let directives = self.parse_directives(true);
        InputValueDefinition {
            description,
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;
        let ty = if self.eat(TokenKind::LBracket) {
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), self.span_from(start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.eat(TokenKind::Bang) {
            Type::NonNull(Box::new(ty), self.span_from(start))
        } else {
            ty
        }
    }

    fn parse_directives(&mut self, is_const: bool) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance();
            let name = self.parse_name();
            let arguments = self.parse_arguments(is_const);
            directives.push(Directive {
                name,
                arguments,
                span: self.span_from(start),
            });
        }
        directives
    }

    fn parse_arguments(&mut self, is_const: bool) -> Vec<Argument> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.delimited(TokenKind::LParen, TokenKind::RParen, |p| {
            let start = p.current.span.start;
            let name = p.parse_name();
            p.expect(TokenKind::Colon);
            let value = p.parse_value(is_const);
            Argument {
                name,
                value,
                span: p.span_from(start),
            }
        })
    }

    fn parse_value(&mut self, is_const: bool) -> Value {
        match self.at() {
            TokenKind::Dollar if !is_const => {
                self.advance();
                Value::Variable(self.parse_name())
            }
            TokenKind::IntLiteral => {
                let value = match self.current_text().parse() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error(codes::INVALID_SYNTAX, "Int literal is out of range.");
                        0
                    }
                };
                self.advance();
                Value::Int(value)
            }
            TokenKind::FloatLiteral => {
                let value = self.current_text().parse().unwrap_or(0.0);
                self.advance();
                Value::Float(value)
            }
            TokenKind::StringLiteral => {
                let value = string_value(self.current_text()).unwrap_or_else(|| {
                    self.error(codes::INVALID_ESCAPE, "Invalid escape sequence in string.");
                    String::new()
                });
                self.advance();
                Value::String(value)
            }
            TokenKind::BlockStringLiteral => {
                let value = block_string_value(self.current_text());
                self.advance();
                Value::String(value)
            }
            TokenKind::Name => {
                let value = match self.current_text() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    other => Value::Enum(other.to_string()),
                };
                self.advance();
                value
            }
            TokenKind::LBracket => Value::List(self.delimited(
                TokenKind::LBracket,
                TokenKind::RBracket,
                |p| p.parse_value(is_const),
            )),
            TokenKind::LBrace => {
                Value::Object(self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
                    let name = p.parse_name();
                    p.expect(TokenKind::Colon);
                    (name, p.parse_value(is_const))
                }))
            }
            TokenKind::Error => {
                self.error(
                    codes::UNTERMINATED_STRING,
                    format!("Invalid token \"{}\".", self.current_text()),
                );
                self.advance();
                Value::Null
            }
            _ => {
                self.error_expected("a value");
                Value::Null
            }
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        if self.at_kind(TokenKind::LBrace) {
            return OperationDefinition {
                operation: OperationType::Query,
                name: None,
                variables: Vec::new(),
                directives: Vec::new(),
                selection_set: self.parse_selection_set(),
                span: self.span_from(start),
            };
        }

        let operation = self.parse_operation_type().unwrap_or(OperationType::Query);
        let name = self.at_kind(TokenKind::Name).then(|| self.parse_name());
        let variables = if self.at_kind(TokenKind::LParen) {
            self.delimited(TokenKind::LParen, TokenKind::RParen, Self::parse_variable_definition)
        } else {
            Vec::new()
        };
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();
        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };
        let directives = self.parse_directives(true);
        VariableDefinition {
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.expect_keyword("fragment");
        let name = self.parse_name();
        if name.as_str() == "on" {
            self.diagnostics.error(
                codes::INVALID_SYNTAX,
                "Fragment cannot be named \"on\".",
                name.span,
            );
        }
        self.expect_keyword("on");
        let type_condition = self.parse_name();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();
        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        let selections = self.delimited(TokenKind::LBrace, TokenKind::RBrace, Self::parse_selection);
        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    fn parse_selection(&mut self) -> Selection {
        let start = self.current.span.start;

        if !self.eat(TokenKind::Spread) {
            return Selection::Field(self.parse_field());
        }

        if self.at_kind(TokenKind::Name) && !self.at_keyword("on") {
            let name = self.parse_name();
            let directives = self.parse_directives(false);
            return Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: self.span_from(start),
            });
        }

        let type_condition = if self.at_keyword("on") {
            self.advance();
            Some(self.parse_name())
        } else {
            None
        };
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();
        Selection::InlineFragment(InlineFragment {
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        })
    }

    fn parse_field(&mut self) -> Field {
        let start = self.current.span.start;
        let first = self.parse_name();
        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first), self.parse_name())
        } else {
            (None, first)
        };
        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives(false);
        let selection_set = if self.at_kind(TokenKind::LBrace) {
            self.parse_selection_set()
        } else {
            SelectionSet::default()
        };
        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }
}
