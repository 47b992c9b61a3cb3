//! SDL printing.
//!
//! Used to dump the schema produced by the document manipulation pass, so
//! generated types (paginators, introspection) can be inspected.

use crate::ast::*;

/// Printing options.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Number of spaces for indentation.
    pub indent_size: usize,
    /// Use tabs instead of spaces.
    pub use_tabs: bool,
    /// Print directive usages on types and fields.
    pub include_directives: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            use_tabs: false,
            include_directives: true,
        }
    }
}

/// Document printer.
pub struct Printer {
    options: PrintOptions,
    output: String,
    indent: usize,
}

impl Printer {
    #[must_use]
    pub fn new(options: PrintOptions) -> Self {
        Self {
            options,
            output: String::new(),
            indent: 0,
        }
    }

    /// Prints a document.
    pub fn print(&mut self, document: &Document) -> String {
        self.output.clear();

        for (i, def) in document.definitions.iter().enumerate() {
            if i > 0 {
                self.output.push_str("\n\n");
            }
            self.print_definition(def);
        }
        self.output.push('\n');

        std::mem::take(&mut self.output)
    }

    fn print_definition(&mut self, def: &Definition) {
        match def {
            Definition::Schema(s) => self.print_schema(s),
            Definition::Type(t) => self.print_type_definition(t),
            Definition::TypeExtension(t) => {
                self.output.push_str("extend ");
                self.print_type_definition(t);
            }
            Definition::Directive(d) => self.print_directive_definition(d),
            Definition::Operation(o) => self.print_operation(o),
            Definition::Fragment(f) => {
                self.output.push_str("fragment ");
                self.output.push_str(f.name.as_str());
                self.output.push_str(" on ");
                self.output.push_str(f.type_condition.as_str());
                self.print_directives(&f.directives);
                self.output.push(' ');
                self.print_selection_set(&f.selection_set);
            }
        }
    }

    fn print_schema(&mut self, schema: &SchemaDefinition) {
        self.print_description(schema.description.as_deref());
        self.output.push_str("schema");
        self.print_directives(&schema.directives);
        self.output.push_str(" {\n");
        self.indent += 1;
        for (kind, name) in &schema.operations {
            self.push_indent();
            self.output.push_str(kind.as_str());
            self.output.push_str(": ");
            self.output.push_str(name.as_str());
            self.output.push('\n');
        }
        self.indent -= 1;
        self.output.push('}');
    }

    fn print_type_definition(&mut self, type_def: &TypeDefinition) {
        self.print_description(type_def.description());
        self.output.push_str(type_def.kind());
        self.output.push(' ');
        self.output.push_str(type_def.name());

        match type_def {
            TypeDefinition::Object(obj) => {
                self.print_implements(&obj.implements);
                self.print_directives(&obj.directives);
                self.print_fields(&obj.fields);
            }
            TypeDefinition::Interface(iface) => {
                self.print_implements(&iface.implements);
                self.print_directives(&iface.directives);
                self.print_fields(&iface.fields);
            }
            TypeDefinition::Union(u) => {
                self.print_directives(&u.directives);
                if !u.members.is_empty() {
                    self.output.push_str(" = ");
                    let members: Vec<&str> = u.members.iter().map(Name::as_str).collect();
                    self.output.push_str(&members.join(" | "));
                }
            }
            TypeDefinition::Enum(e) => {
                self.print_directives(&e.directives);
                if !e.values.is_empty() {
                    self.output.push_str(" {\n");
                    self.indent += 1;
                    for value in &e.values {
                        self.push_indent();
                        self.print_description(value.description.as_deref());
                        self.output.push_str(value.name.as_str());
                        self.print_directives(&value.directives);
                        self.output.push('\n');
                    }
                    self.indent -= 1;
                    self.output.push('}');
                }
            }
            TypeDefinition::InputObject(input) => {
                self.print_directives(&input.directives);
                if !input.fields.is_empty() {
                    self.output.push_str(" {\n");
                    self.indent += 1;
                    for field in &input.fields {
                        self.push_indent();
                        self.print_input_value(field);
                        self.output.push('\n');
                    }
                    self.indent -= 1;
                    self.output.push('}');
                }
            }
            TypeDefinition::Scalar(s) => self.print_directives(&s.directives),
        }
    }

    fn print_directive_definition(&mut self, d: &DirectiveDefinition) {
        self.print_description(d.description.as_deref());
        self.output.push_str("directive @");
        self.output.push_str(d.name.as_str());
        self.print_argument_definitions(&d.arguments);
        if d.repeatable {
            self.output.push_str(" repeatable");
        }
        self.output.push_str(" on ");
        let locations: Vec<&str> = d.locations.iter().map(|l| l.as_str()).collect();
        self.output.push_str(&locations.join(" | "));
    }

    fn print_operation(&mut self, o: &OperationDefinition) {
        self.output.push_str(o.operation.as_str());
        if let Some(name) = &o.name {
            self.output.push(' ');
            self.output.push_str(name.as_str());
        }
        if !o.variables.is_empty() {
            self.output.push('(');
            for (i, var) in o.variables.iter().enumerate() {
                if i > 0 {
                    self.output.push_str(", ");
                }
                self.output.push('$');
                self.output.push_str(var.name.as_str());
                self.output.push_str(": ");
                self.output.push_str(&var.ty.to_string());
                if let Some(default) = &var.default_value {
                    self.output.push_str(" = ");
                    self.output.push_str(&default.to_string());
                }
            }
            self.output.push(')');
        }
        self.print_directives(&o.directives);
        self.output.push(' ');
        self.print_selection_set(&o.selection_set);
    }

    fn print_selection_set(&mut self, set: &SelectionSet) {
        self.output.push_str("{\n");
        self.indent += 1;
        for selection in &set.selections {
            self.push_indent();
            match selection {
                Selection::Field(field) => {
                    if let Some(alias) = &field.alias {
                        self.output.push_str(alias.as_str());
                        self.output.push_str(": ");
                    }
                    self.output.push_str(field.name.as_str());
                    self.print_arguments(&field.arguments);
                    self.print_directives(&field.directives);
                    if !field.selection_set.is_empty() {
                        self.output.push(' ');
                        self.print_selection_set(&field.selection_set);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    self.output.push_str("...");
                    self.output.push_str(spread.name.as_str());
                    self.print_directives(&spread.directives);
                }
                Selection::InlineFragment(inline) => {
                    self.output.push_str("...");
                    if let Some(on) = &inline.type_condition {
                        self.output.push_str(" on ");
                        self.output.push_str(on.as_str());
                    }
                    self.print_directives(&inline.directives);
                    self.output.push(' ');
                    self.print_selection_set(&inline.selection_set);
                }
            }
            self.output.push('\n');
        }
        self.indent -= 1;
        self.push_indent();
        self.output.push('}');
    }

    fn print_fields(&mut self, fields: &[FieldDefinition]) {
        if fields.is_empty() {
            return;
        }
        self.output.push_str(" {\n");
        self.indent += 1;
        for field in fields {
            self.push_indent();
            self.print_description(field.description.as_deref());
            self.output.push_str(field.name.as_str());
            self.print_argument_definitions(&field.arguments);
            self.output.push_str(": ");
            self.output.push_str(&field.ty.to_string());
            self.print_directives(&field.directives);
            self.output.push('\n');
        }
        self.indent -= 1;
        self.output.push('}');
    }

    fn print_argument_definitions(&mut self, args: &[InputValueDefinition]) {
        if args.is_empty() {
            return;
        }
        self.output.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.print_input_value(arg);
        }
        self.output.push(')');
    }

    fn print_input_value(&mut self, value: &InputValueDefinition) {
        self.output.push_str(value.name.as_str());
        self.output.push_str(": ");
        self.output.push_str(&value.ty.to_string());
        if let Some(default) = &value.default_value {
            self.output.push_str(" = ");
            self.output.push_str(&default.to_string());
        }
        self.print_directives(&value.directives);
    }

    fn print_implements(&mut self, implements: &[Name]) {
        if implements.is_empty() {
            return;
        }
        self.output.push_str(" implements ");
        let names: Vec<&str> = implements.iter().map(Name::as_str).collect();
        self.output.push_str(&names.join(" & "));
    }

    fn print_directives(&mut self, directives: &[Directive]) {
        if !self.options.include_directives {
            return;
        }
        for directive in directives {
            self.output.push_str(" @");
            self.output.push_str(directive.name.as_str());
            self.print_arguments(&directive.arguments);
        }
    }

    fn print_arguments(&mut self, args: &[Argument]) {
        if args.is_empty() {
            return;
        }
        self.output.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(arg.name.as_str());
            self.output.push_str(": ");
            self.output.push_str(&arg.value.to_string());
        }
        self.output.push(')');
    }

    fn print_description(&mut self, description: Option<&str>) {
        let Some(text) = description else {
            return;
        };
        if text.contains('\n') {
            self.output.push_str("\"\"\"\n");
            for line in text.lines() {
                self.push_indent();
                self.output.push_str(line);
                self.output.push('\n');
            }
            self.push_indent();
            self.output.push_str("\"\"\"\n");
        } else {
            self.output.push_str(&format!("{text:?}\n"));
        }
        self.push_indent();
    }

    fn push_indent(&mut self) {
        if self.options.use_tabs {
            for _ in 0..self.indent {
                self.output.push('\t');
            }
        } else {
            for _ in 0..self.indent * self.options.indent_size {
                self.output.push(' ');
            }
        }
    }
}

/// Prints a document with default options.
#[must_use]
pub fn print(document: &Document) -> String {
    Printer::new(PrintOptions::default()).print(document)
}

/// Prints a document with custom options.
#[must_use]
pub fn print_with_options(document: &Document, options: PrintOptions) -> String {
    Printer::new(options).print(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_print_schema() {
        let result = parse(
            r#"
            "Users of the app"
            type User @model { id: ID!, posts(first: Int! = 10): [Post!]! @hasMany }
            union Result = User | Post
            enum Role { ADMIN EDITOR }
            directive @hasMany(relation: String) on FIELD_DEFINITION
            "#,
        );
        insta::assert_snapshot!(print(&result.document), @r###"
        "Users of the app"
        type User @model {
          id: ID!
          posts(first: Int! = 10): [Post!]! @hasMany
        }

        union Result = User | Post

        enum Role {
          ADMIN
          EDITOR
        }

        directive @hasMany(relation: String) on FIELD_DEFINITION
        "###);
    }

    #[test]
    fn test_print_without_directives() {
        let result = parse("type Query { users: [User!]! @all }");
        let options = PrintOptions {
            include_directives: false,
            ..PrintOptions::default()
        };
        assert_eq!(
            print_with_options(&result.document, options),
            "type Query {\n  users: [User!]!\n}\n"
        );
    }
}
