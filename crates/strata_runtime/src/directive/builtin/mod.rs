//! Directives shipped with the runtime.
//!
//! Every directive here is registered under [`BUILTIN_DIRECTIVE_NAMESPACE`]
//! and can be shadowed by a class of the same name in a user or plugin
//! namespace.

mod aggregate;
mod conditions;
mod field;
mod middleware;
mod query;
mod relation;
mod types;

pub use aggregate::{AggregateDirective, CountDirective};
pub use conditions::{
    ConditionDirective, ConditionOperator, EqDirective, InDirective, NeqDirective, NotInDirective,
    WhereDirective,
};
pub use field::{FieldDirective, RenameDirective};
pub use middleware::{
    ConvertEmptyStringsToNullDirective, InjectDirective, TrimDirective, ValidateEachDirective,
};
pub use query::{AllDirective, FindDirective};
pub use relation::{PaginationType, RelationDirective};
pub use types::{
    EnumDirective, InterfaceDirective, ModelDirective, ScalarClassDirective, UnionDirective,
};

use super::{Directive, DirectiveClass, BUILTIN_DIRECTIVE_NAMESPACE};
use crate::namespace::ClassRegistry;
use crate::store::RelationKind;
use std::sync::Arc;

/// Registers every built-in directive class.
pub fn register_builtin_directives(classes: &mut ClassRegistry<DirectiveClass>) {
    let mut add = |class: &str, directive: DirectiveClass| {
        classes.register(BUILTIN_DIRECTIVE_NAMESPACE, class, directive);
    };

    add("FieldDirective", DirectiveClass::of::<FieldDirective>());
    add("RenameDirective", DirectiveClass::of::<RenameDirective>());
    add("AllDirective", DirectiveClass::of::<AllDirective>());
    add("FindDirective", DirectiveClass::of::<FindDirective>());

    for kind in [
        RelationKind::HasOne,
        RelationKind::HasMany,
        RelationKind::BelongsTo,
        RelationKind::BelongsToMany,
    ] {
        add(
            relation::class_name(kind),
            DirectiveClass::new(relation::definition(kind), move |node| {
                RelationDirective::new(kind, node).map(|d| Arc::new(d) as Arc<dyn Directive>)
            }),
        );
    }
    add("CountDirective", DirectiveClass::of::<CountDirective>());
    add("AggregateDirective", DirectiveClass::of::<AggregateDirective>());

    add("EqDirective", DirectiveClass::of::<EqDirective>());
    add("NeqDirective", DirectiveClass::of::<NeqDirective>());
    add("InDirective", DirectiveClass::of::<InDirective>());
    add("NotInDirective", DirectiveClass::of::<NotInDirective>());
    add("WhereDirective", DirectiveClass::of::<WhereDirective>());

    add("TrimDirective", DirectiveClass::of::<TrimDirective>());
    add(
        "ConvertEmptyStringsToNullDirective",
        DirectiveClass::of::<ConvertEmptyStringsToNullDirective>(),
    );
    add("InjectDirective", DirectiveClass::of::<InjectDirective>());
    add("ValidateEachDirective", DirectiveClass::of::<ValidateEachDirective>());

    add("ModelDirective", DirectiveClass::of::<ModelDirective>());
    add("UnionDirective", DirectiveClass::of::<UnionDirective>());
    add("InterfaceDirective", DirectiveClass::of::<InterfaceDirective>());
    add("EnumDirective", DirectiveClass::of::<EnumDirective>());
    add("ScalarDirective", DirectiveClass::of::<ScalarClassDirective>());
}
