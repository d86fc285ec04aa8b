//! Schema and selection-set model.
//!
//! Schemas are built programmatically and carry a unique id so registries can
//! be checked against the exact schema instance they were built for.

mod schema;
mod selection;

pub use schema::ArgumentDef;
pub use schema::FieldDef;
pub use schema::InterfaceType;
pub use schema::ObjectType;
pub use schema::Schema;
pub use schema::SchemaBuilder;
pub use schema::TypeDef;
pub use schema::UnionType;
pub use selection::ArgumentValue;
pub use selection::CollectedField;
pub use selection::FieldSelection;
pub use selection::Fragment;
pub use selection::Fragments;
pub use selection::RawSelectionSet;
pub use selection::Selection;
pub use selection::field;
pub use selection::inline;
pub use selection::spread;

/// GraphQL spec errors raised while interpreting selections against a schema.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The selection references a type the schema does not define.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// The selection references a field its parent type does not define.
    #[error("unknown field '{type_name}.{field}'")]
    UnknownField { type_name: String, field: String },

    /// A fragment spread has no matching fragment definition.
    #[error("unknown fragment '{0}'")]
    UnknownFragment(String),

    /// An abstract-typed value carries no `__typename` discriminator.
    #[error("missing __typename for abstract type '{0}'")]
    MissingTypename(String),

    /// Fragment expansion exceeded the recursion limit.
    #[error("selection recursion limit exceeded")]
    RecursionLimitExceeded,
}
