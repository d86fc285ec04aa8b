//! Startup validation of a registry against its schema.
//!
//! Runs before serving: every required selection must be schematically
//! valid, and the dependency graph the required selections induce must be
//! acyclic. A registry that fails validation never executes.

mod cycles;
mod selections;

pub use cycles::validate_registry;
pub use selections::validate_required_selections;

use uuid::Uuid;

/// Errors raised by registry validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The registry was built against a different schema instance.
    #[error("registry was built for schema {registry}, validated against schema {schema}")]
    SchemaMismatch { registry: Uuid, schema: Uuid },

    /// Required selections form a dependency cycle.
    #[error("Cyclic required selections detected in path: {}", .path.join(" -> "))]
    RequiredSelectionsCycle { path: Vec<String> },

    /// A required selection references an unknown type.
    #[error("unknown type '{name}' in required selections")]
    UnknownType { name: String },

    /// A required selection references an unknown field.
    #[error("unknown field '{type_name}.{field}' in required selections")]
    UnknownField { type_name: String, field: String },

    /// A fragment spread has no matching definition.
    #[error("unknown fragment '{name}' in required selections")]
    UnknownFragment { name: String },

    /// A leaf-typed field carries sub-selections.
    #[error("field '{type_name}.{field}' is a leaf and cannot have sub-selections")]
    SubselectionOnLeaf { type_name: String, field: String },

    /// A variable binding's path walks through a leaf type.
    #[error("variable '{variable}' binds path '{path}' through a non-composite type")]
    InvalidVariablePath { variable: String, path: String },
}
