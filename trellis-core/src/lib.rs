//! Concurrent execution core for the Trellis GraphQL engine.
//!
//! The engine resolves a query as a graph of independently-produced field
//! results. The pieces here are the building blocks of that model:
//!
//! * [`Value`]: an asynchronous result that composes without suspending
//!   when its outcome is already known.
//! * [`Cell`]: a claim-once container of jointly-produced slots, one
//!   two-slot cell per field (data plus access check).
//! * [`ObjectEngineResult`]: the concurrent result of one object, keyed by
//!   field identity (name, alias, coerced arguments).
//! * [`ResolverDispatcher`] and [`DispatcherRegistry`]: resolver and checker
//!   registration, with transparent same-tick batching.
//! * [`validate_registry`]: startup validation, including required-selection
//!   cycle detection.

mod access;
mod cell;
mod dispatch;
mod error;
mod json_ext;
mod registry;
mod result;
mod spec;
mod validation;
mod value;

pub use access::*;
pub use cell::*;
pub use dispatch::*;
pub use error::*;
pub use json_ext::*;
pub use registry::*;
pub use result::*;
pub use spec::*;
pub use validation::*;
pub use value::*;
