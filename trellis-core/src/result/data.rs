use std::fmt;
use std::sync::Arc;

use super::ObjectEngineResult;
use crate::access::CheckerResult;
use crate::cell::Cell;
use crate::json_ext::Json;

/// The payload stored in a result slot.
///
/// Composite shapes nest engine results rather than plain JSON: objects hold
/// a child [`ObjectEngineResult`], lists hold one two-slot [`Cell`] per
/// element so each element carries its own outcome and access decision.
#[derive(Clone)]
pub enum EngineData {
    Null,
    Scalar(Json),
    Object(Arc<ObjectEngineResult>),
    List(Vec<Arc<Cell>>),
    Checker(CheckerResult),
}

impl EngineData {
    pub fn as_scalar(&self) -> Option<&Json> {
        match self {
            EngineData::Scalar(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<ObjectEngineResult>> {
        match self {
            EngineData::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Arc<Cell>]> {
        match self {
            EngineData::List(cells) => Some(cells),
            _ => None,
        }
    }

    pub fn as_checker(&self) -> Option<&CheckerResult> {
        match self {
            EngineData::Checker(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EngineData::Null)
    }
}

impl fmt::Debug for EngineData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineData::Null => f.write_str("Null"),
            EngineData::Scalar(json) => f.debug_tuple("Scalar").field(json).finish(),
            EngineData::Object(object) => f
                .debug_tuple("Object")
                .field(&object.type_name())
                .finish(),
            EngineData::List(cells) => write!(f, "List({} elements)", cells.len()),
            EngineData::Checker(result) => f.debug_tuple("Checker").field(result).finish(),
        }
    }
}

/// Scalars compare structurally; objects, lists and checker errors compare by
/// identity, matching how results are shared between consumers.
impl PartialEq for EngineData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EngineData::Null, EngineData::Null) => true,
            (EngineData::Scalar(a), EngineData::Scalar(b)) => a == b,
            (EngineData::Object(a), EngineData::Object(b)) => Arc::ptr_eq(a, b),
            (EngineData::List(a), EngineData::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            (EngineData::Checker(a), EngineData::Checker(b)) => a == b,
            _ => false,
        }
    }
}
