//! Access checks over object results.
//!
//! Every field cell carries an access-check slot next to its data slot. A
//! consumer that honors policy reads both through [`observe_field`]: the
//! data failure takes priority, then a denied check, then the data itself.

use std::fmt;
use std::sync::Arc;

use crate::error::SharedError;
use crate::error::shared;
use crate::json_ext::Path;
use crate::result::ACCESS_CHECK_SLOT;
use crate::result::EngineData;
use crate::result::Key;
use crate::result::ObjectEngineResult;
use crate::result::RAW_VALUE_SLOT;
use crate::spec::RawSelectionSet;
use crate::spec::Schema;
use crate::value::Value;

/// The outcome of an access check.
#[derive(Clone, Debug)]
pub enum CheckerResult {
    Success,
    Error(SharedError),
}

impl CheckerResult {
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CheckerResult::Error(shared(error))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckerResult::Success)
    }

    pub fn error(&self) -> Option<&SharedError> {
        match self {
            CheckerResult::Success => None,
            CheckerResult::Error(error) => Some(error),
        }
    }

    /// Combines this type-level result with a field-level result. A
    /// field-level failure wins; otherwise the type-level result stands.
    pub fn combine(self, field_result: CheckerResult) -> CheckerResult {
        match field_result {
            CheckerResult::Error(error) => CheckerResult::Error(error),
            CheckerResult::Success => self,
        }
    }
}

/// Success compares equal to success; errors compare by identity.
impl PartialEq for CheckerResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CheckerResult::Success, CheckerResult::Success) => true,
            (CheckerResult::Error(a), CheckerResult::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Combines pending type-level and field-level checks without awaiting
/// either when both are already settled.
pub fn combine_checks(
    type_check: Value<CheckerResult>,
    field_check: Value<CheckerResult>,
) -> Value<CheckerResult> {
    field_check.flat_map(move |field_result| {
        type_check.map(move |type_result| type_result.combine(field_result))
    })
}

/// The object's type-level check, run once per object instance.
///
/// The first caller claims the object's type-check cell and stores the
/// outcome of `run`; every later caller for any field of the same object
/// reads that stored outcome instead of running the checker again.
pub fn type_check_once<F>(
    oer: &ObjectEngineResult,
    run: F,
) -> Result<Value<CheckerResult>, SharedError>
where
    F: FnOnce() -> Value<CheckerResult>,
{
    let cell = oer.type_check_cell();
    cell.compute_if_absent(|slots| slots.set(0, run().map(EngineData::Checker)))?;
    let value = cell.get_value(0).map_err(shared)?;
    Ok(value.map(|data| match data {
        EngineData::Checker(result) => result,
        _ => CheckerResult::Success,
    }))
}

/// Reads `key` honoring its access check: the data slot's failure first,
/// then a denied check, then the data.
pub async fn observe_field(
    oer: &ObjectEngineResult,
    key: &Key,
) -> Result<EngineData, SharedError> {
    let data = oer.fetch(key, RAW_VALUE_SLOT).await?;
    match oer.fetch(key, ACCESS_CHECK_SLOT).await? {
        EngineData::Checker(CheckerResult::Error(error)) => Err(error),
        _ => Ok(data),
    }
}

/// A denied field read, as attached to the response with the field's path.
#[derive(Clone, Debug)]
pub struct FieldError {
    pub path: Path,
    pub error: SharedError,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}", self.error, self.path)
    }
}

/// Errors raised by [`ProxyEngineObjectData`].
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// A checker or resolver read a field outside its declared selections.
    #[error("field '{type_name}.{field}' is not in the required selections ({context})")]
    FieldNotSelected {
        type_name: String,
        field: String,
        context: String,
    },
}

/// A restricted view of an object result handed to resolvers and checkers.
///
/// Reads are limited to the declared required selections and bypass the
/// access-check slot: visibility was decided when the selections were
/// declared, not per read.
pub struct ProxyEngineObjectData {
    schema: Arc<Schema>,
    oer: Arc<ObjectEngineResult>,
    selections: Option<RawSelectionSet>,
    context: String,
}

impl ProxyEngineObjectData {
    /// An unrestricted view.
    pub fn new(schema: Arc<Schema>, oer: Arc<ObjectEngineResult>) -> Self {
        Self {
            schema,
            oer,
            selections: None,
            context: String::new(),
        }
    }

    /// A view restricted to `selections`. `context` names the consumer for
    /// diagnostics, e.g. `"checker required selections"`.
    pub fn restricted(
        schema: Arc<Schema>,
        oer: Arc<ObjectEngineResult>,
        selections: RawSelectionSet,
        context: impl Into<String>,
    ) -> Self {
        Self {
            schema,
            oer,
            selections: Some(selections),
            context: context.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        self.oer.type_name()
    }

    pub async fn fetch(&self, key: &Key) -> Result<EngineData, SharedError> {
        if let Some(selections) = &self.selections {
            let selected = selections
                .contains_field(&self.schema, self.oer.type_name(), key.name())
                .map_err(shared)?;
            if !selected {
                return Err(shared(AccessError::FieldNotSelected {
                    type_name: self.oer.type_name().to_string(),
                    field: key.name().to_string(),
                    context: self.context.clone(),
                }));
            }
        }
        self.oer.fetch(key, RAW_VALUE_SLOT).await
    }
}

impl fmt::Debug for ProxyEngineObjectData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProxyEngineObjectData")
            .field("type_name", &self.oer.type_name())
            .field("restricted", &self.selections.is_some())
            .finish()
    }
}
