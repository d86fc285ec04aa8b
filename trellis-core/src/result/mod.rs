//! Concurrent object results.
//!
//! An [`ObjectEngineResult`] maps field identities to claim-once cells.
//! Cells spring into existence on first access, whether that access is a
//! producer claiming the field or a reader subscribing ahead of it, so
//! independent producers and consumers need no coordination beyond the key.

mod data;
mod from_map;
mod key;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

pub use data::EngineData;
pub use key::Key;

use crate::cell::Cell;
use crate::cell::SlotSetter;
use crate::error::CellError;
use crate::error::SharedError;
use crate::error::shared;
use crate::value::Value;

/// Slot holding a field's resolved data.
pub const RAW_VALUE_SLOT: usize = 0;

/// Slot holding a field's access-check outcome.
pub const ACCESS_CHECK_SLOT: usize = 1;

/// Every field cell has exactly these two slots.
pub(crate) const FIELD_SLOTS: usize = 2;

#[derive(Clone, Debug)]
enum Resolution {
    Pending,
    Resolved,
    Failed(SharedError),
}

/// The concurrent result of resolving one object, keyed by field identity.
pub struct ObjectEngineResult {
    type_name: String,
    cells: DashMap<Key, Arc<Cell>>,
    type_check: Arc<Cell>,
    resolution: Option<watch::Sender<Resolution>>,
}

impl ObjectEngineResult {
    /// An empty result for an object of `type_name`.
    pub fn new_for_type(type_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            cells: DashMap::new(),
            type_check: Arc::new(Cell::for_type_check()),
            resolution: None,
        })
    }

    /// An empty result whose underlying fetch may still fail as a whole.
    /// Field reads block on their slot as usual, but race against the
    /// object-level failure reported through
    /// [`ObjectEngineResult::resolve_exceptionally`].
    pub fn new_pending_for_type(type_name: impl Into<String>) -> Arc<Self> {
        let (sender, _) = watch::channel(Resolution::Pending);
        Arc::new(Self {
            type_name: type_name.into(),
            cells: DashMap::new(),
            type_check: Arc::new(Cell::for_type_check()),
            resolution: Some(sender),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The cell for `key`, created unclaimed on first access.
    pub fn cell(&self, key: &Key) -> Arc<Cell> {
        self.cells
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Cell::for_field_slots()))
            .value()
            .clone()
    }

    /// The single-slot cell holding this object's type-level check, claimed
    /// once per object instance.
    pub fn type_check_cell(&self) -> Arc<Cell> {
        Arc::clone(&self.type_check)
    }

    /// Claims `key`'s cell and runs `producer` if nobody has yet; otherwise
    /// leaves the winner's result in place. Either way, returns the value of
    /// the field's data slot.
    pub fn compute_if_absent<F>(&self, key: &Key, producer: F) -> Result<Value<EngineData>, SharedError>
    where
        F: FnOnce(&mut SlotSetter<'_>) -> Result<(), SharedError>,
    {
        let cell = self.cell(key);
        cell.compute_if_absent(producer)?;
        cell.get_value(RAW_VALUE_SLOT).map_err(shared)
    }

    /// The value of `key`'s `slot`, without awaiting it. The cell is created
    /// if it does not exist yet, so reads may precede the producer.
    pub fn get_value(&self, key: &Key, slot: usize) -> Result<Value<EngineData>, CellError> {
        self.cell(key).get_value(slot)
    }

    /// Awaits the outcome of `key`'s `slot`.
    ///
    /// On a pending result this races the slot against the object-level
    /// fetch outcome: a failure recorded by
    /// [`ObjectEngineResult::resolve_exceptionally`], past or future, wins
    /// over waiting forever on a slot that will never be produced. A slot
    /// that settles first keeps its own outcome.
    pub async fn fetch(&self, key: &Key, slot: usize) -> Result<EngineData, SharedError> {
        let value = self.get_value(key, slot).map_err(shared)?;
        let Some(resolution) = &self.resolution else {
            return value.get().await;
        };
        if let Resolution::Failed(error) = &*resolution.borrow() {
            return Err(error.clone());
        }
        let mut receiver = resolution.subscribe();
        tokio::select! {
            biased;
            error = Self::resolution_failure(&mut receiver) => Err(error),
            outcome = value.get() => outcome,
        }
    }

    /// Resolves only when the object-level fetch has been marked failed.
    async fn resolution_failure(receiver: &mut watch::Receiver<Resolution>) -> SharedError {
        loop {
            {
                let state = receiver.borrow_and_update();
                if let Resolution::Failed(error) = &*state {
                    return error.clone();
                }
            }
            if receiver.changed().await.is_err() {
                // Sender gone without a failure: this branch never fires.
                futures::future::pending::<()>().await;
            }
        }
    }

    /// Marks the object-level fetch as successfully completed. Later calls,
    /// successful or not, are ignored. A no-op for non-pending results.
    pub fn resolve(&self) {
        if let Some(resolution) = &self.resolution {
            resolution.send_if_modified(|state| {
                if matches!(state, Resolution::Pending) {
                    *state = Resolution::Resolved;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Marks the object-level fetch as failed. Later calls are ignored.
    pub fn resolve_exceptionally(&self, error: SharedError) {
        if let Some(resolution) = &self.resolution {
            resolution.send_if_modified(|state| {
                if matches!(state, Resolution::Pending) {
                    *state = Resolution::Failed(error.clone());
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Awaits the object-level fetch outcome and returns its failure, if
    /// any. `None` immediately for non-pending results.
    pub async fn resolved_exception(&self) -> Option<SharedError> {
        let resolution = self.resolution.as_ref()?;
        let mut receiver = resolution.subscribe();
        let outcome = match receiver
            .wait_for(|state| !matches!(state, Resolution::Pending))
            .await
        {
            Ok(state) => match &*state {
                Resolution::Failed(error) => Some(error.clone()),
                _ => None,
            },
            // Sender dropped while still pending.
            Err(_) => None,
        };
        outcome
    }

    /// The keys that currently have cells, in no particular order.
    pub fn keys(&self) -> Vec<Key> {
        self.cells.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl fmt::Debug for ObjectEngineResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ObjectEngineResult")
            .field("type_name", &self.type_name)
            .field("cells", &self.cells.len())
            .field("pending", &self.resolution.is_some())
            .finish()
    }
}
