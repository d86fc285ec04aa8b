//! Claim-once, multi-slot result containers.
//!
//! A [`Cell`] holds a fixed number of slots that are produced together by a
//! single winner: the first caller of [`Cell::compute_if_absent`] claims the
//! cell and runs its producer, every later caller gets the already-claimed
//! cell untouched. Readers may subscribe to a slot before its value exists
//! and are woken exactly when it settles.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use static_assertions::const_assert;
use tokio::sync::watch;

use crate::error::CellError;
use crate::error::SharedError;
use crate::error::shared;
use crate::result::EngineData;
use crate::value::Value;

/// Upper bound on the number of slots in a cell, so the set-slot mask fits in
/// a `u32`.
pub const MAX_SLOTS: usize = 32;

const_assert!(MAX_SLOTS <= u32::BITS as usize);

struct Slot {
    state: watch::Sender<Option<Value<EngineData>>>,
}

impl Slot {
    fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    fn settle_if_unset(&self, value: Value<EngineData>) {
        self.state.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(value);
                true
            } else {
                false
            }
        });
    }
}

/// A claim-once container of `1..=MAX_SLOTS` jointly-produced slots.
pub struct Cell {
    claimed: AtomicBool,
    slots: Box<[Slot]>,
}

impl Cell {
    /// Creates an unclaimed cell with `slots` empty slots.
    pub fn create(slots: usize) -> Result<Self, CellError> {
        if slots == 0 || slots > MAX_SLOTS {
            return Err(CellError::InvalidSlotCount {
                requested: slots,
                max: MAX_SLOTS,
            });
        }
        Ok(Self::sized(slots))
    }

    /// An unclaimed two-slot cell, the shape used for every field result.
    pub(crate) fn for_field_slots() -> Self {
        Self::sized(crate::result::FIELD_SLOTS)
    }

    /// An unclaimed single-slot cell holding an object's type-level check.
    pub(crate) fn for_type_check() -> Self {
        Self::sized(1)
    }

    fn sized(slots: usize) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            slots: (0..slots).map(|_| Slot::new()).collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the cell and runs `producer` if no one has claimed it yet.
    ///
    /// The producer receives a [`SlotSetter`] and must set every slot exactly
    /// once. If it returns an error, or returns without setting every slot,
    /// that failure becomes the outcome of each slot the producer left unset;
    /// slots it did set keep their values. Losing callers return `Ok(())`
    /// without running anything and read whatever the winner produced.
    pub fn compute_if_absent<F>(&self, producer: F) -> Result<(), SharedError>
    where
        F: FnOnce(&mut SlotSetter<'_>) -> Result<(), SharedError>,
    {
        if !self.claim() {
            return Ok(());
        }
        self.run_producer(producer)
    }

    /// Like [`Cell::compute_if_absent`], but an already-claimed cell is a
    /// synchronous failure carrying `label` for diagnostics.
    pub fn compute_if_unclaimed<F>(&self, label: &str, producer: F) -> Result<(), SharedError>
    where
        F: FnOnce(&mut SlotSetter<'_>) -> Result<(), SharedError>,
    {
        if !self.claim() {
            return Err(shared(CellError::AlreadyClaimed {
                label: label.to_string(),
            }));
        }
        self.run_producer(producer)
    }

    fn run_producer<F>(&self, producer: F) -> Result<(), SharedError>
    where
        F: FnOnce(&mut SlotSetter<'_>) -> Result<(), SharedError>,
    {
        let mut setter = SlotSetter {
            slots: &self.slots,
            set_mask: 0,
        };
        let outcome = producer(&mut setter).and_then(|()| setter.check_complete());
        if let Err(error) = outcome {
            tracing::debug!(error = %error, "cell producer failed, poisoning unset slots");
            self.poison(&error);
            return Err(error);
        }
        Ok(())
    }

    /// Settles every still-unset slot with `error`. Already-set slots keep
    /// their values.
    fn poison(&self, error: &SharedError) {
        for slot in self.slots.iter() {
            slot.settle_if_unset(Value::from_shared_error(error.clone()));
        }
    }

    /// The value of `slot`, resolved if the slot has settled and pending on
    /// the producer otherwise. Reading ahead of the write is allowed.
    pub fn get_value(&self, slot: usize) -> Result<Value<EngineData>, CellError> {
        let slot = self.slots.get(slot).ok_or(CellError::SlotOutOfBounds {
            slot,
            size: self.slots.len(),
        })?;
        if let Some(value) = slot.state.borrow().as_ref() {
            return Ok(value.clone());
        }
        let mut receiver = slot.state.subscribe();
        Ok(Value::from_future(async move {
            let stored = receiver
                .wait_for(|state| state.is_some())
                .await
                .map_err(|_| shared(CellError::Dropped))?
                .clone();
            match stored {
                Some(value) => value.get().await,
                None => Err(shared(CellError::Dropped)),
            }
        }))
    }

    /// Awaits the outcome of `slot`.
    pub async fn fetch(&self, slot: usize) -> Result<EngineData, SharedError> {
        self.get_value(slot).map_err(shared)?.get().await
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("slots", &self.slots.len())
            .field("claimed", &self.is_claimed())
            .finish()
    }
}

/// Writer handle handed to a cell producer. Tracks which slots the producer
/// has set so incomplete or duplicate writes are caught.
pub struct SlotSetter<'a> {
    slots: &'a [Slot],
    set_mask: u32,
}

impl SlotSetter<'_> {
    /// Settles `slot` with an already-available value.
    pub fn set(&mut self, slot: usize, value: Value<EngineData>) -> Result<(), SharedError> {
        if slot >= self.slots.len() {
            return Err(shared(CellError::SlotOutOfBounds {
                slot,
                size: self.slots.len(),
            }));
        }
        let bit = 1u32 << slot;
        if self.set_mask & bit != 0 {
            return Err(shared(CellError::SlotAlreadySet { slot }));
        }
        self.set_mask |= bit;
        self.slots[slot].state.send_replace(Some(value));
        Ok(())
    }

    fn check_complete(&self) -> Result<(), SharedError> {
        let size = self.slots.len();
        let full = if size == MAX_SLOTS {
            u32::MAX
        } else {
            (1u32 << size) - 1
        };
        if self.set_mask != full {
            return Err(shared(CellError::UnsetSlots {
                size,
                mask: self.set_mask,
            }));
        }
        Ok(())
    }
}
