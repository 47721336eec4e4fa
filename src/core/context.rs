//! Named-slot carrier for ambient trace context.
//!
//! Instrumentation layers above this crate thread the active span context
//! through named slots; the export mapper only ever reads it. Slot values
//! are per-thread, so concurrent request handlers never observe each
//! other's context.

use crate::core::error::{Result, TracekitError};
use crate::core::types::{SpanId, TraceId};
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trace context ambient to the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    /// Active trace
    pub trace_id: TraceId,
    /// Active span
    pub span_id: SpanId,
    /// Trace flags (bit 0 = sampled)
    pub flags: i32,
}

/// Handle to a registered context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextSlot(usize);

// Slot ids are process-unique so values from distinct carriers can share
// the thread-local table without colliding.
static NEXT_SLOT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SLOT_VALUES: RefCell<HashMap<usize, SpanContext>> = RefCell::new(HashMap::new());
}

/// Registry of named context slots.
pub struct ContextCarrier {
    slots: DashMap<String, ContextSlot, ahash::RandomState>,
}

impl ContextCarrier {
    /// Creates an empty carrier.
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Registers a named slot. Registering the same name twice is a
    /// configuration defect.
    pub fn register(&self, name: &str) -> Result<ContextSlot> {
        if name.is_empty() {
            return Err(TracekitError::config("context slot name cannot be empty"));
        }
        match self.slots.entry(name.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TracekitError::config(format!(
                "context slot already registered: '{}'",
                name
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let slot = ContextSlot(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed));
                entry.insert(slot);
                Ok(slot)
            },
        }
    }

    /// Looks up a previously registered slot by name.
    pub fn slot(&self, name: &str) -> Option<ContextSlot> {
        self.slots.get(name).map(|entry| *entry)
    }

    /// Sets the slot value for the current thread.
    pub fn set(&self, slot: ContextSlot, context: SpanContext) {
        SLOT_VALUES.with(|values| {
            values.borrow_mut().insert(slot.0, context);
        });
    }

    /// Reads the slot value for the current thread.
    pub fn get(&self, slot: ContextSlot) -> Option<SpanContext> {
        SLOT_VALUES.with(|values| values.borrow().get(&slot.0).copied())
    }

    /// Clears the slot value for the current thread, returning the
    /// previous value if one was set.
    pub fn clear(&self, slot: ContextSlot) -> Option<SpanContext> {
        SLOT_VALUES.with(|values| values.borrow_mut().remove(&slot.0))
    }
}

impl Default for ContextCarrier {
    fn default() -> Self {
        Self::new()
    }
}
