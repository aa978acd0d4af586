//! Polling update loop support.
//!
//! Every tick polls each dependency in registration order, compares the
//! resolved value with the snapshot taken after its last run, and re-runs the
//! owning directive on change. Time is virtual: the host feeds elapsed
//! milliseconds into [`Ticker::advance_by`] and runs the ticks it returns.

use crate::value::Value;

/// Last value a dependency ran with.
///
/// Lists are copied element-wise so that in-place mutation (push, remove,
/// replacing an item) is seen as a change even though the list handle is the
/// same. Everything else is kept as-is and compared by identity.
#[derive(Debug, Clone)]
pub(crate) enum Snapshot {
    Items(Vec<Value>),
    Single(Value),
}

impl Snapshot {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::List(list) => Snapshot::Items(list.items()),
            other => Snapshot::Single(other.clone()),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Snapshot::Items(items), Value::List(list)) => {
                let current = list.items();
                items.len() == current.len()
                    && items.iter().zip(&current).all(|(old, new)| old.identical(new))
            }
            (Snapshot::Single(previous), value) => previous.identical(value),
            (Snapshot::Items(_), _) => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Snapshot::Items(_) => true,
            Snapshot::Single(value) => value.is_truthy(),
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Dependencies resolved.
    pub polled: usize,
    /// Dependencies whose value changed and whose directive ran.
    pub changed: usize,
}

/// Virtual-time tick scheduler.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval_ms: u64,
    now_ms: u64,
    next_due_ms: u64,
    paused: bool,
}

impl Ticker {
    pub fn new(interval_ms: u64, paused: bool) -> Self {
        let interval_ms = interval_ms.max(1);
        Self {
            interval_ms,
            now_ms: 0,
            next_due_ms: interval_ms,
            paused,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Change the period; the next tick is one new interval from now.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms.max(1);
        self.next_due_ms = self.now_ms.saturating_add(self.interval_ms);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume; time spent paused does not produce ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_due_ms = self.now_ms.saturating_add(self.interval_ms);
        }
    }

    /// Advance virtual time and return how many ticks became due.
    pub fn advance_by(&mut self, elapsed_ms: u64) -> u64 {
        self.now_ms = self.now_ms.saturating_add(elapsed_ms);
        if self.paused || self.next_due_ms > self.now_ms {
            return 0;
        }
        let due = (self.now_ms - self.next_due_ms) / self.interval_ms + 1;
        self.next_due_ms = self
            .next_due_ms
            .saturating_add(due.saturating_mul(self.interval_ms));
        due
    }
}
