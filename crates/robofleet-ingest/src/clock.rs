//! Simulation clock seam
//!
//! The host engine owns the physics loop. The fleet only registers a named
//! zero-argument callback and expects it to be invoked once per tick.

use crate::error::{IngestError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub type TickCallback = Box<dyn FnMut() + Send>;

pub trait SimulationClock: Send + Sync {
    /// Register `callback` under `name`; fails if the name is taken
    fn add_tick_callback(&self, name: &str, callback: TickCallback) -> Result<()>;

    /// Returns whether a callback was removed
    fn remove_tick_callback(&self, name: &str) -> bool;

    fn has_tick_callback(&self, name: &str) -> bool;
}

/// In-process clock stepped explicitly by the caller
#[derive(Default)]
pub struct ManualClock {
    callbacks: Mutex<Vec<(String, TickCallback)>>,
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every registered callback once, in registration order.
    /// Returns the number of callbacks run.
    pub fn tick(&self) -> usize {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut callbacks = self.callbacks.lock();
        for (_, callback) in callbacks.iter_mut() {
            callback();
        }
        callbacks.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl SimulationClock for ManualClock {
    fn add_tick_callback(&self, name: &str, callback: TickCallback) -> Result<()> {
        let mut callbacks = self.callbacks.lock();
        if callbacks.iter().any(|(existing, _)| existing == name) {
            return Err(IngestError::Clock(format!(
                "tick callback '{}' is already registered",
                name
            )));
        }
        callbacks.push((name.to_string(), callback));
        Ok(())
    }

    fn remove_tick_callback(&self, name: &str) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| existing != name);
        callbacks.len() != before
    }

    fn has_tick_callback(&self, name: &str) -> bool {
        self.callbacks.lock().iter().any(|(existing, _)| existing == name)
    }
}
