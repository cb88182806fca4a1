#![allow(dead_code)]

use dashboard_governor_lib::governor::MemoryProbe;
use dashboard_governor_lib::{GovernorConfig, GovernorError, RequestGovernor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Memory probe returning a settable reading
pub struct FixedMemory(AtomicU64);

impl FixedMemory {
    pub fn new(percent: f64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(percent.to_bits())))
    }

    pub fn set(&self, percent: f64) {
        self.0.store(percent.to_bits(), Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemory {
    fn memory_percent(&self) -> dashboard_governor_lib::Result<f64> {
        Ok(f64::from_bits(self.0.load(Ordering::Relaxed)))
    }
}

/// Memory probe that always fails
pub struct BrokenMemory;

impl MemoryProbe for BrokenMemory {
    fn memory_percent(&self) -> dashboard_governor_lib::Result<f64> {
        Err(GovernorError::Memory("probe unavailable".into()))
    }
}

pub fn governor_with_memory(percent: f64) -> (RequestGovernor, Arc<FixedMemory>) {
    let memory = FixedMemory::new(percent);
    let governor = RequestGovernor::new(GovernorConfig::default(), memory.clone());
    (governor, memory)
}
