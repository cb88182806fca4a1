use parking_lot::Mutex;
use sysinfo::{System, SystemExt};

use crate::error::{GovernorError, Result};

/// Source of the current system memory utilization, as a percentage.
pub trait MemoryProbe: Send + Sync {
    fn memory_percent(&self) -> Result<f64>;
}

/// Reads system-wide memory utilization through `sysinfo`.
///
/// Utilization is `(total - available) / total`, so reclaimable page cache
/// does not count as used.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn memory_percent(&self) -> Result<f64> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(GovernorError::Memory("total memory reported as zero".to_string()));
        }
        let used = total.saturating_sub(system.available_memory());
        Ok(used as f64 * 100.0 / total as f64)
    }
}
