pub mod memory_monitor;

pub use memory_monitor::{HousekeepingReport, MemoryMonitor, read_rss_bytes};
