#![allow(dead_code)]

use std::time::Duration;

use scriptdbg_analysis::{AnalysisSettings, FileHandle, MemoryFileRegistry};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Settings with a short worker poll so tests do not wait on the defaults.
pub fn fast_settings() -> AnalysisSettings {
    AnalysisSettings {
        tick_interval: Duration::from_millis(100),
        flush_threshold: 64,
        poll_interval: Duration::from_millis(2),
        stop_timeout: Some(Duration::from_secs(5)),
        ..AnalysisSettings::default()
    }
}

/// Register `count` files named `{stem}{n}.{ext}` for `plugin`.
pub fn add_scripts(
    registry: &MemoryFileRegistry,
    plugin: &str,
    ext: &str,
    count: usize,
) -> Vec<FileHandle> {
    (0..count)
        .map(|n| registry.add(format!("scripts/{plugin}/file{n}.{ext}"), plugin))
        .collect()
}
