//! Machine configuration.

use std::path::PathBuf;

/// How to build an X68000.
#[derive(Debug, Clone, Default)]
pub struct X68kConfig {
    /// Main memory size in bytes. `None` takes the size recorded in
    /// SRAM (4 MiB on a blank image).
    pub memory_size: Option<u32>,
    /// Backing file for the battery SRAM. `None` keeps SRAM volatile.
    pub sram_path: Option<PathBuf>,
}
