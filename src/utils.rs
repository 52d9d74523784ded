// src/utils.rs

pub mod command;
pub mod registry;
#[cfg(windows)]
pub mod windows;

use std::path::Path;

/// Filesystem existence check, kept behind a trait so power capture can run
/// against a fake host.
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probes the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl FileProbe for LocalFiles {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
