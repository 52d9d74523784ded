// src/errors.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program} {args}' failed with exit code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        args: String,
        code: i32,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry path: '{0}'. Expected format 'HKEY_*\\Subkey\\...'")]
    InvalidPath(String),

    #[error("Unsupported registry hive: {0}")]
    UnsupportedHive(String),

    #[error("Failed to open registry key '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read registry value '{name}' in '{path}': {reason}")]
    Read {
        path: String,
        name: String,
        reason: String,
    },

    #[error("Failed to set registry value '{name}' in '{path}': {source}")]
    Write {
        path: String,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete registry value '{name}' in '{path}': {source}")]
    Delete {
        path: String,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
