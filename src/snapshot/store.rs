// src/snapshot/store.rs

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use super::{PowerState, RegistryTarget, ServiceState, Snapshot, SnapshotRecord};
use crate::errors::SnapshotError;

const FIELD_DELIMITER: char = '|';
const ABSENT_VALUE: &str = "NULL";

/// Encodes a snapshot as one pipe-delimited line per record:
///
/// ```text
/// SVC|<service>|<Auto|Manual|Disabled>|<true|false>
/// REG|<key path>|<value name>|<integer|NULL>
/// TSK|<task>|<true|false>
/// PWR|<hibernate>|<standbyAc>|<monitorAc>|<hibernateAc>|<standbyDc>|<monitorDc>|<hibernateDc>
/// ```
///
/// Names are written verbatim; they must not contain `|`.
pub fn serialize(snapshot: &Snapshot) -> String {
    snapshot
        .records()
        .iter()
        .map(|record| format!("{}\n", encode_record(record)))
        .collect()
}

/// Decodes snapshot text, skipping lines that cannot be understood.
pub fn deserialize(text: &str) -> Snapshot {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let record = decode_record(line);
            if record.is_none() {
                debug!("Skipping unrecognized snapshot line '{}'.", line);
            }
            record
        })
        .collect()
}

fn encode_record(record: &SnapshotRecord) -> String {
    match record {
        SnapshotRecord::Service { name, state } => {
            format!("SVC|{}|{}|{}", name, state.start_mode, state.was_running)
        }
        SnapshotRecord::Registry { target, value } => {
            let value = match value {
                Some(value) => value.to_string(),
                None => ABSENT_VALUE.to_string(),
            };
            format!("REG|{}|{}|{}", target.path, target.name, value)
        }
        SnapshotRecord::Task { name, enabled } => format!("TSK|{}|{}", name, enabled),
        SnapshotRecord::Power(power) => format!(
            "PWR|{}|{}|{}|{}|{}|{}|{}",
            power.hibernate_enabled,
            power.standby_ac,
            power.monitor_ac,
            power.hibernate_ac,
            power.standby_dc,
            power.monitor_dc,
            power.hibernate_dc
        ),
    }
}

/// Decodes one line. Extra trailing fields are ignored.
fn decode_record(line: &str) -> Option<SnapshotRecord> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    let kind = fields[0];

    if kind.eq_ignore_ascii_case("SVC") && fields.len() >= 4 {
        Some(SnapshotRecord::Service {
            name: fields[1].to_string(),
            state: ServiceState {
                start_mode: fields[2].parse().ok()?,
                was_running: parse_bool(fields[3]).unwrap_or(false),
            },
        })
    } else if kind.eq_ignore_ascii_case("REG") && fields.len() >= 4 {
        Some(SnapshotRecord::Registry {
            target: RegistryTarget::new(fields[1], fields[2]),
            value: parse_registry_value(fields[3]),
        })
    } else if kind.eq_ignore_ascii_case("TSK") && fields.len() >= 3 {
        Some(SnapshotRecord::Task {
            name: fields[1].to_string(),
            enabled: parse_bool(fields[2])?,
        })
    } else if kind.eq_ignore_ascii_case("PWR") && fields.len() >= 8 {
        let minutes = |field: &str| field.trim().parse::<u32>().unwrap_or(0);
        Some(SnapshotRecord::Power(PowerState {
            hibernate_enabled: parse_bool(fields[1]).unwrap_or(false),
            standby_ac: minutes(fields[2]),
            monitor_ac: minutes(fields[3]),
            hibernate_ac: minutes(fields[4]),
            standby_dc: minutes(fields[5]),
            monitor_dc: minutes(fields[6]),
            hibernate_dc: minutes(fields[7]),
        }))
    } else {
        None
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    let field = field.trim();
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// `NULL` or garbage means the value was absent. Negative numbers are the
/// signed spelling of the same DWORD.
fn parse_registry_value(field: &str) -> Option<u32> {
    let field = field.trim();
    if field.eq_ignore_ascii_case(ABSENT_VALUE) {
        return None;
    }
    field
        .parse::<u32>()
        .ok()
        .or_else(|| field.parse::<i32>().ok().map(|value| value as u32))
}

/// Durable storage for the single snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the stored snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Snapshot))` if the file exists.
    /// - `Ok(None)` if there is no snapshot file (nothing to restore).
    /// - `Err(SnapshotError)` if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                // Tolerate a UTF-8 byte order mark written by other editors.
                let text = text.trim_start_matches('\u{feff}');
                Ok(Some(deserialize(text)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Replaces the stored snapshot wholesale, creating the parent directory if needed.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let io_error = |source: io::Error| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, serialize(snapshot)).map_err(io_error)?;
        if let Err(source) = fs::rename(&temp_path, &self.path) {
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!("Failed to remove '{}': {}", temp_path.display(), e);
            }
            return Err(io_error(source));
        }

        debug!("Snapshot written to '{}'.", self.path.display());
        Ok(())
    }
}
