// src/utils/registry.rs

use strum_macros::{Display, EnumString};

use crate::errors::RegistryError;

/// Read/write access to integer (DWORD) registry values.
///
/// Paths are full registry paths (e.g., "HKEY_LOCAL_MACHINE\\Software\\...").
pub trait RegistryAccess {
    /// Reads a DWORD value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(u32))` if the value exists and is a DWORD.
    /// - `Ok(None)` if the key or value does not exist, or the value is not a DWORD.
    /// - `Err(RegistryError)` if the registry could not be read.
    fn get_dword(&self, path: &str, name: &str) -> Result<Option<u32>, RegistryError>;

    /// Creates or modifies a DWORD value, creating intermediate keys as needed.
    fn set_dword(&self, path: &str, name: &str, value: u32) -> Result<(), RegistryError>;

    /// Deletes a value. A missing key or value is treated as success.
    fn delete_value_if_exists(&self, path: &str, name: &str) -> Result<(), RegistryError>;
}

/// Predefined registry hives accepted at the start of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Hive {
    #[strum(serialize = "HKEY_LOCAL_MACHINE", serialize = "HKLM")]
    LocalMachine,
    #[strum(serialize = "HKEY_CURRENT_USER", serialize = "HKCU")]
    CurrentUser,
    #[strum(serialize = "HKEY_CLASSES_ROOT", serialize = "HKCR")]
    ClassesRoot,
    #[strum(serialize = "HKEY_USERS", serialize = "HKU")]
    Users,
    #[strum(serialize = "HKEY_CURRENT_CONFIG", serialize = "HKCC")]
    CurrentConfig,
}

/// Parses the full registry path into hive and subkey path.
///
/// # Returns
///
/// - `Ok((Hive, String))` with the parsed hive and subkey path.
/// - `Err(RegistryError)` if the path has no subkey or names an unknown hive.
pub fn parse_registry_path(path: &str) -> Result<(Hive, String), RegistryError> {
    let components: Vec<&str> = path.split('\\').collect();
    if components.len() < 2 || components[1..].iter().all(|c| c.is_empty()) {
        return Err(RegistryError::InvalidPath(path.to_string()));
    }
    let hive = components[0]
        .parse::<Hive>()
        .map_err(|_| RegistryError::UnsupportedHive(components[0].to_string()))?;
    Ok((hive, components[1..].join("\\")))
}

#[cfg(windows)]
pub use live::WindowsRegistry;

#[cfg(windows)]
mod live {
    use std::io::ErrorKind;

    use tracing::debug;
    use winreg::{
        enums::{
            RegType::REG_DWORD, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER,
            HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ, KEY_WRITE,
        },
        RegKey,
    };

    use super::{parse_registry_path, Hive, RegistryAccess};
    use crate::errors::RegistryError;

    /// Registry access through `winreg`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsRegistry;

    fn predef(hive: Hive) -> RegKey {
        RegKey::predef(match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::Users => HKEY_USERS,
            Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
        })
    }

    impl RegistryAccess for WindowsRegistry {
        fn get_dword(&self, path: &str, name: &str) -> Result<Option<u32>, RegistryError> {
            let (hive, subkey_path) = parse_registry_path(path)?;

            let subkey = match predef(hive).open_subkey_with_flags(&subkey_path, KEY_READ) {
                Ok(key) => key,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(source) => {
                    return Err(RegistryError::Open {
                        path: path.to_string(),
                        source,
                    })
                }
            };

            match subkey.get_raw_value(name) {
                Ok(value) if value.vtype == REG_DWORD => {
                    if value.bytes.len() < 4 {
                        return Err(RegistryError::Read {
                            path: path.to_string(),
                            name: name.to_string(),
                            reason: "REG_DWORD data too small".to_string(),
                        });
                    }
                    Ok(Some(u32::from_le_bytes([
                        value.bytes[0],
                        value.bytes[1],
                        value.bytes[2],
                        value.bytes[3],
                    ])))
                }
                Ok(value) => {
                    debug!(
                        "Value '{}' in '{}' is {:?}, not a DWORD; treating as absent.",
                        name, path, value.vtype
                    );
                    Ok(None)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RegistryError::Read {
                    path: path.to_string(),
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        fn set_dword(&self, path: &str, name: &str, value: u32) -> Result<(), RegistryError> {
            let (hive, subkey_path) = parse_registry_path(path)?;

            // create_subkey creates all intermediate subkeys if they don't exist
            let (key, _) =
                predef(hive)
                    .create_subkey(&subkey_path)
                    .map_err(|source| RegistryError::Open {
                        path: path.to_string(),
                        source,
                    })?;

            key.set_value(name, &value)
                .map_err(|source| RegistryError::Write {
                    path: path.to_string(),
                    name: name.to_string(),
                    source,
                })
        }

        fn delete_value_if_exists(&self, path: &str, name: &str) -> Result<(), RegistryError> {
            let (hive, subkey_path) = parse_registry_path(path)?;

            let subkey =
                match predef(hive).open_subkey_with_flags(&subkey_path, KEY_READ | KEY_WRITE) {
                    Ok(key) => key,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                    Err(source) => {
                        return Err(RegistryError::Open {
                            path: path.to_string(),
                            source,
                        })
                    }
                };

            match subkey.delete_value(name) {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(RegistryError::Delete {
                    path: path.to_string(),
                    name: name.to_string(),
                    source,
                }),
            }
        }
    }
}
