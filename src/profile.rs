//! Read-only access to the shared AWS config file.

use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use log::debug;

use crate::{credentials::load_ini, error::MfaError};

/// Per-profile settings relevant to an MFA exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileMetadata {
    pub name: String,
    /// MFA device ARN or serial; empty when the profile has none configured.
    pub mfa_serial: String,
    pub role_arn: Option<String>,
    /// Recorded for completeness; the indirection is not followed.
    pub source_profile: Option<String>,
    pub region: Option<String>,
}

/// Parsed `~/.aws/config`.
pub struct ProfileStore {
    path: PathBuf,
    ini: Ini,
}

impl ProfileStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MfaError> {
        let path = path.into();
        let (ini, _) = load_ini("config", &path)?;
        debug!("Loaded config file {}", path.display());
        Ok(Self { path, ini })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `[profile <name>]`, or the bare `[default]` header for the default profile.
    ///
    /// A profile that is absent from the file yields metadata with every field empty.
    pub fn lookup(&self, name: &str) -> ProfileMetadata {
        let section = self.section_for(name);
        let get = |key: &str| {
            section.as_deref().and_then(|section| {
                self.ini
                    .get(section, key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };

        ProfileMetadata {
            name: name.to_string(),
            mfa_serial: get("mfa_serial").unwrap_or_default(),
            role_arn: get("role_arn"),
            source_profile: get("source_profile"),
            region: get("region"),
        }
    }

    fn section_for(&self, name: &str) -> Option<String> {
        let map = self.ini.get_map_ref();
        let prefixed = format!("profile {name}");
        if map.contains_key(&prefixed) {
            Some(prefixed)
        } else if name == "default" && map.contains_key(name) {
            Some(name.to_string())
        } else {
            None
        }
    }
}
