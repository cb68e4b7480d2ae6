//! Shared credentials store access.
//!
//! The credentials file holds two kinds of sections:
//!
//! ```ini
//! [default]
//! aws_access_key_id=AKIA...           # long-term identity, read-only to this tool
//! aws_secret_access_key=...
//!
//! [default_mfa]
//! aws_access_key_id=ASIA...           # temporary credentials written by this tool
//! aws_secret_access_key=...
//! aws_session_token=...
//! expiration=2024-01-01T00:00:00Z
//! ```
//!
//! Only the `<profile>_mfa` section of the exchanged profile is ever modified. The file is
//! rewritten by splicing that one block into the original text, so every other line
//! (comments and spacing included) is written back byte for byte.

use std::{
    ffi::OsString,
    fmt, io,
    path::{Path, PathBuf},
};

use aws_smithy_types::{DateTime, date_time::Format};
use configparser::ini::Ini;
use log::debug;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{MfaError, ValidationError};

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";
const EXPIRATION: &str = "expiration";

const RECORD_KEYS: [&str; 4] = [ACCESS_KEY_ID, SECRET_ACCESS_KEY, SESSION_TOKEN, EXPIRATION];

// configparser folds keys that precede any header into its "default section", which is
// called `default` unless renamed. AWS files use `[default]` as a real profile, so the
// header-less bucket gets a name no profile can collide with.
const UNSECTIONED: &str = "\u{0}unsectioned";

/// Opens an INI store with case-sensitive section and key names, returning the parsed
/// view together with the raw text it was parsed from.
///
/// Inline comments are off: `;` and `#` are legal inside values such as
/// `credential_process` commands and secret keys.
pub(crate) fn load_ini(kind: &'static str, path: &Path) -> Result<(Ini, String), MfaError> {
    let fail = |message: String| MfaError::ConfigLoad {
        kind,
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => fail("file not found".into()),
        _ => fail(err.to_string()),
    })?;

    let mut defaults = Ini::new_cs().defaults();
    defaults.default_section = UNSECTIONED.to_string();
    defaults.enable_inline_comments = false;
    let mut ini = Ini::new_from_defaults(defaults);
    ini.read(text.clone()).map_err(fail)?;
    Ok((ini, text))
}

fn is_header(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('[') && line.ends_with(']')
}

fn is_trivia(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#') || line.starts_with(';')
}

/// Replaces the `[section]` block of `text` with `block`, or appends `block` when the
/// section is absent. Lines outside the block are copied unchanged; blank and comment
/// lines trailing the old block stay where they are.
fn splice_section(text: &str, section: &str, block: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let is_target = |line: &str| {
        let line = line.trim();
        is_header(line) && line[1..line.len() - 1].trim() == section
    };

    match lines.iter().position(|line| is_target(line)) {
        Some(start) => {
            let next = lines[start + 1..]
                .iter()
                .position(|line| is_header(line))
                .map_or(lines.len(), |offset| start + 1 + offset);
            let mut end = next;
            while end > start + 1 && is_trivia(lines[end - 1]) {
                end -= 1;
            }

            let mut out = lines[..start].concat();
            out.push_str(block);
            out.push_str(&lines[end..].concat());
            out
        }
        None => {
            let mut out = text.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            if !out.trim().is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
            out.push_str(block);
            out
        }
    }
}

/// A long-lived key pair used to sign the STS request.
#[derive(Clone)]
pub struct Identity {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Temporary credentials returned by an exchange.
///
/// Construction checks that every field is populated and that the expiration is an
/// RFC 3339 timestamp, so a partially filled record can never reach the store.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentialRecord {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl TemporaryCredentialRecord {
    /// Builds a record, returning the name of the first missing or malformed field on failure.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: impl Into<String>,
    ) -> Result<Self, &'static str> {
        let record = Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expiration: expiration.into(),
        };

        for (field, value) in RECORD_KEYS.iter().zip(record.values()) {
            if value.trim().is_empty() {
                return Err(*field);
            }
        }
        if DateTime::from_str(&record.expiration, Format::DateTime).is_err() {
            return Err(EXPIRATION);
        }

        Ok(record)
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Expiration timestamp in RFC 3339 form.
    pub fn expiration(&self) -> &str {
        &self.expiration
    }

    fn values(&self) -> [&str; 4] {
        [
            &self.access_key_id,
            &self.secret_access_key,
            &self.session_token,
            &self.expiration,
        ]
    }
}

impl fmt::Debug for TemporaryCredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentialRecord")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Audit-safe rendering: secret material is left out.
impl fmt::Display for TemporaryCredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access key {} (expires {})",
            self.access_key_id, self.expiration
        )
    }
}

/// In-memory view of the shared credentials file.
pub struct CredentialStore {
    path: PathBuf,
    ini: Ini,
    text: String,
}

impl CredentialStore {
    /// Parses the credentials file at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MfaError> {
        let path = path.into();
        let (ini, text) = load_ini("credentials", &path)?;
        debug!("Loaded credentials file {}", path.display());
        Ok(Self { path, ini, text })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Section names in file order.
    #[cfg(test)]
    pub fn sections(&self) -> Vec<String> {
        self.ini
            .get_map_ref()
            .keys()
            .filter(|name| name.as_str() != UNSECTIONED)
            .cloned()
            .collect()
    }

    /// Reads the long-lived key pair stored under `name`.
    pub fn identity(&self, name: &str) -> Result<Identity, MfaError> {
        let get = |field: &'static str| {
            self.value(name, field)
                .ok_or_else(|| ValidationError::MissingIdentityField {
                    identity: name.to_string(),
                    field,
                })
        };

        Ok(Identity {
            name: name.to_string(),
            access_key_id: get(ACCESS_KEY_ID)?,
            secret_access_key: get(SECRET_ACCESS_KEY)?,
            session_token: self.value(name, SESSION_TOKEN),
        })
    }

    /// Reads back a previously stored record, if the section holds a complete one.
    pub fn record(&self, section: &str) -> Option<TemporaryCredentialRecord> {
        TemporaryCredentialRecord::new(
            self.value(section, ACCESS_KEY_ID)?,
            self.value(section, SECRET_ACCESS_KEY)?,
            self.value(section, SESSION_TOKEN)?,
            self.value(section, EXPIRATION)?,
        )
        .ok()
    }

    /// Replaces `section` with exactly the four fields of `record`.
    ///
    /// The section is created at the end of the file when absent. Keys other than the four
    /// record fields are dropped so nothing from an earlier run survives the overwrite.
    pub fn upsert(&mut self, section: &str, record: &TemporaryCredentialRecord) {
        let stale: Vec<String> = self
            .ini
            .get_map_ref()
            .get(section)
            .map(|keys| {
                keys.keys()
                    .filter(|key| !RECORD_KEYS.contains(&key.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for key in stale {
            self.ini.remove_key(section, &key);
        }

        let mut block = format!("[{section}]\n");
        for (key, value) in RECORD_KEYS.iter().zip(record.values()) {
            self.ini.set(section, key, Some(value.to_string()));
            block.push_str(&format!("{key} = {value}\n"));
        }
        self.text = splice_section(&self.text, section, &block);
    }

    /// Writes the whole store back to its file.
    ///
    /// Content goes to a sibling temporary file first and is then renamed over the store,
    /// so readers never observe a half-written file. On unix the staging file is created
    /// with mode 0600 before any secret is written to it.
    pub async fn persist(&self) -> Result<(), MfaError> {
        let fail = |source| MfaError::Persistence {
            path: self.path.clone(),
            source,
        };

        let staging = self.staging_path();
        // A leftover from an interrupted run may carry a wider mode.
        let _ = fs::remove_file(&staging).await;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let written = async {
            let mut file = options.open(&staging).await?;
            file.write_all(self.text.as_bytes()).await?;
            file.sync_all().await?;
            Ok::<_, io::Error>(())
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(fail(err));
        }

        if let Err(err) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(fail(err));
        }

        debug!("Wrote credentials file {}", self.path.display());
        Ok(())
    }

    fn value(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get(section, key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("credentials"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
