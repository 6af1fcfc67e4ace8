use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::{Identity, TokenRecord, DEFAULT_TOKEN_TYPE};
use crate::config::{default_token_path, Environment};

/// Why the token record could not be read or written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file is malformed: {0}")]
    Corrupt(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage for the single session record of a local installation.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing is stored, `Err` when the record is unreadable.
    fn load(&self) -> Result<Option<TokenRecord>, StorageError>;
    fn save(&self, record: &TokenRecord) -> Result<(), StorageError>;
    /// Removing an absent record is not an error.
    fn clear(&self) -> Result<(), StorageError>;

    /// Bearer token that takes priority over anything stored. Never persisted.
    fn env_override(&self) -> Option<String> {
        None
    }

    /// Like [`load`](Self::load), but an unreadable record counts as absent.
    fn load_or_absent(&self) -> Option<TokenRecord> {
        match self.load() {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable token record");
                None
            }
        }
    }

    /// The bearer token to send: the override if set, else the stored token.
    fn access_token(&self) -> Option<String> {
        self.env_override()
            .or_else(|| self.load_or_absent().map(|record| record.access_token))
    }
}

/// JSON file store, by default at `~/.optima/token.json`.
///
/// # Example
/// ```no_run
/// use ads_auth::auth::{FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// if let Some(record) = store.load_or_absent() {
///     println!("logged in until {}", record.expires_at);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    env_override: Option<String>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_override: None,
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_token_path())
    }

    pub fn with_env_override(mut self, token: Option<String>) -> Self {
        self.env_override = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err)),
        };
        let file: StoredTokenFile =
            serde_json::from_str(&raw).map_err(|err| StorageError::Corrupt(err.to_string()))?;
        Ok(file.into_record())
    }

    fn save(&self, record: &TokenRecord) -> Result<(), StorageError> {
        let file = TokenFile::from(record);
        let serialized = serde_json::to_vec_pretty(&file)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        atomic_write(&self.path, &serialized)
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn env_override(&self) -> Option<String> {
        self.env_override.clone()
    }
}

/// Canonical on-disk shape.
#[derive(Debug, Serialize)]
struct TokenFile<'a> {
    env: Environment,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    token_type: &'a str,
    /// Unix epoch milliseconds.
    expires_at: i64,
    /// Same instant at full precision; preferred by the reader when present.
    expires_at_iso: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<FileIdentity<'a>>,
}

#[derive(Debug, Serialize)]
struct FileIdentity<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a TokenRecord> for TokenFile<'a> {
    fn from(record: &'a TokenRecord) -> Self {
        Self {
            env: record.environment,
            access_token: &record.access_token,
            refresh_token: record.refresh_token.as_deref(),
            token_type: &record.token_type,
            expires_at: record.expires_at.timestamp_millis(),
            expires_at_iso: record
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
            user: record.identity.as_ref().map(|identity| FileIdentity {
                id: &identity.subject_id,
                email: identity.email.as_deref(),
                name: identity.display_name.as_deref(),
            }),
        }
    }
}

/// Lenient reader: accepts snake_case and camelCase keys written by older
/// tools and normalizes them into a [`TokenRecord`].
#[derive(Debug, Deserialize)]
struct StoredTokenFile {
    #[serde(default, alias = "environment")]
    env: Option<String>,
    #[serde(default, alias = "accessToken")]
    access_token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, alias = "tokenType")]
    token_type: Option<String>,
    #[serde(default, alias = "expiresAt")]
    expires_at: Option<serde_json::Value>,
    #[serde(default, alias = "expiresAtIso")]
    expires_at_iso: Option<String>,
    #[serde(default, alias = "identity")]
    user: Option<StoredIdentity>,
}

#[derive(Debug, Deserialize)]
struct StoredIdentity {
    #[serde(default, alias = "subject_id", alias = "subjectId")]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "display_name", alias = "displayName")]
    name: Option<String>,
}

impl StoredTokenFile {
    fn into_record(self) -> Option<TokenRecord> {
        let access_token = self.access_token.filter(|t| !t.trim().is_empty())?;
        let environment = match self.env.as_deref() {
            Some(raw) => Environment::from_str(raw).unwrap_or_else(|_| {
                tracing::warn!(env = raw, "unknown environment in token file, using prod");
                Environment::Production
            }),
            None => Environment::Production,
        };
        Some(TokenRecord {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            // A missing expiry reads as the epoch, i.e. already expired.
            expires_at: self
                .expires_at_iso
                .as_deref()
                .and_then(parse_rfc3339)
                .or_else(|| self.expires_at.as_ref().and_then(parse_expiry))
                .unwrap_or_default(),
            identity: self.user.map(|user| Identity {
                subject_id: user.id.unwrap_or_default(),
                email: user.email,
                display_name: user.name,
            }),
            environment,
        })
    }
}

/// Epoch milliseconds (number or numeric string) or an RFC 3339 timestamp.
fn parse_expiry(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    if let Some(millis) = value.as_i64() {
        return DateTime::from_timestamp_millis(millis);
    }
    if let Some(millis) = value.as_f64() {
        return DateTime::from_timestamp_millis(millis as i64);
    }
    let text = value.as_str()?.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    parse_rfc3339(text)
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o700);
            builder.create(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("token path {} has no file name", path.display()),
        ))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::Io(err));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::Io(err));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
