//! Encryption key lifecycle: resolve a key file, load and validate it, or
//! generate it on first run.
//!
//! The manager walks `Unresolved -> Loading | Generating -> Validated | Failed`
//! exactly once at startup. An existing key file is never regenerated or
//! overwritten; a malformed one is fatal.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use keepsake_core::storage::StoreError;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::selector::EncryptionSettings;

/// Length of the symmetric key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the key's hex representation on disk.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

const DEFAULT_KEY_DIR: &str = ".keepsake";
const DEFAULT_KEY_FILE: &str = "key";

#[derive(Debug, Error)]
pub enum KeyLifecycleError {
    #[error("no home directory available to hold the default key file")]
    NoHomeDir,
    #[error("failed to read key from {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },
    #[error("invalid key length in {location}: expected 64 hex characters, got {len}")]
    InvalidLength { location: String, len: usize },
    #[error("invalid key format in {location}: must be 64 hex characters")]
    InvalidHex { location: String },
    #[error("failed to save encryption key to {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

/// 256-bit secret produced by the lifecycle and handed to exactly one encryptor.
/// The bytes are zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidKey { len: bytes.len() })?;
        Ok(Self { bytes })
    }

    /// Parse the external 64-character hex form. Surrounding whitespace is ignored.
    pub fn from_hex(text: &str, location: &str) -> Result<Self, KeyLifecycleError> {
        let trimmed = text.trim();
        if trimmed.len() != KEY_HEX_LEN {
            return Err(KeyLifecycleError::InvalidLength {
                location: location.to_string(),
                len: trimmed.len(),
            });
        }
        let decoded = Zeroizing::new(hex::decode(trimmed).map_err(|_| {
            KeyLifecycleError::InvalidHex {
                location: location.to_string(),
            }
        })?);
        // 64 valid hex characters always decode to 32 bytes.
        Self::from_bytes(&decoded).map_err(|_| KeyLifecycleError::InvalidHex {
            location: location.to_string(),
        })
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.bytes))
    }

    /// First and last 8 hex characters, for diagnostics only.
    pub fn preview(&self) -> String {
        let hex = self.to_hex();
        format!("{}...{}", &hex[..8], &hex[KEY_HEX_LEN - 8..])
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Where the active key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Read from an existing key file.
    Loaded,
    /// Freshly generated and written to the key file.
    Generated,
    /// Supplied directly as hex through configuration.
    Configured,
}

impl KeyOrigin {
    pub fn label(self) -> &'static str {
        match self {
            KeyOrigin::Loaded => "EXISTING (loaded)",
            KeyOrigin::Generated => "NEW (generated)",
            KeyOrigin::Configured => "CONFIGURED",
        }
    }
}

/// Output of the `Validated` state.
#[derive(Debug)]
pub struct ResolvedKey {
    pub key: EncryptionKey,
    pub origin: KeyOrigin,
    /// Key file backing the key; `None` when it was configured inline.
    pub path: Option<PathBuf>,
}

/// File-backed key manager.
#[derive(Debug, Clone)]
pub struct KeyLifecycle {
    path: PathBuf,
}

impl KeyLifecycle {
    /// Resolve the key path: an operator override wins, otherwise `~/.keepsake/key`.
    pub fn new(path_override: Option<PathBuf>) -> Result<Self, KeyLifecycleError> {
        let path = match path_override {
            Some(path) => {
                debug!(path = %path.display(), "using key path override");
                path
            }
            None => default_key_path()?,
        };
        Ok(Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key file if present, generate it otherwise.
    pub fn run(&self) -> Result<ResolvedKey, KeyLifecycleError> {
        match fs::metadata(&self.path) {
            Ok(_) => self.load(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => self.generate(),
            Err(err) => Err(KeyLifecycleError::Read {
                path: self.path.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn load(&self) -> Result<ResolvedKey, KeyLifecycleError> {
        debug!(path = %self.path.display(), "loading existing key file");
        let contents = Zeroizing::new(fs::read_to_string(&self.path).map_err(|err| {
            KeyLifecycleError::Read {
                path: self.path.clone(),
                reason: err.to_string(),
            }
        })?);
        let key = EncryptionKey::from_hex(&contents, &self.path.display().to_string())?;
        info!("encryption key validated");
        Ok(ResolvedKey {
            key,
            origin: KeyOrigin::Loaded,
            path: Some(self.path.clone()),
        })
    }

    fn generate(&self) -> Result<ResolvedKey, KeyLifecycleError> {
        info!(path = %self.path.display(), "no key file found, generating a new key");
        let key = EncryptionKey::generate();

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_private_dir(dir).map_err(|err| self.write_err(err))?;
        }

        match write_private_file(&self.path, key.to_hex().as_bytes()) {
            Ok(()) => {}
            // Another process won the race; its key is the one to use.
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return self.load(),
            Err(err) => return Err(self.write_err(err)),
        }

        info!("new encryption key saved");
        Ok(ResolvedKey {
            key,
            origin: KeyOrigin::Generated,
            path: Some(self.path.clone()),
        })
    }

    fn write_err(&self, err: io::Error) -> KeyLifecycleError {
        KeyLifecycleError::Write {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

/// Decide the active key for a process: `None` when encryption is disabled,
/// the inline hex key when one is configured, otherwise the key file lifecycle.
pub fn resolve_key(settings: &EncryptionSettings) -> Result<Option<ResolvedKey>, KeyLifecycleError> {
    if !settings.enabled {
        info!("encryption disabled by configuration");
        return Ok(None);
    }

    if let Some(hex) = settings.key_hex.as_deref().filter(|hex| !hex.trim().is_empty()) {
        let key = EncryptionKey::from_hex(hex, "configured encryption key")?;
        return Ok(Some(ResolvedKey {
            key,
            origin: KeyOrigin::Configured,
            path: None,
        }));
    }

    KeyLifecycle::new(settings.key_path.clone())?.run().map(Some)
}

pub fn default_key_path() -> Result<PathBuf, KeyLifecycleError> {
    let home = dirs::home_dir().ok_or(KeyLifecycleError::NoHomeDir)?;
    Ok(home.join(DEFAULT_KEY_DIR).join(DEFAULT_KEY_FILE))
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn override_path_wins_over_default() {
        let lifecycle = KeyLifecycle::new(Some(PathBuf::from("/etc/keepsake/key"))).expect("new");
        assert_eq!(lifecycle.path(), Path::new("/etc/keepsake/key"));

        if let Ok(default) = default_key_path() {
            assert!(default.ends_with(".keepsake/key"));
        }
    }

    #[test]
    fn generates_key_on_first_run_then_reuses_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lifecycle = KeyLifecycle::at(dir.path().join("nested").join("key"));

        let first = lifecycle.run().expect("first run");
        assert_eq!(first.origin, KeyOrigin::Generated);

        let second = lifecycle.run().expect("second run");
        assert_eq!(second.origin, KeyOrigin::Loaded);
        assert_eq!(first.key, second.key);
    }

    #[test]
    fn generated_file_holds_64_hex_chars() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key");
        let resolved = KeyLifecycle::at(&path).run().expect("run");

        let contents = fs::read_to_string(&path).expect("read key file");
        assert_eq!(contents.len(), KEY_HEX_LEN);
        assert!(contents.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(contents, *resolved.key.to_hex());
    }

    #[cfg(unix)]
    #[test]
    fn generated_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keys").join("key");
        KeyLifecycle::at(&path).run().expect("run");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn loads_existing_key_with_trailing_whitespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key");
        fs::write(&path, format!("{VALID_HEX}\n")).expect("write key");

        let resolved = KeyLifecycle::at(&path).run().expect("run");
        assert_eq!(resolved.origin, KeyOrigin::Loaded);
        assert_eq!(resolved.key.as_bytes()[1], 0x01);
        assert_eq!(resolved.key.as_bytes()[31], 0x1f);
        // The file is untouched.
        assert_eq!(fs::read_to_string(&path).expect("read"), format!("{VALID_HEX}\n"));
    }

    #[test]
    fn rejects_short_key_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key");
        fs::write(&path, "abcd").expect("write key");

        let err = KeyLifecycle::at(&path).run().expect_err("short key");
        assert!(matches!(err, KeyLifecycleError::InvalidLength { len: 4, .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), "abcd");
    }

    #[test]
    fn rejects_non_hex_key_of_correct_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key");
        fs::write(&path, "zz".repeat(32)).expect("write key");

        let err = KeyLifecycle::at(&path).run().expect_err("non-hex key");
        assert!(matches!(err, KeyLifecycleError::InvalidHex { .. }));
    }

    #[test]
    fn rejects_overlong_key_file() {
        let err = EncryptionKey::from_hex(&"a".repeat(66), "test").expect_err("long");
        assert!(matches!(err, KeyLifecycleError::InvalidLength { len: 66, .. }));
    }

    #[test]
    fn preview_redacts_the_middle() {
        let key = EncryptionKey::from_hex(VALID_HEX, "test").expect("valid");
        assert_eq!(key.preview(), "00010203...1c1d1e1f");
        assert_eq!(format!("{key:?}"), "EncryptionKey { bytes: \"[REDACTED]\" }");
    }

    #[test]
    fn from_bytes_checks_length() {
        let err = EncryptionKey::from_bytes(&[0u8; 31]).expect_err("short");
        assert_eq!(err, StoreError::InvalidKey { len: 31 });
    }

    #[test]
    fn resolve_key_respects_disabled_and_inline_settings() {
        let disabled = EncryptionSettings {
            enabled: false,
            ..EncryptionSettings::default()
        };
        assert!(resolve_key(&disabled).expect("disabled").is_none());

        let inline = EncryptionSettings {
            key_hex: Some(VALID_HEX.to_string()),
            ..EncryptionSettings::default()
        };
        let resolved = resolve_key(&inline).expect("inline").expect("some key");
        assert_eq!(resolved.origin, KeyOrigin::Configured);
        assert!(resolved.path.is_none());

        let bad = EncryptionSettings {
            key_hex: Some("not-a-key".into()),
            ..EncryptionSettings::default()
        };
        assert!(resolve_key(&bad).is_err());
    }

    #[test]
    fn resolve_key_uses_path_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("override-key");
        let settings = EncryptionSettings {
            key_path: Some(path.clone()),
            ..EncryptionSettings::default()
        };

        let resolved = resolve_key(&settings).expect("resolve").expect("some key");
        assert_eq!(resolved.origin, KeyOrigin::Generated);
        assert_eq!(resolved.path.as_deref(), Some(path.as_path()));
        assert!(path.exists());
    }
}
