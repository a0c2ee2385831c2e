use thiserror::Error;

/// Errors produced by blob stores, the storage manager and its encryptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested key has no associated blob.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// I/O, network, permission or driver failure reported by the medium.
    #[error("backend failure: {reason}")]
    Backend { reason: String },
    /// A required parameter is missing or invalid for the selected backend.
    #[error("invalid storage configuration: {reason}")]
    Config { reason: String },
    /// Encryption key has the wrong length.
    #[error("encryption key must be 32 bytes, got {len}")]
    InvalidKey { len: usize },
    /// Ciphertext too short, or authentication failed on decrypt.
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },
    /// Key cannot be mapped onto the backend's namespace.
    #[error("resource key {key:?} is not valid for this backend")]
    InvalidResourceKey { key: String },
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn backend<E: ToString>(err: E) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn crypto(reason: impl Into<String>) -> Self {
        Self::Crypto {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_cause() {
        let err = StoreError::backend("connection refused");
        assert_eq!(err.to_string(), "backend failure: connection refused");

        let err = StoreError::InvalidKey { len: 16 };
        assert_eq!(err.to_string(), "encryption key must be 32 bytes, got 16");
    }

    #[test]
    fn not_found_is_distinguishable() {
        assert!(StoreError::not_found("tasks").is_not_found());
        assert!(!StoreError::config("bucket unset").is_not_found());
    }
}
