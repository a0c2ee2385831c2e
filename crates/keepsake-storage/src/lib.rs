//! Concrete storage for Keepsake: four interchangeable backends, AES-GCM
//! encryption at rest, and the key lifecycle that decides whether it is active.

pub mod backends;
pub mod cipher;
pub mod key_lifecycle;
pub mod manager;
pub mod redact;
pub mod selector;

pub use backends::Backend;
pub use cipher::Encryptor;
pub use key_lifecycle::{
    resolve_key, EncryptionKey, KeyLifecycle, KeyLifecycleError, KeyOrigin, ResolvedKey,
};
pub use manager::StorageManager;
pub use selector::{open_backend, EncryptionSettings, StorageKind, StorageSettings};
