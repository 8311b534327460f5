/// All errors that can be returned by an `InstanceStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record for this instance already exists. Creation doubles as the
    /// provisioning lock, so this is the "someone else got there first" signal.
    #[error("instance record already exists: {instance_id}")]
    AlreadyExists { instance_id: String },

    /// No record exists for the given instance ID.
    #[error("instance record not found: {instance_id}")]
    NotFound { instance_id: String },

    /// The persisted record exists but could not be decoded.
    #[error("instance record {instance_id} is corrupt: {message}")]
    Corrupt { instance_id: String, message: String },

    /// A backend-specific storage error (API server unreachable, encoding, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists { .. })
    }
}
