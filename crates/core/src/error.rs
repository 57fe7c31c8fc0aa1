use crate::paths::RemoteShareAddress;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("area not found: {0}")]
    AreaNotFound(String),

    #[error("not found: {address}")]
    NotFound { address: RemoteShareAddress },
    #[error("already exists: {address}")]
    Conflict { address: RemoteShareAddress },
    #[error("remote share unavailable at {address}: {reason}")]
    UpstreamUnavailable {
        address: RemoteShareAddress,
        reason: String,
    },
    #[error("failed to enumerate {address}: {source}")]
    DirectoryRead {
        address: RemoteShareAddress,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O failure at {address}: {source}")]
    Io {
        address: RemoteShareAddress,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to access persisted document {path}: {source}", path = path.display())]
    Storage {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize document {path}: {source}", path = path.display())]
    Deserialization {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("staging error: {0}")]
    Staging(#[from] share_files::FilesError),
}

impl GatewayError {
    /// The remote address the failing operation targeted, if any.
    pub fn address(&self) -> Option<&RemoteShareAddress> {
        match self {
            GatewayError::NotFound { address }
            | GatewayError::Conflict { address }
            | GatewayError::UpstreamUnavailable { address, .. }
            | GatewayError::DirectoryRead { address, .. }
            | GatewayError::Io { address, .. } => Some(address),
            _ => None,
        }
    }
}

impl From<share_types::TextError> for GatewayError {
    fn from(e: share_types::TextError) -> Self {
        GatewayError::InvalidInput(e.to_string())
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
