use thiserror::Error;

use crate::codec::CodecError;
use crate::directory::DirectoryError;
use crate::host::HostError;
use crate::mqtt::MqttError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid uid '{0}': expected 32 lowercase hex characters")]
    InvalidUid(String),

    #[error("Unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error(transparent)]
    CodecError(#[from] CodecError),

    #[error(transparent)]
    SyncError(#[from] SyncError),

    #[error(transparent)]
    MqttError(#[from] MqttError),

    #[error(transparent)]
    DirectoryError(#[from] DirectoryError),

    #[error(transparent)]
    HostError(#[from] HostError),
}

impl From<color_eyre::Report> for BridgeError {
    fn from(report: color_eyre::Report) -> Self {
        BridgeError::PersistenceError(format!("{:#}", report))
    }
}
