//! Sync descriptors and the registry of active syncs.
//!
//! A [`SyncDescriptor`] binds one host entity (or an `area.<id>` aggregate)
//! to a bemfa topic. The topic and device type are fixed at creation; the
//! display name and options may change later.

mod descriptor;
mod registry;
mod topic;

pub use crate::codec::SyncConfig;
pub use descriptor::SyncDescriptor;
pub use registry::Registry;
pub use topic::{Topic, PING_PAYLOAD, TOPIC_PING, TOPIC_PREFIX};

use thiserror::Error;

use crate::codec::{CodecError, DeviceType};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    CodecError(#[from] CodecError),

    #[error("Invalid entity id '{0}'")]
    InvalidEntityId(String),

    #[error("Device type of {topic} cannot change from {from} to {to}")]
    DeviceTypeChanged {
        topic: String,
        from: DeviceType,
        to: DeviceType,
    },
}
