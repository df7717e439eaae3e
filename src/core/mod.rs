pub mod factory;
pub mod orchestrator;
pub mod path;
pub mod queue;

pub use crate::domain::model::{BackendKind, Role, TransferMode, TransferReport};
pub use crate::domain::params::{QueueParams, StorageParams};
pub use crate::domain::ports::{BackendConnector, QueuePublisher, Storage};
pub use crate::utils::error::Result;
