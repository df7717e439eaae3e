pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliArgs;

pub use crate::adapters::{DefaultConnector, FolderStorage};
pub use crate::config::TransferConfig;
pub use crate::core::orchestrator::{process_files, TransferEngine};
pub use crate::domain::model::{BackendKind, Role, TransferMode, TransferReport};
pub use crate::domain::ports::{BackendConnector, QueuePublisher, Storage};
pub use crate::utils::error::{Result, TransferError};
