//! Core types, configuration, and state management shared by s3vault crates.
//!
//! This crate provides the foundational building blocks used by the storage
//! engine: multi-account/multi-region state partitioning, process
//! configuration, and the account/region newtypes that thread through every
//! operation.

mod config;
mod error;
mod state;
mod types;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use state::AccountRegionStore;
pub use types::{AccountId, AwsRegion};
