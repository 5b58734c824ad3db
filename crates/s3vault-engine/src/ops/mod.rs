//! S3 operation handlers.
//!
//! This module contains the implementations of all S3 operations, organized
//! into submodules by category. Each submodule exposes `handle_*` methods
//! on [`crate::provider::S3VaultEngine`], which `crate::trait_impl` wires up
//! to the [`s3s::S3`] trait that the server binary serves over HTTP.

pub mod bucket;
pub mod bucket_config;
pub mod list;
pub mod multipart;
pub mod object;
pub mod object_config;
