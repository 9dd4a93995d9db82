// Deployment manager - API core
//
// This crate provides the admission API and the asynchronous scheduling
// pipeline for resource-bounded deployments on named compute clusters.
// Architecture: thin HTTP shell (server/), scheduling infrastructure
// (kernel/), domain logic (domains/), shared types (common/).

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
