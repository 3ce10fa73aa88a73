//! # TruthGraph Library
//!
//! Library target of the TruthGraph binary, exposed for integration tests.
//!
//! - [`consistency`]: the async orchestrator running the cross-store checks
//! - [`scheduler`]: startup and fixed-interval consistency runs
//! - [`store`]: the graph/relational query capabilities and the snapshot backend
//! - [`api`]: the axum HTTP surface
//! - [`config`]: TOML + environment configuration
//! - [`cli`]: clap commands

pub mod api;
pub mod cli;
pub mod config;
pub mod consistency;
pub mod queries;
pub mod scheduler;
pub mod store;
