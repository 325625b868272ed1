//! catsync CLI - command-line interface for the catsync reconciler
//!
//! This crate provides the CLI application that ties together the local
//! store, the HTTP client and the reconciler.

pub mod config;

pub use config::{Command, Config, ResolverArg, StoreArgs, SyncArgs};
