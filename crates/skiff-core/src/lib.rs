//! Skiff Core - Domain logic for remote record synchronization
//!
//! This crate contains the provider-agnostic half of the adapter:
//! - **Domain types** - `RemoteRecord`, `Version`, `ChangeToken`, `MetadataSchema`
//! - **Error taxonomy** - `SyncError` and the translator from raw provider failures
//! - **Port definitions** - `RemoteStore`, `Authorizer`, `AccountStore`, `DataContext`
//! - **Use cases** - session bootstrap, schema negotiation, incremental fetch,
//!   record/file transfer and revision listing
//!
//! # Architecture
//!
//! The crate follows the ports & adapters pattern. Use cases only talk to
//! the remote backend through [`ports::RemoteStore`]; adapter crates (such as
//! `skiff-dropbox`) implement the ports against a concrete HTTP API.
//! [`service::RemoteService`] is the entry point for the consuming sync engine.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
pub mod progress;
pub mod service;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;

pub use progress::Progress;
pub use service::RemoteService;
