//! In-memory step persistence for Stepwise
//!
//! Flows using the broker-mediated step store publish their loads and saves;
//! this crate provides the subscriber that keeps those values in memory. It
//! is primarily useful for development, testing, and single-process apps
//! where values do not need to outlive the process.

pub mod archive;
pub use archive::{ArchiveSubscription, ArchivedValue, InMemoryStepArchive, SavePolicy};
