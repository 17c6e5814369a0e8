//! Port definitions
//!
//! Traits at the boundary between the scheduling engine and the outside
//! world. Implementations live in adapter crates.
//!
//! - [`UploadLedger`] - durable per-path record of the last upload
//! - [`Uploader`] - the transport that performs one upload

pub mod upload_ledger;
pub mod uploader;

pub use upload_ledger::UploadLedger;
pub use uploader::Uploader;
