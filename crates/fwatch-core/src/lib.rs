//! fwatch Core - Domain types, configuration and port definitions
//!
//! This crate holds everything the upload scheduler needs to agree on
//! without depending on a runtime or a storage engine:
//! - **Configuration** - the YAML document describing watch groups
//! - **Domain types** - `GroupSettings`, `TrackedFile`, `LedgerEntry`, `UploadOutcome`
//! - **Port definitions** - `UploadLedger` and `Uploader` traits implemented by adapters
//!
//! # Architecture
//!
//! Ports are trait interfaces the scheduling engine depends on; their
//! implementations live in adapter crates (`fwatch-ledger` for the ledger,
//! `fwatch-sync` for the simulated transport).

pub mod config;
pub mod domain;
pub mod ports;
