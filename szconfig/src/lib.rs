//! # szconfig
//!
//! Record store, field translation and session management for Senzing
//! engine configuration documents.
//!
//! A Senzing configuration is a single JSON document of the shape
//! `{"G2_CONFIG": {"<TABLE>": [ {..row..}, ... ], ...}}`. This crate keeps
//! such a document in memory, edits it through typed per-domain services and
//! hands it back to a [`backend::ConfigBackend`] for validation and
//! registration.
//!
//! ## Features
//!
//! - Generic CRUD over configuration tables with next-ID allocation
//! - Declared foreign keys with restrict/cascade delete policies
//! - Bidirectional translation between database-style rows (`FTYPE_CODE`, ...)
//!   and user-facing records (`feature`, ...)
//! - Session state tracking (loaded / dirty) with export and parse caches
//! - In-memory and file-backed configuration repositories
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use szconfig::{backend::MemoryBackend, manager::ConfigManager};
//!
//! let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
//! manager.initialize().unwrap();
//!
//! let id = manager.data_sources().add_data_source("CUSTOMER").unwrap();
//! println!("CUSTOMER registered as data source {id}");
//!
//! let new_config_id = manager.save_config("Added CUSTOMER").unwrap();
//! println!("saved as {new_config_id}");
//! ```
//!
//! ## Modules
//!
//! - [`backend`] - Configuration repository abstraction and implementations
//! - [`error`] - Error types
//! - [`manager`] - Session lifecycle and per-domain services
//! - [`schema`] - Table names, key fields and foreign keys
//! - [`store`] - In-memory record store over the configuration document
//! - [`translate`] - Internal/external field translation

#[macro_use]
extern crate log;

/// Configuration repository abstraction and implementations.
///
/// The backend plays the part of the native engine's configuration manager:
/// it validates documents, registers them under new IDs and tracks the
/// default configuration.
pub mod backend;

/// Error types for configuration operations.
pub mod error;

/// Session lifecycle and per-domain configuration services.
pub mod manager;

/// Table names, key fields and declared foreign keys.
pub mod schema;

/// In-memory record store over the configuration document.
pub mod store;

/// Translation between internal rows and user-facing records.
pub mod translate;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use store::{Record, RecordKey, RecordStore, Row};
pub use serde_json::Value;
