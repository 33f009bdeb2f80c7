//! # Floodgate
//!
//! Versioned schema migrations over SQL stores: a persistent migration
//! ledger, totally ordered version numbers and a runner that applies
//! pending migrations one transaction at a time.
//!
//! See the project README for usage and configuration.

pub mod checksum;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod info;
pub mod initializer;
pub mod ledger;
pub mod migration;
pub mod record;
pub mod resolver;
pub mod runner;
pub mod sqlite;
pub mod state;
pub mod version;

pub use config::{DriftPolicy, FailurePolicy, MigrationConfig};
pub use error::MigrationError;
pub use info::{MigrationInfo, MigrationInfoSet};
pub use initializer::SchemaInitializer;
pub use migration::{ExecutableMigration, MigrationDescriptor, MigrationKind, SqlMigration};
pub use runner::MigrationRunner;
pub use state::MigrationState;
pub use version::SchemaVersion;
