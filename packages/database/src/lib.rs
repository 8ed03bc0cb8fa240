#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `PostGIS` connection, noise sample queries, and migrations.
//!
//! Uses `switchy_database` raw SQL for every query since all of them lean
//! on `PostGIS` `geography` functions, and `switchy_schema` for embedded
//! SQL migrations. [`store::PostgisStore`] adapts the query functions to
//! the `noise_map_store::NoiseSampleStore` boundary.

pub mod db;
pub mod queries;
pub mod store;

pub use store::PostgisStore;

use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Schema for `noise_samples` and its spatial and history indexes, compiled
/// into the binary from the workspace `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Failures talking to `PostGIS` or decoding what it returned.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The statement failed on the server or the connection dropped.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// A schema migration could not be applied.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// A column held a value that does not fit the noise sample model.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Which column or value was rejected, and why.
        message: String,
    },
}

/// Brings the `noise_samples` schema up to date.
///
/// Safe to call on every start-up; already applied migrations are skipped.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if a migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    log::debug!(
        "Applying up to {} embedded migration(s)",
        MIGRATIONS_DIR.dirs().count()
    );
    MigrationRunner::new(Box::new(EmbeddedMigrationSource::new(&MIGRATIONS_DIR)))
        .run(db)
        .await?;
    log::info!("noise_samples schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schema_declares_both_indexes() {
        let up = MIGRATIONS_DIR
            .get_file("2024-01-01-000000_create_noise_samples/up.sql")
            .and_then(|f| f.contents_utf8())
            .unwrap();
        assert!(up.contains("USING GIST (location)"));
        assert!(up.contains("(owner_id, recorded_at DESC)"));
        assert!(up.contains("geography(Point, 4326)"));

        assert!(
            MIGRATIONS_DIR
                .get_file("2024-01-01-000000_create_noise_samples/down.sql")
                .is_some()
        );
    }
}
