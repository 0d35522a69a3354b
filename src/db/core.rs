use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::{ArchitectError, Result};

/// Handle to the coordination datastore. Cheap to clone; every query method
/// lives in an `impl CoordDb` block in its per-concern module.
#[derive(Clone)]
pub struct CoordDb {
    pool: PgPool,
}

impl CoordDb {
    /// # Errors
    /// Returns an error if the database connection fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map(|pool| Self { pool })
            .map_err(|error| {
                ArchitectError::Database(format!("Failed to connect to database: {error}"))
            })
    }

    #[must_use]
    pub fn new_with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
