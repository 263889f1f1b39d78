//! services/scanner/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation
//! of the `CodeResolver` port. A decoded payload resolves to the product
//! row whose code column matches; everything else about the records lives
//! in the surrounding application.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use veritrace_core::domain::Resolution;
use veritrace_core::ports::{CodeResolver, ResolveError};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `CodeResolver` port.
#[derive(Clone)]
pub struct DbResolver {
    pool: PgPool,
}

impl DbResolver {
    /// Creates a new `DbResolver`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
}

//=========================================================================================
// `CodeResolver` Trait Implementation
//=========================================================================================

#[async_trait]
impl CodeResolver for DbResolver {
    async fn resolve(&self, payload: &str) -> Result<Resolution, ResolveError> {
        let record = sqlx::query_as::<_, ProductRecord>("SELECT id FROM products WHERE code = $1")
            .bind(payload)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ResolveError(e.to_string()))?;

        Ok(match record {
            Some(record) => Resolution::Found {
                record_id: record.id.to_string(),
            },
            None => Resolution::NotFound,
        })
    }
}
