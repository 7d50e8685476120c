//! Postgres-backed [`Store`] implementation.
//!
//! The entire acquire decision (insert / takeover / refuse-as-held /
//! refuse-as-done) is a single `INSERT ... ON CONFLICT ... DO UPDATE`
//! statement whose `SET` clauses are conditioned on the prior row's
//! `expires_at`/`done_at`, returning the post-state row so the caller can
//! tell whether it won the race. This is the one correctness-critical
//! query in the whole system: a read-then-write implementation would be a
//! bug, not an optimization.

mod migrate;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;
use ward_core::{AcquireParams, HandleRecord, ListFilter, ListSink, Status, Store, StoreError};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects a pool to `dsn` and runs pending migrations.
    pub async fn connect(dsn: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(10).connect(dsn).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an already-configured pool (e.g. one shared with other
    /// subsystems) and runs pending migrations.
    pub async fn from_pool(pool: PgPool) -> Result<Self, sqlx::Error> {
        migrate::run(&pool).await?;
        Ok(Self { pool })
    }
}

fn to_backend_err(err: sqlx::Error) -> StoreError {
    StoreError::backend(err)
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<HandleRecord, sqlx::Error> {
    let metadata_json: serde_json::Value = row.try_get("metadata")?;
    let metadata: HashMap<String, String> = match metadata_json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        _ => HashMap::new(),
    };

    Ok(HandleRecord {
        id: row.try_get("id")?,
        namespace: row.try_get("namespace")?,
        name: row.try_get("name")?,
        owner: row.try_get("owner")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
        done_at: row.try_get("done_at")?,
        num_acquired: {
            let n: i32 = row.try_get("num_acquired")?;
            n as u32
        },
        metadata,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn acquire(&self, params: AcquireParams) -> Result<HandleRecord, StoreError> {
        let new_id = Uuid::new_v4();
        let now = Utc::now();
        let metadata = serde_json::to_value(&params.metadata).map_err(StoreError::backend)?;

        let row = sqlx::query(
            r#"
            INSERT INTO resource_handles
                (id, namespace, name, owner, expires_at, num_acquired, created_at, updated_at, metadata)
            VALUES
                ($1, $2, $3, $4, $5, 1, $6, $6, $7::jsonb)
            ON CONFLICT (namespace, name) DO UPDATE SET
                id = CASE WHEN resource_handles.expires_at < $6 AND resource_handles.done_at IS NULL
                          THEN $1 ELSE resource_handles.id END,
                owner = CASE WHEN resource_handles.expires_at < $6 AND resource_handles.done_at IS NULL
                             THEN $4 ELSE resource_handles.owner END,
                expires_at = CASE WHEN resource_handles.expires_at < $6 AND resource_handles.done_at IS NULL
                                  THEN $5 ELSE resource_handles.expires_at END,
                num_acquired = CASE WHEN resource_handles.expires_at < $6 AND resource_handles.done_at IS NULL
                                    THEN resource_handles.num_acquired + 1 ELSE resource_handles.num_acquired END,
                metadata = CASE WHEN resource_handles.expires_at < $6 AND resource_handles.done_at IS NULL
                                THEN (resource_handles.metadata || $7::jsonb) ELSE resource_handles.metadata END,
                updated_at = $6
            RETURNING id, namespace, name, owner, created_at, updated_at, expires_at, done_at, num_acquired, metadata
            "#,
        )
        .bind(new_id)
        .bind(&params.namespace)
        .bind(&params.name)
        .bind(&params.owner)
        .bind(params.expires_at)
        .bind(now)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(to_backend_err)?;

        let record = row_to_record(&row).map_err(to_backend_err)?;
        if record.is_done() {
            return Err(StoreError::Done);
        }
        if record.id != new_id || record.owner != params.owner {
            return Err(StoreError::Acquired);
        }
        Ok(record)
    }

    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        expires_at: DateTime<Utc>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let metadata = serde_json::to_value(&metadata).map_err(StoreError::backend)?;
        let result = sqlx::query(
            r#"
            UPDATE resource_handles
            SET expires_at = $3, updated_at = $4, metadata = (metadata || $5::jsonb)
            WHERE id = $1 AND owner = $2 AND done_at IS NULL
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(to_backend_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidHandle);
        }
        Ok(())
    }

    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let metadata = serde_json::to_value(&metadata).map_err(StoreError::backend)?;
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE resource_handles
            SET done_at = $3, updated_at = $3, metadata = (metadata || $4::jsonb)
            WHERE id = $1 AND owner = $2 AND done_at IS NULL
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(now)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(to_backend_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidHandle);
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<HandleRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, namespace, name, owner, created_at, updated_at, expires_at, done_at, num_acquired, metadata
             FROM resource_handles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_backend_err)?;

        row.as_ref()
            .map(row_to_record)
            .transpose()
            .map_err(to_backend_err)
    }

    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn ListSink,
    ) -> Result<(), StoreError> {
        let mut sql = String::from(
            "SELECT id, namespace, name, owner, created_at, updated_at, expires_at, done_at, num_acquired, metadata
             FROM resource_handles WHERE 1 = 1",
        );
        let mut binds: Vec<String> = Vec::new();
        let mut next_param = 1;

        match filter.status {
            Status::Any => {}
            Status::Done => sql.push_str(" AND done_at IS NOT NULL"),
            Status::Pending => sql.push_str(" AND done_at IS NULL"),
        }

        if !filter.prefix.is_empty() {
            sql.push_str(&format!(" AND namespace LIKE ${next_param}"));
            binds.push(format!("{}%", filter.prefix.replace('%', "\\%")));
            next_param += 1;
        }

        let metadata_json = if filter.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&filter.metadata).map_err(StoreError::backend)?)
        };
        if let Some(json) = &metadata_json {
            sql.push_str(&format!(" AND metadata @> ${next_param}::jsonb"));
            binds.push(json.clone());
            let _ = next_param;
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");
        sql.push_str(&format!(" OFFSET {offset}"));

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(to_backend_err)?;
        for row in &rows {
            let record = row_to_record(row).map_err(to_backend_err)?;
            if sink.visit(record).await? == ward_core::ControlFlow::Break {
                break;
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(to_backend_err)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "postgres-it"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_compliance_suite() {
        let dsn = std::env::var("WARD_TEST_POSTGRES_DSN")
            .expect("WARD_TEST_POSTGRES_DSN must point at a scratch database");
        let store = PostgresStore::connect(&dsn).await.unwrap();
        ward_store_testsuite::run_compliance_tests(&store).await;
    }
}
