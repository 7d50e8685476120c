use sqlx::{PgPool, Row};

/// Applies every pending schema version, one transaction per version.
///
/// A failed migration leaves `meta_info.version` unchanged and the error
/// propagates, failing startup — migrations are never rolled back
/// automatically.
pub(crate) async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE TABLE IF NOT EXISTS meta_info (version BIGINT NOT NULL DEFAULT 0)")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO meta_info (version) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM meta_info)")
        .execute(pool)
        .await?;

    let version: i64 = sqlx::query("SELECT version FROM meta_info LIMIT 1")
        .fetch_one(pool)
        .await?
        .try_get("version")?;

    if version < 1 {
        migrate_v1(pool).await?;
    }
    Ok(())
}

const V1_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS resource_handles (
        id UUID PRIMARY KEY,
        namespace VARCHAR(100) NOT NULL,
        name VARCHAR(255) NOT NULL,
        owner VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at TIMESTAMPTZ NOT NULL,
        done_at TIMESTAMPTZ,
        num_acquired INT NOT NULL DEFAULT 0,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        UNIQUE (namespace, name)
    )",
    "CREATE INDEX IF NOT EXISTS resource_handles_owner ON resource_handles USING btree (owner)",
    "CREATE INDEX IF NOT EXISTS resource_handles_expires_at ON resource_handles USING btree (expires_at)",
    "CREATE INDEX IF NOT EXISTS resource_handles_done_at ON resource_handles USING btree (done_at)",
    "CREATE INDEX IF NOT EXISTS resource_handles_updated_at ON resource_handles USING btree (updated_at)",
    "CREATE INDEX IF NOT EXISTS resource_handles_metadata ON resource_handles USING gin (metadata)",
];

async fn migrate_v1(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for stmt in V1_STATEMENTS {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    sqlx::query("UPDATE meta_info SET version = 1")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    tracing::info!(version = 1, "applied schema migration");
    Ok(())
}
