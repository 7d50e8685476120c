use std::sync::Arc;

use ward_core::Store;

/// Picks a `Store` implementation by the DSN's scheme prefix.
pub async fn open(dsn: &str) -> anyhow::Result<Arc<dyn Store>> {
    let scheme = dsn.splitn(2, ':').next().unwrap_or(dsn);
    match scheme {
        "memory" => Ok(Arc::new(ward_store_memory::MemoryStore::new())),
        "postgres" | "postgresql" => {
            let store = ward_store_postgres::PostgresStore::connect(dsn).await?;
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unsupported backend scheme {other:?}"),
    }
}
