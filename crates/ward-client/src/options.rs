use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::ClientError;

const DEFAULT_TTL: Duration = Duration::from_secs(600);
const MIN_TTL: Duration = Duration::from_secs(1);

/// Configuration for [`crate::Client::connect`] / [`crate::Client::direct`].
///
/// Named options: `owner`, `namespace`,
/// `metadata`, `ttl`, `dir`, `on_error`.
#[derive(Clone)]
pub struct ClientOptions {
    pub owner: String,
    pub namespace: String,
    pub metadata: HashMap<String, String>,
    pub ttl: Duration,
    pub dir: std::path::PathBuf,
    pub on_error: Option<Arc<dyn Fn(ClientError) + Send + Sync>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            owner: Uuid::new_v4().to_string(),
            namespace: String::new(),
            metadata: HashMap::new(),
            ttl: DEFAULT_TTL,
            dir: std::env::temp_dir(),
            on_error: None,
        }
    }
}

impl ClientOptions {
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Values below the 1-second floor are rounded up to the 10-minute
    /// default, not clamped to the floor.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = if ttl < MIN_TTL { DEFAULT_TTL } else { ttl };
        self
    }

    pub fn dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn on_error(mut self, on_error: Arc<dyn Fn(ClientError) + Send + Sync>) -> Self {
        self.on_error = Some(on_error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_floor_ttl_rounds_up_to_default() {
        let opts = ClientOptions::default().ttl(Duration::from_millis(500));
        assert_eq!(opts.ttl, DEFAULT_TTL);
    }

    #[test]
    fn ttl_at_or_above_floor_is_kept() {
        let opts = ClientOptions::default().ttl(MIN_TTL);
        assert_eq!(opts.ttl, MIN_TTL);
    }

    #[test]
    fn owner_defaults_to_a_fresh_uuid() {
        let a = ClientOptions::default();
        let b = ClientOptions::default();
        assert_ne!(a.owner, b.owner);
    }
}
