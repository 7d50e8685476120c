use std::collections::HashMap;

/// `status` arm of a [`ListFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Any,
    Done,
    /// `done_at IS NULL` — a record is pending until it's marked done,
    /// regardless of whether its lease is currently alive or expired.
    Pending,
}

/// Filter predicate for [`crate::Store::list`].
///
/// An empty `metadata` map matches every record; a non-empty one requires
/// every key to be present in the record's metadata with an equal value.
/// `prefix` matches `namespace` by exact byte-prefix. All present fields
/// combine with logical AND.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Status,
    pub prefix: String,
    pub metadata: HashMap<String, String>,
}

impl ListFilter {
    pub fn matches(&self, record: &crate::HandleRecord) -> bool {
        match self.status {
            Status::Any => {}
            Status::Done => {
                if !record.is_done() {
                    return false;
                }
            }
            Status::Pending => {
                if record.is_done() {
                    return false;
                }
            }
        }

        if !self.prefix.is_empty() && !record.namespace.starts_with(&self.prefix) {
            return false;
        }

        self.metadata
            .iter()
            .all(|(k, v)| record.metadata.get(k) == Some(v))
    }
}
