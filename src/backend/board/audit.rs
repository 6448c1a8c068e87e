//! Best-effort audit trail
//!
//! Entries are appended after the primary mutation has committed. A failed
//! append is logged and swallowed.

use crate::backend::store::BoardStore;
use crate::shared::model::AuditEntry;

pub async fn record(store: &dyn BoardStore, entry: AuditEntry) {
    if let Err(e) = store.append_audit(&entry).await {
        tracing::error!(
            "[Audit] Failed to record {} for {} {}: {:?}",
            entry.action.as_str(),
            entry.entity_type.as_str(),
            entry.entity_id,
            e
        );
    }
}
