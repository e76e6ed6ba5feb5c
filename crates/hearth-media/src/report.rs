use hearth_storage::DeletionOutcome;
use serde_json::json;
use uuid::Uuid;

/// Result of deleting a single media asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeletion {
    pub media_id: Uuid,
    /// What happened to the stored object. The row is gone either way.
    pub storage: DeletionOutcome,
}

/// Result of a cascading parent delete.
///
/// Rows are always removed; `outcomes` records which stored objects could not
/// be and are now orphaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub parent_id: Uuid,
    pub outcomes: Vec<(Uuid, DeletionOutcome)>,
    pub media_rows_deleted: u64,
}

impl DeletionReport {
    pub fn deleted_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_deleted()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Uuid, &str)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            DeletionOutcome::Failed(reason) => Some((id, reason.as_str())),
            DeletionOutcome::Deleted => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Every stored object was removed.
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "parent_id": self.parent_id,
            "media_rows_deleted": self.media_rows_deleted,
            "objects_deleted": self.deleted_count(),
            "orphaned": self
                .failed()
                .map(|(id, reason)| json!({ "media_id": id, "reason": reason }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes() {
        let failed_id = Uuid::new_v4();
        let report = DeletionReport {
            parent_id: Uuid::new_v4(),
            outcomes: vec![
                (Uuid::new_v4(), DeletionOutcome::Deleted),
                (failed_id, DeletionOutcome::Failed("timeout".to_string())),
            ],
            media_rows_deleted: 2,
        };

        assert_eq!(report.deleted_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_clean());

        let json = report.to_json();
        assert_eq!(json["orphaned"][0]["reason"], "timeout");
        assert_eq!(json["orphaned"][0]["media_id"], failed_id.to_string());
    }
}
