//! In-memory registry of long-running operations (imports) for client polling.
//!
//! Constructor-built and held in `AppState` so tests get isolated instances.
//! Nothing is persisted: a process restart loses operation history, which is a
//! documented limitation of this registry, not a defect.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const COMPLETED_TTL_MINUTES: i64 = 30;
const CANCELLED_TTL_MINUTES: i64 = 10;
const STUCK_AFTER_MINUTES: i64 = 10;
pub const SWEEP_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Initializing,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Initializing => "initializing",
            OperationStatus::Processing => "processing",
            OperationStatus::Completed => "completed",
            OperationStatus::Error => "error",
            OperationStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Error | OperationStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub id: String,
    pub op_type: String,
    pub user_id: String,
    pub status: OperationStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<Value>,
    pub total_items: usize,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    Forbidden,
    AlreadyFinished,
}

#[derive(Clone, Default)]
pub struct ProgressTracker {
    operations: Arc<Mutex<HashMap<String, Operation>>>,
}

impl ProgressTracker {
    pub fn new() -> ProgressTracker {
        ProgressTracker::default()
    }

    /// Registers a new operation, returning its initial snapshot and the
    /// tracking id clients poll with.
    pub fn create_operation(
        &self,
        op_type: &str,
        user_id: &str,
        total_items: usize,
    ) -> (Operation, String) {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let op = Operation {
            id: id.clone(),
            op_type: op_type.to_string(),
            user_id: user_id.to_string(),
            status: OperationStatus::Initializing,
            progress: 0,
            message: "Starting".to_string(),
            result: None,
            total_items,
            start_time: now,
            last_updated: now,
            expires_at: None,
        };
        self.operations.lock().unwrap().insert(id.clone(), op.clone());
        (op, id)
    }

    pub fn update_progress(&self, id: &str, progress: u8, message: &str) {
        let mut ops = self.operations.lock().unwrap();
        if let Some(op) = ops.get_mut(id) {
            if op.status.is_terminal() {
                return;
            }
            op.status = OperationStatus::Processing;
            op.progress = progress.min(100);
            op.message = message.to_string();
            op.last_updated = Utc::now();
        }
    }

    pub fn complete(&self, id: &str, result: Value) {
        let mut ops = self.operations.lock().unwrap();
        if let Some(op) = ops.get_mut(id) {
            if op.status.is_terminal() {
                return;
            }
            let now = Utc::now();
            op.status = OperationStatus::Completed;
            op.progress = 100;
            op.message = "Completed".to_string();
            op.result = Some(result);
            op.last_updated = now;
            op.expires_at = Some(now + Duration::minutes(COMPLETED_TTL_MINUTES));
        }
    }

    pub fn fail(&self, id: &str, message: &str) {
        let mut ops = self.operations.lock().unwrap();
        if let Some(op) = ops.get_mut(id) {
            if op.status.is_terminal() {
                return;
            }
            let now = Utc::now();
            op.status = OperationStatus::Error;
            op.message = message.to_string();
            op.last_updated = now;
            op.expires_at = Some(now + Duration::minutes(COMPLETED_TTL_MINUTES));
        }
    }

    /// Marks the operation cancelled; it does not interrupt work by itself.
    /// The import loop polls `is_cancelled` between rows to stop early.
    pub fn cancel_operation(&self, id: &str, user_id: &str) -> CancelOutcome {
        let outcome = {
            let mut ops = self.operations.lock().unwrap();
            match ops.get_mut(id) {
                None => return CancelOutcome::NotFound,
                Some(op) if op.user_id != user_id => return CancelOutcome::Forbidden,
                Some(op) if op.status.is_terminal() => return CancelOutcome::AlreadyFinished,
                Some(op) => {
                    let now = Utc::now();
                    op.status = OperationStatus::Cancelled;
                    op.message = "Cancelled by user".to_string();
                    op.last_updated = now;
                    op.expires_at = Some(now + Duration::minutes(CANCELLED_TTL_MINUTES));
                    CancelOutcome::Cancelled
                }
            }
        };

        // Force-delete the entry even if the sweep never reaches it.
        let operations = Arc::clone(&self.operations);
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(
                CANCELLED_TTL_MINUTES as u64 * 60,
            ))
            .await;
            operations.lock().unwrap().remove(&id);
        });

        outcome
    }

    pub fn is_cancelled(&self, id: &str) -> bool {
        self.operations
            .lock()
            .unwrap()
            .get(id)
            .map(|op| op.status == OperationStatus::Cancelled)
            .unwrap_or(false)
    }

    /// Poll payload for clients.
    pub fn get_progress(&self, id: &str) -> Option<Value> {
        let ops = self.operations.lock().unwrap();
        ops.get(id).map(|op| {
            json!({
                "success": true,
                "operationId": op.id,
                "progress": op.progress,
                "status": op.status.as_str(),
                "message": op.message,
                "result": op.result,
                "startTime": op.start_time,
                "lastUpdated": op.last_updated,
            })
        })
    }

    /// Drops expired operations and operations stuck in processing with no
    /// update for over ten minutes.
    pub fn cleanup_operations(&self) {
        let now = Utc::now();
        let stuck_cutoff = now - Duration::minutes(STUCK_AFTER_MINUTES);
        let mut ops = self.operations.lock().unwrap();
        ops.retain(|id, op| {
            if let Some(expires) = op.expires_at {
                if expires <= now {
                    tracing::debug!("Sweeping expired operation {}", id);
                    return false;
                }
            }
            if op.status == OperationStatus::Processing && op.last_updated < stuck_cutoff {
                tracing::warn!("Sweeping stuck operation {}", id);
                return false;
            }
            true
        });
    }

    /// Periodic sweep; spawned once at startup.
    pub fn spawn_sweeper(&self) {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                tracker.cleanup_operations();
            }
        });
    }

    #[cfg(test)]
    fn backdate(&self, id: &str, last_updated: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) {
        let mut ops = self.operations.lock().unwrap();
        if let Some(op) = ops.get_mut(id) {
            op.last_updated = last_updated;
            op.expires_at = expires_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_initializing_to_completed() {
        let tracker = ProgressTracker::new();
        let (op, id) = tracker.create_operation("import", "u1", 10);
        assert_eq!(op.status, OperationStatus::Initializing);
        assert_eq!(op.total_items, 10);

        let snapshot = tracker.get_progress(&id).expect("operation exists");
        assert_eq!(snapshot["status"], "initializing");

        tracker.update_progress(&id, 40, "Processing row 4 of 10");
        let snapshot = tracker.get_progress(&id).unwrap();
        assert_eq!(snapshot["status"], "processing");
        assert_eq!(snapshot["progress"], 40);

        tracker.complete(&id, json!({"imported": 10}));
        let snapshot = tracker.get_progress(&id).unwrap();
        assert_eq!(snapshot["status"], "completed");
        assert_eq!(snapshot["progress"], 100);
        assert_eq!(snapshot["result"]["imported"], 10);

        // terminal status is sticky
        tracker.update_progress(&id, 10, "late update");
        assert_eq!(tracker.get_progress(&id).unwrap()["progress"], 100);
    }

    #[tokio::test]
    async fn cancel_is_owner_only_and_marks_state() {
        let tracker = ProgressTracker::new();
        let (_, id) = tracker.create_operation("import", "u1", 10);

        assert_eq!(tracker.cancel_operation(&id, "u2"), CancelOutcome::Forbidden);
        assert!(!tracker.is_cancelled(&id));

        assert_eq!(tracker.cancel_operation(&id, "u1"), CancelOutcome::Cancelled);
        assert!(tracker.is_cancelled(&id));
        assert_eq!(
            tracker.cancel_operation(&id, "u1"),
            CancelOutcome::AlreadyFinished
        );
        assert_eq!(
            tracker.cancel_operation("missing", "u1"),
            CancelOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn sweep_drops_expired_and_stuck_operations() {
        let tracker = ProgressTracker::new();

        let (_, expired) = tracker.create_operation("import", "u1", 1);
        tracker.complete(&expired, json!({}));
        tracker.backdate(&expired, Utc::now(), Some(Utc::now() - Duration::minutes(1)));

        let (_, stuck) = tracker.create_operation("import", "u1", 1);
        tracker.update_progress(&stuck, 10, "working");
        tracker.backdate(&stuck, Utc::now() - Duration::minutes(20), None);

        let (_, live) = tracker.create_operation("import", "u1", 1);
        tracker.update_progress(&live, 10, "working");

        tracker.cleanup_operations();
        assert!(tracker.get_progress(&expired).is_none());
        assert!(tracker.get_progress(&stuck).is_none());
        assert!(tracker.get_progress(&live).is_some());
    }
}
