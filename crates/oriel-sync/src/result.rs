//! Per-record outcomes of a reconciliation pass

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Created,
    Updated,
    Deactivated,
    /// Looked at but deliberately left alone, e.g. an administrator
    /// shielded from deactivation.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

/// One remote record's fate during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRecord {
    pub operation: SyncOperation,
    pub status: SyncStatus,
    pub external_id: String,
    pub login: Option<String>,
    pub error: Option<String>,
}

impl SyncRecord {
    pub fn success(
        operation: SyncOperation,
        external_id: impl Into<String>,
        login: Option<String>,
    ) -> Self {
        Self {
            operation,
            status: SyncStatus::Success,
            external_id: external_id.into(),
            login,
            error: None,
        }
    }

    pub fn failure(
        external_id: impl Into<String>,
        login: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            operation: SyncOperation::Skipped,
            status: SyncStatus::Error,
            external_id: external_id.into(),
            login,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}

/// Everything that happened during one reconciliation pass.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub records: Vec<SyncRecord>,
}

impl SyncReport {
    pub fn push(&mut self, record: SyncRecord) {
        self.records.push(record);
    }

    fn count(&self, operation: SyncOperation) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == SyncStatus::Success && r.operation == operation)
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(SyncOperation::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(SyncOperation::Updated)
    }

    pub fn deactivated(&self) -> usize {
        self.count(SyncOperation::Deactivated)
    }

    pub fn skipped(&self) -> usize {
        self.count(SyncOperation::Skipped)
    }

    pub fn errors(&self) -> usize {
        self.records.iter().filter(|r| r.is_error()).count()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deactivated, {} skipped, {} errors",
            self.created(),
            self.updated(),
            self.deactivated(),
            self.skipped(),
            self.errors()
        )
    }
}
