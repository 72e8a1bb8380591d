use serde::{Deserialize, Serialize};

use crate::record::FeatureRecord;

/// Fetch lifecycle of one data set.
///
/// `Idle → Pending → Success | Failure`, and back to `Pending` on the next
/// refresh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failure,
}

/// Which of the two per-feature-type data sets a fetch feeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSetKind {
    Local,
    Surrounding,
}

impl DataSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSetKind::Local => "local",
            DataSetKind::Surrounding => "surrounding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSet {
    pub status: FetchStatus,
    pub records: Vec<FeatureRecord>,
}

impl DataSet {
    pub fn success(records: Vec<FeatureRecord>) -> Self {
        Self {
            status: FetchStatus::Success,
            records,
        }
    }

    /// A failed fetch carries no records of its own.
    pub fn failure() -> Self {
        Self {
            status: FetchStatus::Failure,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Enter `Pending` while keeping the currently displayed records.
    pub fn mark_pending(&mut self) {
        self.status = FetchStatus::Pending;
    }

    /// Fold a fetch result into this data set.
    ///
    /// A failure only flips the status: previously displayed records stay.
    pub fn merge(&mut self, result: DataSet) {
        match result.status {
            FetchStatus::Failure => self.status = FetchStatus::Failure,
            _ => *self = result,
        }
    }

    pub fn clear(&mut self) {
        *self = DataSet::default();
    }

    pub fn identity_keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.identity_key.as_str())
    }
}
