use std::time::Duration;

/// A live lock record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub owner: String,
    pub remaining: Duration,
}
