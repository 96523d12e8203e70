use chrono::{DateTime, Duration, Utc};

/// Wall clock adjusted by the observed offset between local time and the
/// cluster's clock, in milliseconds. Positive offsets mean the chain runs
/// ahead of the local host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainClock {
    offset_ms: i64,
}

impl ChainClock {
    pub fn new(offset_ms: i64) -> Self {
        Self { offset_ms }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Chain-adjusted current time.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::milliseconds(self.offset_ms)
    }

    /// Applies the offset to an arbitrary anchor, used when a run snapshots
    /// its notion of "now" once and derives every date from it.
    pub fn adjust(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        anchor + Duration::milliseconds(self.offset_ms)
    }
}
