// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline counters
//!
//! Updated on the delivery thread with relaxed atomics so that counting
//! never contends with publication. [`PipelineStats::snapshot`] copies them
//! for display; the copy is not a consistent cut across counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    delivered: AtomicU64,
    published: AtomicU64,
    unsupported: AtomicU64,
    conversion_failures: AtomicU64,
    superseded: AtomicU64,
    discarded_idle: AtomicU64,
    abandoned: AtomicU64,
    interruptions: AtomicU64,
    sessions_opened: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames handed to the pipeline by the provider
    pub delivered: u64,
    /// Textures made current
    pub published: u64,
    /// Frames dropped for an unsupported pixel format
    pub unsupported: u64,
    /// Frames dropped for malformed buffers or texture engine errors
    pub conversion_failures: u64,
    /// Staged frames replaced by a newer one before conversion
    pub superseded: u64,
    /// Frames that arrived while the pipeline was not running
    pub discarded_idle: u64,
    /// Conversions finished after their session had ended
    pub abandoned: u64,
    /// Sessions that ended on their own
    pub interruptions: u64,
    /// Capture sessions opened
    pub sessions_opened: u64,
}

impl StatsSnapshot {
    /// Frames that never became a texture
    pub fn dropped(&self) -> u64 {
        self.unsupported + self.conversion_failures + self.superseded + self.discarded_idle + self.abandoned
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivered={} published={} dropped={} (unsupported={} failed={} superseded={} idle={} abandoned={}) sessions={} interruptions={}",
            self.delivered,
            self.published,
            self.dropped(),
            self.unsupported,
            self.conversion_failures,
            self.superseded,
            self.discarded_idle,
            self.abandoned,
            self.sessions_opened,
            self.interruptions,
        )
    }
}

macro_rules! counter {
    ($($inc:ident => $field:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub(crate) fn $inc(&self) -> u64 {
                    self.$field.fetch_add(1, Ordering::Relaxed) + 1
                }
            )*
        }
    };
}

counter! {
    record_delivered => delivered,
    record_published => published,
    record_unsupported => unsupported,
    record_conversion_failure => conversion_failures,
    record_superseded => superseded,
    record_discarded_idle => discarded_idle,
    record_abandoned => abandoned,
    record_interruption => interruptions,
    record_session_opened => sessions_opened,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            discarded_idle: self.discarded_idle.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            interruptions: self.interruptions.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_dropped_total() {
        let stats = PipelineStats::default();
        assert_eq!(stats.record_delivered(), 1);
        stats.record_delivered();
        stats.record_published();
        stats.record_unsupported();
        stats.record_superseded();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.published, 1);
        assert_eq!(snapshot.dropped(), 2);
        assert!(snapshot.to_string().contains("dropped=2"));
    }
}
