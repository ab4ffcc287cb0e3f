//! # Event Deduplicator
//!
//! Filters repeated deliveries at two granularities:
//!
//! - a process-wide set of recently processed event ids, guarded by its own
//!   lock and independent of any session lock;
//! - per-session last command and last callback markers, which collapse an
//!   identical repeat arriving inside a short window.
//!
//! The event-id set is bounded: once it grows past the high-water mark the
//! oldest ids are dropped until only the low-water mark remains.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use crate::config::DialogConfig;
use crate::session::{RepeatMarker, Session};

#[derive(Debug, Default)]
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

#[derive(Debug)]
pub struct EventDeduplicator {
    seen: Mutex<SeenIds>,
    high_water: usize,
    low_water: usize,
    window: Duration,
}

impl EventDeduplicator {
    pub fn new(config: &DialogConfig) -> Self {
        Self {
            seen: Mutex::new(SeenIds::default()),
            high_water: config.event_id_high_water.max(1),
            low_water: config.event_id_low_water.min(config.event_id_high_water),
            window: config.dedup_window,
        }
    }

    /// Mark `event_id` as processed. Returns true if it had been seen already.
    pub fn seen(&self, event_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if seen.ids.contains(event_id) {
            debug!(event_id, "Dropping replayed event");
            return true;
        }

        seen.ids.insert(event_id.to_string());
        seen.order.push_back(event_id.to_string());

        if seen.order.len() > self.high_water {
            while seen.order.len() > self.low_water {
                if let Some(oldest) = seen.order.pop_front() {
                    seen.ids.remove(&oldest);
                }
            }
            debug!(retained = seen.order.len(), "Compacted recent event ids");
        }
        false
    }

    /// Number of event ids currently remembered
    pub fn tracked(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .order
            .len()
    }

    /// Check a command against the session's last command and record it
    pub fn is_duplicate_command(&self, session: &mut Session, text: &str) -> bool {
        let duplicate = RepeatMarker::check_and_update(&mut session.last_command, text, self.window);
        if duplicate {
            debug!(user_id = %session.identity, command = text, "Dropping repeated command");
        }
        duplicate
    }

    /// Check a callback token against the session's last callback and record it
    pub fn is_duplicate_callback(&self, session: &mut Session, token: &str) -> bool {
        let duplicate =
            RepeatMarker::check_and_update(&mut session.last_callback, token, self.window);
        if duplicate {
            debug!(user_id = %session.identity, token, "Dropping repeated callback");
        }
        duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;

    fn dedup_with_marks(high: usize, low: usize) -> EventDeduplicator {
        EventDeduplicator::new(&DialogConfig {
            event_id_high_water: high,
            event_id_low_water: low,
            ..DialogConfig::default()
        })
    }

    #[test]
    fn test_seen_marks_event() {
        let dedup = dedup_with_marks(100, 50);
        assert!(!dedup.seen("evt-1"));
        assert!(dedup.seen("evt-1"));
        assert!(!dedup.seen("evt-2"));
    }

    #[test]
    fn test_compaction_keeps_newest() {
        let dedup = dedup_with_marks(10, 4);
        for i in 0..11 {
            assert!(!dedup.seen(&format!("evt-{i}")));
        }
        assert_eq!(dedup.tracked(), 4);
        // The newest ids are still known, the oldest were forgotten
        assert!(dedup.seen("evt-10"));
        assert!(dedup.seen("evt-7"));
        assert!(!dedup.seen("evt-0"));
    }

    #[test]
    fn test_command_and_callback_markers_are_independent() {
        let dedup = dedup_with_marks(100, 50);
        let mut session = Session::new(Identity(3));

        assert!(!dedup.is_duplicate_command(&mut session, "/start"));
        assert!(!dedup.is_duplicate_callback(&mut session, "sex:male"));
        assert!(dedup.is_duplicate_command(&mut session, "/start"));
        assert!(dedup.is_duplicate_callback(&mut session, "sex:male"));
        assert!(!dedup.is_duplicate_callback(&mut session, "sex:female"));
    }
}
