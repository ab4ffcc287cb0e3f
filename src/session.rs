//! Per-user session aggregate: dialog position, collected profile, counters and
//! the markers used to collapse repeated commands and button presses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::dialogue::DialogState;
use crate::profile::ProfileData;

/// Opaque user identity (the Telegram user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub i64);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a delivered message, used to edit or strip its keyboard later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub i32);

/// Last value seen for a command or callback and when it arrived
#[derive(Debug, Clone)]
pub struct RepeatMarker {
    pub value: String,
    pub at: Instant,
}

impl RepeatMarker {
    /// Check `value` against the marker and move the marker to it.
    /// Returns true when `value` repeats the marker within `window`.
    pub fn check_and_update(marker: &mut Option<RepeatMarker>, value: &str, window: Duration) -> bool {
        let now = Instant::now();
        if let Some(previous) = marker.as_ref() {
            if !value.is_empty()
                && previous.value == value
                && now.duration_since(previous.at) < window
            {
                return true;
            }
        }
        *marker = Some(RepeatMarker {
            value: value.to_string(),
            at: now,
        });
        false
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub state: DialogState,
    pub profile: ProfileData,
    pub language_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: Instant,
    /// Free-text questions sent to the completion service since the last reset
    pub completion_requests: u32,
    pub last_command: Option<RepeatMarker>,
    pub last_callback: Option<RepeatMarker>,
    /// Last delivered message that carried a choice keyboard
    pub last_choice_message: Option<MessageHandle>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: DialogState::Initial,
            profile: ProfileData::default(),
            language_code: None,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            completion_requests: 0,
            last_command: None,
            last_callback: None,
            last_choice_message: None,
        }
    }

    /// Start over: back to `Initial` with an empty profile.
    ///
    /// Repeat markers and the last choice message survive so that a doubled
    /// `/start` is still collapsed and the stale keyboard can be removed.
    pub fn reset(&mut self) {
        self.state = DialogState::Initial;
        self.profile = ProfileData::default();
        self.completion_requests = 0;
        self.created_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn language(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    /// Count one completion request. Returns false once `max` is exceeded.
    pub fn try_count_completion_request(&mut self, max: u32) -> bool {
        if self.completion_requests >= max {
            return false;
        }
        self.completion_requests += 1;
        true
    }

    /// Mark the session as paid and move it to `Complete`.
    ///
    /// Safe to repeat: a session that is already complete keeps its original
    /// payment reference and timestamp.
    pub fn finalize_payment(&mut self, reference: &str) {
        self.profile.record_payment(reference, Utc::now());
        self.state = DialogState::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_initial() {
        let session = Session::new(Identity(42));
        assert_eq!(session.state, DialogState::Initial);
        assert_eq!(session.profile, ProfileData::default());
        assert_eq!(session.completion_requests, 0);
        assert!(session.last_choice_message.is_none());
    }

    #[test]
    fn test_repeat_marker_window() {
        let mut marker = None;
        let window = Duration::from_secs(2);
        assert!(!RepeatMarker::check_and_update(&mut marker, "/start", window));
        assert!(RepeatMarker::check_and_update(&mut marker, "/start", window));
        assert!(!RepeatMarker::check_and_update(&mut marker, "/help", window));
        assert!(!RepeatMarker::check_and_update(&mut marker, "/start", window));
    }

    #[test]
    fn test_repeat_marker_expires() {
        let mut marker = Some(RepeatMarker {
            value: "/pay".to_string(),
            at: Instant::now() - Duration::from_secs(3),
        });
        assert!(!RepeatMarker::check_and_update(&mut marker, "/pay", Duration::from_secs(2)));
    }

    #[test]
    fn test_empty_value_never_repeats() {
        let mut marker = None;
        let window = Duration::from_secs(2);
        assert!(!RepeatMarker::check_and_update(&mut marker, "", window));
        assert!(!RepeatMarker::check_and_update(&mut marker, "", window));
    }

    #[test]
    fn test_completion_request_limit() {
        let mut session = Session::new(Identity(1));
        assert!(session.try_count_completion_request(2));
        assert!(session.try_count_completion_request(2));
        assert!(!session.try_count_completion_request(2));
        session.reset();
        assert!(session.try_count_completion_request(2));
    }

    #[test]
    fn test_finalize_payment_is_idempotent() {
        let mut session = Session::new(Identity(7));
        session.state = DialogState::Payment;
        session.finalize_payment("pay_123");
        assert_eq!(session.state, DialogState::Complete);
        let first_created = session.profile.created_at;

        session.finalize_payment("pay_456");
        assert_eq!(session.state, DialogState::Complete);
        assert_eq!(session.profile.payment_reference.as_deref(), Some("pay_123"));
        assert_eq!(session.profile.created_at, first_created);
    }
}
