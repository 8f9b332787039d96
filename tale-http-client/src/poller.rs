//! Polling of postponed server-side tasks

use crate::error::TaleError;
use crate::parser::Decoded;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Status value the server reports while a task is still running
const PROCESSING: &str = "processing";

/// Suspends the current thread between polls
pub trait Sleeper: fmt::Debug + Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// `Sleeper` backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How often and how many times to poll a postponed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two polls
    pub interval: Duration,
    /// Upper bound on the number of polls, at least 1
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_attempts: 200,
        }
    }
}

/// Handle to a postponed server-side task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    status_url: String,
}

impl PendingTask {
    pub fn new(status_url: impl Into<String>) -> Self {
        Self {
            status_url: status_url.into(),
        }
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// Extract the task handle from a response carrying `status_url`
    pub fn from_response(decoded: &Decoded) -> Option<Self> {
        decoded
            .as_json()?
            .get("status_url")?
            .as_str()
            .map(Self::new)
    }
}

/// Where a postponed task stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Processing,
    Done,
}

impl TaskState {
    /// Anything but `"status": "processing"` counts as done
    pub fn of(decoded: &Decoded) -> Self {
        if decoded.status() == Some(PROCESSING) {
            TaskState::Processing
        } else {
            TaskState::Done
        }
    }
}

/// Poll with `fetch` until the task leaves the processing state
///
/// The first poll is immediate; `policy.interval` is slept between polls.
/// Errors from `fetch` end polling at once.
///
/// # Errors
///
/// Returns `TaleError::PollTimeout` once `policy.max_attempts` polls all
/// reported processing.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use std::time::Duration;
/// use tale_http_client::{Decoded, PollPolicy, ThreadSleeper, wait_for_task};
///
/// let mut replies = vec![json!({"status": "ok"}), json!({"status": "processing"})];
/// let policy = PollPolicy { interval: Duration::from_millis(1), max_attempts: 5 };
/// let done = wait_for_task(&policy, &ThreadSleeper, || {
///     Ok(Decoded::Json(replies.pop().unwrap()))
/// })
/// .unwrap();
/// assert_eq!(done.status(), Some("ok"));
/// ```
pub fn wait_for_task<F>(policy: &PollPolicy, sleeper: &dyn Sleeper, mut fetch: F) -> Result<Decoded, TaleError>
where
    F: FnMut() -> Result<Decoded, TaleError>,
{
    for attempt in 1..=policy.max_attempts {
        let decoded = fetch()?;
        match TaskState::of(&decoded) {
            TaskState::Done => {
                debug!(attempt, "postponed task finished");
                return Ok(decoded);
            }
            TaskState::Processing => {
                trace!(attempt, "postponed task still processing");
                if attempt < policy.max_attempts {
                    sleeper.sleep(policy.interval);
                }
            }
        }
    }

    Err(TaleError::PollTimeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records requested sleeps instead of sleeping
    #[derive(Debug, Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn scripted(statuses: &[&str]) -> impl FnMut() -> Result<Decoded, TaleError> {
        let mut replies: Vec<Decoded> = statuses
            .iter()
            .rev()
            .map(|s| Decoded::Json(json!({"status": s, "data": {"step": s}})))
            .collect();
        move || Ok(replies.pop().expect("poll after script ended"))
    }

    #[test]
    fn test_two_processing_then_done() {
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy::default();
        let result = wait_for_task(&policy, &sleeper, scripted(&["processing", "processing", "ok"])).unwrap();

        assert_eq!(result.status(), Some("ok"));
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(300), Duration::from_millis(300)]
        );
    }

    #[test]
    fn test_immediate_done_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let result = wait_for_task(&PollPolicy::default(), &sleeper, scripted(&["ok"])).unwrap();
        assert_eq!(result.status(), Some("ok"));
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_text_payload_counts_as_done() {
        let sleeper = RecordingSleeper::default();
        let result = wait_for_task(&PollPolicy::default(), &sleeper, || {
            Ok(Decoded::Text("finished".to_string()))
        })
        .unwrap();
        assert_eq!(result, Decoded::Text("finished".to_string()));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 3,
        };
        let mut polls = 0;
        let result = wait_for_task(&policy, &sleeper, || {
            polls += 1;
            Ok(Decoded::Json(json!({"status": "processing"})))
        });

        assert!(matches!(result, Err(TaleError::PollTimeout { attempts: 3 })));
        assert_eq!(polls, 3);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_fetch_error_stops_polling() {
        let sleeper = RecordingSleeper::default();
        let mut polls = 0;
        let result = wait_for_task(&PollPolicy::default(), &sleeper, || {
            polls += 1;
            Err(TaleError::Encoding)
        });
        assert!(matches!(result, Err(TaleError::Encoding)));
        assert_eq!(polls, 1);
    }

    #[test]
    fn test_pending_task_from_response() {
        let decoded = Decoded::Json(json!({"status": "processing", "status_url": "/postponed-tasks/5/status"}));
        let task = PendingTask::from_response(&decoded).unwrap();
        assert_eq!(task.status_url(), "/postponed-tasks/5/status");

        assert!(PendingTask::from_response(&Decoded::Json(json!({"status": "ok"}))).is_none());
        assert!(PendingTask::from_response(&Decoded::Text("status_url".into())).is_none());
    }
}
