use serde::Serialize;
use tracing::{info, warn};

/// Receives progress updates for one conversion task.
///
/// `progress` is a percentage; a negative value marks a failed task.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: f32, message: &str);
}

#[derive(Serialize)]
struct ProgressPayload<'a> {
    progress: i32,
    message: &'a str,
}

/// JSON payload for a progress update, percentage rounded up.
pub fn progress_payload(progress: f32, message: &str) -> String {
    let payload = ProgressPayload {
        progress: progress.ceil() as i32,
        message,
    };
    serde_json::to_string(&payload).unwrap_or_default()
}

/// Emits progress payloads on the tracing stream, tagged with the task id.
#[derive(Debug, Clone)]
pub struct TracingProgress {
    task_id: String,
}

impl TracingProgress {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl ProgressSink for TracingProgress {
    fn report(&self, progress: f32, message: &str) {
        let payload = progress_payload(progress, message);
        if progress < 0.0 {
            warn!(task_id = %self.task_id, %payload, "Task failed");
        } else {
            info!(task_id = %self.task_id, %payload, "Progress");
        }
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: f32, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Sink that remembers every update, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub updates: Mutex<Vec<(f32, String)>>,
    }

    impl ProgressSink for RecordingProgress {
        fn report(&self, progress: f32, message: &str) {
            if let Ok(mut updates) = self.updates.lock() {
                updates.push((progress, message.to_string()));
            }
        }
    }

    #[test]
    fn payload_rounds_up() {
        let payload = progress_payload(42.1, "assembling");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["progress"], 43);
        assert_eq!(value["message"], "assembling");
    }

    #[test]
    fn payload_keeps_failure_marker() {
        let payload = progress_payload(-1.0, "failed");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["progress"], -1);
    }

    #[test]
    fn recording_sink_collects() {
        let sink = RecordingProgress::default();
        sink.report(10.0, "a");
        sink.report(100.0, "b");
        NoProgress.report(50.0, "ignored");
        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].1, "b");
    }

    #[test]
    fn tracing_sink_keeps_task_id() {
        let sink = TracingProgress::new("task-7");
        assert_eq!(sink.task_id(), "task-7");
        sink.report(5.0, "start");
    }
}
