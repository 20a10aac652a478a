//! Progress reporting.
//!
//! The pipeline pushes stage lifecycle events through a trait-object sink so
//! callers can drive a terminal UI, a web socket, or nothing at all. Every
//! stage reports 0 at start and 100 at completion; failures arrive through
//! [`ProgressSink::on_error`].

use serde_json::Value;
use tracing::{error, info};

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, stage: &str, percent: u8, message: &str, payload: Option<&Value>);

    fn on_error(&self, stage: &str, message: &str) {
        self.on_progress(stage, 0, message, None);
    }
}

/// Default sink: structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&self, stage: &str, percent: u8, message: &str, _payload: Option<&Value>) {
        info!(stage, percent, message, "pipeline progress");
    }

    fn on_error(&self, stage: &str, message: &str) {
        error!(stage, message, "pipeline stage failed");
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _stage: &str, _percent: u8, _message: &str, _payload: Option<&Value>) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<(String, u8, String)>>,
        pub errors: Mutex<Vec<(String, String)>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, stage: &str, percent: u8, message: &str, _payload: Option<&Value>) {
            self.events
                .lock()
                .unwrap()
                .push((stage.to_string(), percent, message.to_string()));
        }

        fn on_error(&self, stage: &str, message: &str) {
            self.errors
                .lock()
                .unwrap()
                .push((stage.to_string(), message.to_string()));
        }
    }
}
