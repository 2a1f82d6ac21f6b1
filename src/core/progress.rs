//! Progress reporting capability
//!
//! Long-running stages report through a [`ProgressSink`] handed to them by the
//! caller instead of writing to the console directly, so the core stays quiet
//! under test.

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

/// Time estimate attached to a generation progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    /// Time spent so far (first half of the volume)
    Elapsed(Duration),
    /// Estimated time left (second half of the volume)
    Remaining(Duration),
}

impl Eta {
    pub fn duration(&self) -> Duration {
        match *self {
            Eta::Elapsed(d) | Eta::Remaining(d) => d,
        }
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, d) = match *self {
            Eta::Elapsed(d) => ("Elapsed Time", d),
            Eta::Remaining(d) => ("Remaining Time", d),
        };
        write!(f, "{} {}", label, format_hms(d))
    }
}

/// Format a duration as `H:MM:SS`
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Receiver for stage and progress messages
pub trait ProgressSink {
    /// A pipeline stage started or finished
    fn stage(&self, message: &str);

    /// Volume generation advanced to `percent` (0-100)
    fn generation(&self, percent: f64, eta: Eta);
}

/// Forwards everything to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn stage(&self, message: &str) {
        log::info!("{}", message);
    }

    fn generation(&self, percent: f64, eta: Eta) {
        log::info!("Generating data {:.3}% completed ({})", percent, eta);
    }
}

/// Discards all messages
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn stage(&self, _message: &str) {}
    fn generation(&self, _percent: f64, _eta: Eta) {}
}

/// Records messages in memory for later inspection
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub stages: RefCell<Vec<String>>,
    pub updates: RefCell<Vec<(f64, Eta)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for RecordingProgress {
    fn stage(&self, message: &str) {
        self.stages.borrow_mut().push(message.to_string());
    }

    fn generation(&self, percent: f64, eta: Eta) {
        self.updates.borrow_mut().push((percent, eta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_hms(Duration::from_secs(61)), "0:01:01");
        assert_eq!(format_hms(Duration::from_secs(3 * 3600 + 25 * 60 + 7)), "3:25:07");
    }

    #[test]
    fn test_eta_display() {
        let eta = Eta::Remaining(Duration::from_secs(90));
        assert_eq!(eta.to_string(), "Remaining Time 0:01:30");
        assert_eq!(eta.duration(), Duration::from_secs(90));
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingProgress::new();
        sink.stage("Computing 1D Histogram...");
        sink.generation(50.0, Eta::Elapsed(Duration::ZERO));

        assert_eq!(sink.stages.borrow().len(), 1);
        assert_eq!(sink.updates.borrow()[0].0, 50.0);
    }
}
