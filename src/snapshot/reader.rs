use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use super::parser::{parse_line, DEFAULT_SOURCE};
use crate::config::SnapshotConfig;
use crate::models::{LogEvent, LogLevel};

/// Builds the catch-up burst sent to a newly connected client
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    path: PathBuf,
    max_lines: usize,
}

impl SnapshotReader {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        Self {
            path: path.into(),
            max_lines,
        }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(config.log_file.clone(), config.max_lines)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tail of the log file, or the example set if there is nothing to show
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Vec<LogEvent> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Log file unavailable ({}), sending example events", e);
                return example_events(Utc::now());
            }
        };

        let contents = String::from_utf8_lossy(&bytes);
        let events = self.parse_tail(&contents, Utc::now());
        if events.is_empty() {
            debug!("Log file is empty, sending example events");
            return example_events(Utc::now());
        }

        debug!("Loaded {} snapshot events", events.len());
        events
    }

    /// Parse the last `max_lines` non-blank lines of `contents`
    pub fn parse_tail(&self, contents: &str, now: DateTime<Utc>) -> Vec<LogEvent> {
        let lines: Vec<&str> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(self.max_lines);

        lines[start..]
            .iter()
            .map(|line| parse_line(line, now))
            .collect()
    }
}

/// Placeholder events so a fresh dashboard is never empty
pub fn example_events(now: DateTime<Utc>) -> Vec<LogEvent> {
    vec![
        LogEvent::at(
            now - Duration::minutes(3),
            LogLevel::Info,
            "Log stream ready",
            DEFAULT_SOURCE,
        ),
        LogEvent::at(
            now - Duration::minutes(2),
            LogLevel::Info,
            "Scheduler started",
            "scheduler",
        ),
        LogEvent::at(
            now - Duration::minutes(1),
            LogLevel::Warn,
            "No persisted log file found, showing sample entries",
            DEFAULT_SOURCE,
        ),
    ]
}
