//! Progress display for download operations
//!
//! One indicatif bar per requested URL under a shared `MultiProgress`. Bars
//! are driven by the fraction and throughput the coordinator reports for
//! each caller. indicatif hides its output when stderr is not a terminal, so
//! the same code serves both interactive and piped runs.

use std::fmt;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::app::cache::format_bytes;
use crate::app::coordinator::DownloadProgress;
use crate::errors::{AppError, Result};

/// Resolution of each bar
const BAR_LENGTH: u64 = 1000;

/// Multi-bar display for a download session
pub struct ProgressDisplay {
    multi: MultiProgress,
    style: ProgressStyle,
    enabled: bool,
}

impl fmt::Debug for ProgressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressDisplay")
            .field("multi", &self.multi)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl ProgressDisplay {
    /// Create a display; when `enabled` is false every bar is hidden
    pub fn new(enabled: bool) -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
            .progress_chars("##-");

        Ok(Self {
            multi: MultiProgress::new(),
            style,
            enabled,
        })
    }

    /// Add a bar labelled with `label`
    pub fn add(&self, label: &str) -> DownloadBar {
        let bar = if self.enabled {
            self.multi.add(ProgressBar::new(BAR_LENGTH))
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(self.style.clone());
        bar.set_message(label.to_string());

        DownloadBar {
            bar,
            label: label.to_string(),
        }
    }
}

/// A single download's bar
#[derive(Debug, Clone)]
pub struct DownloadBar {
    bar: ProgressBar,
    label: String,
}

impl DownloadBar {
    /// Apply a progress update
    pub fn update(&self, progress: DownloadProgress) {
        let position = (progress.fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64) as u64;
        self.bar.set_position(position);
        self.bar.set_message(format!(
            "{} ({}/s)",
            self.label,
            format_bytes(progress.throughput.max(0.0) as u64)
        ));
    }

    /// Finish the bar with a final message
    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(format!("{} {}", self.label, message.into()));
    }

    /// Finish the bar leaving it where it stopped
    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(format!("{} {}", self.label, message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_display_accepts_updates() {
        let display = ProgressDisplay::new(false).unwrap();
        let bar = display.add("cover.png");

        bar.update(DownloadProgress {
            fraction: 0.5,
            throughput: 2048.0,
        });
        bar.update(DownloadProgress {
            fraction: 1.7,
            throughput: -1.0,
        });
        bar.finish("done");
    }

    #[test]
    fn test_debug_omits_style() {
        let display = ProgressDisplay::new(true).unwrap();
        let rendered = format!("{display:?}");
        assert!(rendered.starts_with("ProgressDisplay"));
        assert!(rendered.contains("enabled: true"));
    }
}
