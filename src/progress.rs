//! Progress bars for long running per-ref work.
//!
//! Rendering code only sees a `ProgressBar`; whether anything is drawn is
//! decided once here.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One bar per ref, stacked while refs render in parallel.
pub struct Progress {
    bars: MultiProgress,
    hidden: bool,
}

impl Progress {
    /// Creates the bar set; `hidden` suppresses all drawing.
    ///
    /// Bars are hidden in quiet mode and in verbose mode, where they would
    /// interleave with log lines on stderr.
    pub fn new(hidden: bool) -> Self {
        let bars = if hidden {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self { bars, hidden }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Starts a bar labelled `label` counting to `total`.
    pub fn start(&self, label: &str, total: u64) -> ProgressBar {
        if self.hidden {
            return ProgressBar::hidden();
        }

        let bar = self.bars.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} {}: [{{bar:40.cyan/blue}}] {{pos}}/{{len}}",
                    label
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bars_still_count() {
        // Arrange
        let progress = Progress::new(true);

        // Act
        let bar = progress.start("write files: main", 3);
        bar.inc(2);

        // Assert
        assert!(progress.is_hidden());
        assert_eq!(bar.position(), 2);
    }
}
