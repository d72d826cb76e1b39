use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Terminal progress for commands running inside one stage.
///
/// Disabled monitors accept every call and draw nothing, so backends can
/// drive one unconditionally.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    command_bars: HashMap<usize, ProgressBar>,
    enabled: bool,
}

impl ProgressMonitor {
    pub fn new(total_commands: usize, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_commands as u64));
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} commands {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        overall.set_style(style);

        Self {
            multi,
            overall,
            command_bars: HashMap::new(),
            enabled: true,
        }
    }

    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: ProgressBar::hidden(),
            command_bars: HashMap::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Shows a spinner for command `index` labelled with its rendering.
    pub fn start_command(&mut self, index: usize, label: &str) {
        if !self.enabled {
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(truncate(label, 72));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.command_bars.insert(index, bar);
    }

    pub fn complete_command(&mut self, index: usize, success: bool, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        if let Some(bar) = self.command_bars.remove(&index) {
            let icon = if success { "ok" } else { "FAILED" };
            let msg = bar.message();
            bar.finish_with_message(format!("{icon} {msg} ({duration_ms}ms)"));
        }
        self.overall.inc(1);
    }

    pub fn set_stage(&self, stage: &str) {
        if self.enabled {
            self.overall.set_message(stage.to_string());
        }
    }

    pub fn finish(&self, success: bool) {
        if !self.enabled {
            return;
        }
        let msg = if success { "done" } else { "failed" };
        self.overall.finish_with_message(msg);
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.command_bars.drain() {
            bar.finish_and_clear();
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}
