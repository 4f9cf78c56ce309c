//! Progress UI for mirror runs: one bar per in-flight file plus a run total.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use autoindex_mirror::{EventReporter, MirrorEvent};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const FILE_TEMPLATE: &str =
    "{spinner} {wide_msg} {bytes}/{total_bytes} [{bar:30}] {bytes_per_sec}";
const UNSIZED_TEMPLATE: &str = "{spinner} {wide_msg} {bytes} {bytes_per_sec}";
const TOTAL_TEMPLATE: &str = "{spinner} {msg}";

#[derive(Default)]
struct Counters {
    downloaded: usize,
    failed: usize,
    directories: usize,
}

/// Renders download events as indicatif progress bars.
pub(crate) struct ProgressReporter {
    multi: MultiProgress,
    total: ProgressBar,
    bars: Mutex<HashMap<String, ProgressBar>>,
    counters: Mutex<Counters>,
}

impl ProgressReporter {
    pub(crate) fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let total = multi.add(ProgressBar::new_spinner());
        total.set_style(
            ProgressStyle::with_template(TOTAL_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        total.enable_steady_tick(Duration::from_millis(120));
        total.set_message("Reading listing...");
        Self {
            multi,
            total,
            bars: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Clears every bar from the terminal.
    pub(crate) fn finish(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
        self.total.finish_and_clear();
    }

    fn start_bar(&self, file_name: &str, total_bytes: Option<u64>) {
        let (bar, template) = match total_bytes {
            Some(len) => (ProgressBar::new(len), FILE_TEMPLATE),
            None => (ProgressBar::new_spinner(), UNSIZED_TEMPLATE),
        };
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(file_name.to_string());
        let bar = self.multi.add(bar);
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(file_name.to_string(), bar);
        }
    }

    fn end_bar(&self, file_name: &str) {
        let removed = self
            .bars
            .lock()
            .ok()
            .and_then(|mut bars| bars.remove(file_name));
        if let Some(bar) = removed {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn update_total(&self, update: impl FnOnce(&mut Counters)) {
        if let Ok(mut counters) = self.counters.lock() {
            update(&mut counters);
            self.total.set_message(format!(
                "{} downloaded, {} failed, {} directories finished",
                counters.downloaded, counters.failed, counters.directories
            ));
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }
}

impl EventReporter for ProgressReporter {
    fn report(&self, event: &MirrorEvent) {
        match event {
            MirrorEvent::DownloadStarted {
                file_name,
                total_bytes,
            } => self.start_bar(file_name, *total_bytes),
            MirrorEvent::DownloadProgress { file_name, bytes } => {
                if let Ok(bars) = self.bars.lock()
                    && let Some(bar) = bars.get(file_name)
                {
                    bar.inc(*bytes);
                }
            }
            MirrorEvent::DownloadSucceeded { file_name, .. } => {
                self.end_bar(file_name);
                self.update_total(|c| c.downloaded += 1);
            }
            MirrorEvent::DownloadFailed { file_name, .. } => {
                self.end_bar(file_name);
                self.update_total(|c| c.failed += 1);
            }
            MirrorEvent::DirectoryFinished { .. } => {
                self.update_total(|c| c.directories += 1);
            }
            MirrorEvent::Skip { .. } | MirrorEvent::DirectoryFailed { .. } => {}
        }
    }
}
