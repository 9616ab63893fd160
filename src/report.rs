//! Result-reporting abstraction. Search components depend only on the
//! trait; hosts supply their own implementation or use the provided console
//! reporter.

use crate::key::Key;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub trait ResultReporter: Send + Sync {
    /// A scored candidate: key, score, decoded plaintext, free-form
    /// description, and the crib position when one applies.
    fn report_result(
        &self,
        key: &Key,
        score: i64,
        plaintext: &str,
        desc: &str,
        crib_position: Option<usize>,
    );

    fn write_message(&self, message: &str);

    fn write_warning(&self, message: &str);

    /// Names the search phase currently running.
    fn update_step(&self, step: &str);

    /// Progress fraction; implementations rate-limit the display.
    fn display_progress(&self, count: u64, total: u64);

    /// Gate allowing a host to throttle result emission.
    fn should_push(&self, score: i64) -> bool;

    /// Cooperative termination flag, polled by every search loop.
    fn should_terminate(&self) -> bool;
}

#[derive(Debug, Clone, Serialize)]
pub struct BestListEntry {
    pub key: String,
    pub score: i64,
    pub plaintext: String,
    pub desc: String,
    pub crib_position: Option<usize>,
}

struct ReporterState {
    best: Vec<BestListEntry>,
    last_score: i64,
    last_progress: Instant,
    last_count: u64,
}

/// Console implementation: results and messages go to `tracing`, the best
/// list is kept for rendering, progress is throttled to one line per second.
pub struct ConsoleReporter {
    cancel: AtomicBool,
    state: Mutex<ReporterState>,
    best_list_size: usize,
    progress_interval: Duration,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        ConsoleReporter::new(10)
    }
}

impl ConsoleReporter {
    pub fn new(best_list_size: usize) -> ConsoleReporter {
        ConsoleReporter {
            cancel: AtomicBool::new(false),
            state: Mutex::new(ReporterState {
                best: Vec::new(),
                last_score: 0,
                last_progress: Instant::now(),
                last_count: 0,
            }),
            best_list_size,
            progress_interval: Duration::from_secs(1),
        }
    }

    /// Requests cooperative termination of all running searches.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn best_list(&self) -> Vec<BestListEntry> {
        self.state.lock().expect("reporter lock").best.clone()
    }

    pub fn best_score(&self) -> i64 {
        self.state.lock().expect("reporter lock").last_score
    }

    /// Renders the best list as a console table.
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Score", "Key", "Position", "Plaintext"]);
        for entry in self.best_list() {
            table.add_row(vec![
                Cell::new(entry.score),
                Cell::new(&entry.key),
                Cell::new(
                    entry
                        .crib_position
                        .map_or(String::from("-"), |p| p.to_string()),
                ),
                Cell::new(&entry.plaintext),
            ]);
        }
        table.to_string()
    }

    /// Best list as JSON for host consumption.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.best_list())
    }
}

impl ResultReporter for ConsoleReporter {
    fn report_result(
        &self,
        key: &Key,
        score: i64,
        plaintext: &str,
        desc: &str,
        crib_position: Option<usize>,
    ) {
        let mut state = self.state.lock().expect("reporter lock");
        if score > state.last_score {
            state.last_score = score;
            info!(score, key = %key.key_string_short(true), %desc, "new best candidate");
            state.best.push(BestListEntry {
                key: key.key_string_short(true),
                score,
                plaintext: plaintext.to_string(),
                desc: desc.to_string(),
                crib_position,
            });
            state.best.sort_by(|a, b| b.score.cmp(&a.score));
            state.best.truncate(self.best_list_size);
        }
    }

    fn write_message(&self, message: &str) {
        info!("{message}");
    }

    fn write_warning(&self, message: &str) {
        warn!("{message}");
    }

    fn update_step(&self, step: &str) {
        debug!("{step}");
    }

    fn display_progress(&self, count: u64, total: u64) {
        let mut state = self.state.lock().expect("reporter lock");
        if state.last_progress.elapsed() >= self.progress_interval {
            let interval = state.last_progress.elapsed().as_secs_f64();
            let rate = (count.saturating_sub(state.last_count)) as f64 / interval;
            let remaining = total.saturating_sub(count);
            let eta_secs = if rate > 0.0 {
                (remaining as f64 / rate) as u64
            } else {
                0
            };
            info!(
                count,
                total,
                rate = rate as u64,
                eta_secs,
                "search progress"
            );
            state.last_progress = Instant::now();
            state.last_count = count;
        }
    }

    fn should_push(&self, _score: i64) -> bool {
        true
    }

    fn should_terminate(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Model;

    #[test]
    fn best_list_keeps_top_scores_only() {
        let reporter = ConsoleReporter::new(2);
        let key = Key::new(Model::M3);
        reporter.report_result(&key, 100, "AAA", "test", None);
        reporter.report_result(&key, 300, "BBB", "test", Some(4));
        reporter.report_result(&key, 200, "CCC", "test", None); // not a new best
        let best = reporter.best_list();
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].score, 300);
        assert_eq!(best[0].crib_position, Some(4));
    }

    #[test]
    fn cancellation_is_visible() {
        let reporter = ConsoleReporter::default();
        assert!(!reporter.should_terminate());
        reporter.cancel();
        assert!(reporter.should_terminate());
    }

    #[test]
    fn table_renders_entries() {
        let reporter = ConsoleReporter::default();
        let key = Key::new(Model::M3);
        reporter.report_result(&key, 7, "HELLOWORLD", "unit", Some(3));
        let table = reporter.render_table();
        assert!(table.contains("HELLOWORLD"));
        assert!(table.contains('7'));
    }

    #[test]
    fn json_export_round_trips() {
        let reporter = ConsoleReporter::default();
        let key = Key::new(Model::H);
        reporter.report_result(&key, 42, "XYZ", "unit", None);
        let json = reporter.export_json().unwrap();
        assert!(json.contains("\"score\": 42"));
    }
}
