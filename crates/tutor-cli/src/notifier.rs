//! Output notification system for the CLI
//!
//! Commands report through a trait so the console backend can be swapped for
//! a recording one in tests.

use std::sync::{Arc, Mutex};

/// Trait for handling command output notifications
pub trait Notifier: Send + Sync {
    /// Handle regular output: program text, match listings, summaries
    fn on_output(&self, content: &str);

    /// Handle error output
    fn on_error(&self, content: &str);

    /// Handle the one-line result of a command with timing information
    fn on_result(&self, message: &str, duration_ms: u64);
}

/// Console notifier. Program text goes to stdout so it can be piped; status
/// lines and errors go to stderr.
pub struct DefaultNotifier;

impl DefaultNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for DefaultNotifier {
    fn on_output(&self, content: &str) {
        if !content.is_empty() {
            println!("{}", content.trim_end_matches('\n'));
        }
    }

    fn on_error(&self, content: &str) {
        eprintln!("error: {content}");
    }

    fn on_result(&self, message: &str, duration_ms: u64) {
        eprintln!("=> {message} ({duration_ms}ms)");
    }
}

impl Default for DefaultNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps everything it is told. Clones share the same buffers.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    output: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
    results: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> Vec<String> {
        snapshot(&self.output)
    }

    pub fn errors(&self) -> Vec<String> {
        snapshot(&self.errors)
    }

    /// Result messages, without timing
    pub fn results(&self) -> Vec<String> {
        snapshot(&self.results)
    }
}

fn snapshot(buffer: &Mutex<Vec<String>>) -> Vec<String> {
    buffer.lock().map(|lines| lines.clone()).unwrap_or_default()
}

fn record(buffer: &Mutex<Vec<String>>, content: &str) {
    if let Ok(mut lines) = buffer.lock() {
        lines.push(content.to_string());
    }
}

impl Notifier for RecordingNotifier {
    fn on_output(&self, content: &str) {
        record(&self.output, content);
    }

    fn on_error(&self, content: &str) {
        record(&self.errors, content);
    }

    fn on_result(&self, message: &str, _duration_ms: u64) {
        record(&self.results, message);
    }
}
