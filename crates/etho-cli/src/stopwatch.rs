use std::time::{Duration, Instant};

pub const UNKNOWN: &str = "--:--:--";

#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { started: Some(Instant::now()) }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Time remaining at the current average rate, once at least two items
    /// are done and some time has passed.
    pub fn remaining(&self, done: usize, total: usize) -> Option<Duration> {
        self.started?;
        remaining_at(self.elapsed(), done, total)
    }

    pub fn elapsed_hms(&self) -> String {
        format_hms(self.elapsed())
    }

    pub fn remaining_hms(&self, done: usize, total: usize) -> String {
        self.remaining(done, total).map(format_hms).unwrap_or_else(|| UNKNOWN.to_string())
    }
}

fn remaining_at(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done <= 1 || total == 0 || elapsed < Duration::from_millis(100) {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(per_item * total.saturating_sub(done) as f64))
}

/// `HH:MM:SS`, whole seconds, hours not wrapped.
pub fn format_hms(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}
