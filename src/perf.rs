//! Rolling parse / query timing statistics
//!
//! Observability only: nothing in the pipeline branches on these numbers.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_WINDOW: usize = 32;

/// Fixed-capacity window of samples with an O(1) running average
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
        }
    }

    /// Append a sample, evicting the oldest once at capacity
    pub fn record(&mut self, sample_ms: f64) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(sample_ms);
        self.sum += sample_ms;
    }

    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples oldest first
    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

/// Snapshot of both metrics, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub average_parse_time: f64,
    pub parse_times: Vec<f64>,
    pub average_query_time: f64,
    pub query_times: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    parse: RollingWindow,
    query: RollingWindow,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PerformanceTracker {
    pub fn new(window: usize) -> Self {
        Self {
            parse: RollingWindow::new(window),
            query: RollingWindow::new(window),
        }
    }

    pub fn record_parse(&mut self, duration_ms: f64) {
        self.parse.record(duration_ms);
    }

    pub fn record_query(&mut self, duration_ms: f64) {
        self.query.record(duration_ms);
    }

    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats {
            average_parse_time: self.parse.average(),
            parse_times: self.parse.samples(),
            average_query_time: self.query.average(),
            query_times: self.query.samples(),
        }
    }
}

/// Milliseconds as a float, for recording
pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
