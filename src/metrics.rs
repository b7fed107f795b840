// src/metrics.rs
//
// Streaming statistics for training telemetry. The trainer feeds these once
// per episode: OnlineStats over the whole run, TrailingWindow for the
// periodic progress lines.

use std::collections::VecDeque;

/// Welford accumulator: running mean, population variance and extremes over
/// a sample stream.
///
/// Non-finite samples are skipped, so one degenerate episode cannot poison
/// the run aggregates. An empty accumulator reports 0.0 everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlineStats {
    count: u64,
    mean: f64,
    m2: f64,
    bounds: Option<(f64, f64)>,
}

impl OnlineStats {
    pub fn add(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }

        self.bounds = Some(match self.bounds {
            None => (sample, sample),
            Some((lo, hi)) => (lo.min(sample), hi.max(sample)),
        });

        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.mean
    }

    pub fn min(&self) -> f64 {
        self.bounds.map_or(0.0, |(lo, _)| lo)
    }

    pub fn max(&self) -> f64 {
        self.bounds.map_or(0.0, |(_, hi)| hi)
    }

    /// Population variance (n divisor).
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2 / self.count as f64
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Rolling mean over the last `capacity` samples. Used for the periodic
/// training progress lines, where a lifetime mean hides recent movement.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl TrailingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, x: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(x);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}
