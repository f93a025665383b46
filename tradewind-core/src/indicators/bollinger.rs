//! Bollinger Bands, streaming form.
//!
//! Middle band is the rolling SMA, outer bands sit `k` population standard
//! deviations away. Warmup: `period` candles.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// Band width relative to the middle band. Zero when the middle band is
    /// degenerate.
    pub fn width(&self) -> f64 {
        if self.middle == 0.0 {
            0.0
        } else {
            (self.upper - self.lower) / self.middle
        }
    }

    /// Position of `price` inside the bands: 0 at the lower band, 1 at the
    /// upper. Values outside [0, 1] mean the price escaped the bands.
    pub fn percent_b(&self, price: f64) -> f64 {
        let span = self.upper - self.lower;
        if span == 0.0 {
            0.5
        } else {
            (price - self.lower) / span
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    k: f64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl Bollinger {
    pub fn new(period: usize, k: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        assert!(k > 0.0, "Bollinger k must be positive");
        Self {
            period,
            k,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn warmup(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, close: f64) -> Option<BollingerBands> {
        self.window.push_back(close);
        self.sum += close;
        self.sum_sq += close * close;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
                self.sum_sq -= evicted * evicted;
            }
        }
        if self.window.len() < self.period {
            return None;
        }
        let n = self.period as f64;
        let mean = self.sum / n;
        // population variance; clamp tiny negative rounding residue
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let std_dev = variance.sqrt();
        Some(BollingerBands {
            upper: mean + self.k * std_dev,
            middle: mean,
            lower: mean - self.k * std_dev,
        })
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
}
