//! Moving Average Convergence Divergence, streaming form.
//!
//! MACD line = fast EMA - slow EMA, signal = EMA of the MACD line,
//! histogram = line - signal. Warmup: `slow + signal - 1` candles (the
//! signal EMA only starts seeing values once the slow EMA is live).

use serde::{Deserialize, Serialize};

use super::ema::Ema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            slow_period: slow,
            signal_period: signal,
        }
    }

    pub fn warmup(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    pub fn update(&mut self, close: f64) -> Option<MacdOutput> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let line = match (fast, slow) {
            (Some(f), Some(s)) => f - s,
            _ => return None,
        };
        let signal = self.signal.update(line)?;
        Some(MacdOutput {
            line,
            signal,
            histogram: line - signal,
        })
    }

    pub fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_warmup_count() {
        let mut macd = Macd::new(3, 5, 2);
        let mut first_at = None;
        for i in 1..=20 {
            if macd.update(100.0 + i as f64).is_some() && first_at.is_none() {
                first_at = Some(i);
            }
        }
        // slow(5) + signal(2) - 1 = 6
        assert_eq!(first_at, Some(6));
    }

    #[test]
    fn macd_constant_series_is_zero() {
        let mut macd = Macd::new(3, 6, 2);
        let mut last = None;
        for _ in 0..30 {
            last = macd.update(100.0);
        }
        let out = last.unwrap();
        assert!(out.line.abs() < 1e-10);
        assert!(out.signal.abs() < 1e-10);
        assert!(out.histogram.abs() < 1e-10);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let mut macd = Macd::new(3, 6, 2);
        let mut last = None;
        for i in 0..40 {
            last = macd.update(100.0 + 2.0 * i as f64);
        }
        let out = last.unwrap();
        assert!(out.line > 0.0, "fast EMA should lead in an uptrend");
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let mut macd = Macd::new(2, 4, 3);
        let closes = [10.0, 12.0, 11.0, 14.0, 13.0, 16.0, 15.0, 18.0];
        for c in closes {
            if let Some(out) = macd.update(c) {
                assert!((out.histogram - (out.line - out.signal)).abs() < 1e-12);
            }
        }
    }

    #[test]
    #[should_panic(expected = "fast period must be shorter")]
    fn macd_rejects_inverted_periods() {
        Macd::new(26, 12, 9);
    }
}
