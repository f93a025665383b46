//! Average True Range, streaming form.
//!
//! True ranges need the previous close, so the first candle contributes
//! nothing; the Wilder seed averages the first `period` true ranges after
//! that. Warmup: `period + 1` candles.

use super::wilder::{true_range, WilderSmoother};

#[derive(Debug, Clone)]
pub struct Atr {
    prev_close: Option<f64>,
    smoother: WilderSmoother,
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            prev_close: None,
            smoother: WilderSmoother::new(period),
            period,
        }
    }

    pub fn warmup(&self) -> usize {
        self.period + 1
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(p) => p,
            None => return None,
        };
        self.smoother.update(true_range(high, low, prev))
    }

    pub fn reset(&mut self) {
        self.prev_close = None;
        self.smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atr_warms_up_after_period_plus_one() {
        let mut atr = Atr::new(3);
        assert_eq!(atr.update(11.0, 9.0, 10.0), None);
        assert_eq!(atr.update(12.0, 10.0, 11.0), None);
        assert_eq!(atr.update(13.0, 11.0, 12.0), None);
        assert!(atr.update(14.0, 12.0, 13.0).is_some());
    }

    #[test]
    fn atr_constant_range_equals_range() {
        let mut atr = Atr::new(3);
        let mut last = None;
        for _ in 0..20 {
            // every candle spans exactly 2.0 and closes mid-range
            last = atr.update(101.0, 99.0, 100.0);
        }
        assert!((last.unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn atr_captures_gaps() {
        let mut atr = Atr::new(2);
        atr.update(101.0, 99.0, 100.0);
        atr.update(101.0, 99.0, 100.0);
        atr.update(101.0, 99.0, 100.0);
        // gap up: high - prev_close = 30, dwarfs the 2.0 intrabar range
        let v = atr.update(130.0, 128.0, 129.0).unwrap();
        assert!(v > 10.0, "gap should inflate ATR, got {v}");
    }

    #[test]
    fn atr_is_positive_for_moving_prices() {
        let mut atr = Atr::new(4);
        let mut close = 50.0;
        for i in 0..30 {
            close += if i % 2 == 0 { 1.5 } else { -0.5 };
            if let Some(v) = atr.update(close + 1.0, close - 1.0, close) {
                assert!(v > 0.0);
            }
        }
    }
}
