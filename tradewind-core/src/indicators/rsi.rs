//! Relative Strength Index with Wilder smoothing, streaming form.
//!
//! Gains and losses are split out of successive close deltas and smoothed
//! independently. Warmup: `period + 1` candles (the first delta needs two
//! closes).
//!
//! Degenerate averages: both zero -> 50, no losses -> 100, no gains -> 0.

use super::wilder::WilderSmoother;

#[derive(Debug, Clone)]
pub struct Rsi {
    prev_close: Option<f64>,
    avg_gain: WilderSmoother,
    avg_loss: WilderSmoother,
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            prev_close: None,
            avg_gain: WilderSmoother::new(period),
            avg_loss: WilderSmoother::new(period),
            period,
        }
    }

    pub fn warmup(&self) -> usize {
        self.period + 1
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(p) => p,
            None => return None,
        };
        let delta = close - prev;
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        let avg_gain = self.avg_gain.update(gain);
        let avg_loss = self.avg_loss.update(loss);
        match (avg_gain, avg_loss) {
            (Some(g), Some(l)) => Some(compute_rsi(g, l)),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.prev_close = None;
        self.avg_gain.reset();
        self.avg_loss.reset();
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_warms_up_after_period_plus_one() {
        let mut rsi = Rsi::new(3);
        assert_eq!(rsi.update(100.0), None);
        assert_eq!(rsi.update(101.0), None);
        assert_eq!(rsi.update(102.0), None);
        assert!(rsi.update(103.0).is_some());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for i in 0..10 {
            last = rsi.update(100.0 + i as f64);
        }
        assert!((last.unwrap() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for i in 0..10 {
            last = rsi.update(100.0 - i as f64);
        }
        assert!(last.unwrap().abs() < 1e-10);
    }

    #[test]
    fn rsi_flat_series_is_50() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for _ in 0..10 {
            last = rsi.update(100.0);
        }
        assert!((last.unwrap() - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_balanced_moves_near_50() {
        let mut rsi = Rsi::new(4);
        let closes = [100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 100.0];
        let mut last = None;
        for c in closes {
            last = rsi.update(c);
        }
        let v = last.unwrap();
        assert!(v > 30.0 && v < 70.0, "expected mid-band RSI, got {v}");
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let mut rsi = Rsi::new(5);
        let closes = [10.0, 14.0, 9.0, 15.0, 8.0, 16.0, 7.0, 17.0, 6.0, 18.0];
        for c in closes {
            if let Some(v) = rsi.update(c) {
                assert!((0.0..=100.0).contains(&v));
            }
        }
    }
}
