//! Average Directional Index, streaming form.
//!
//! Directional movement is taken per candle pair, Wilder-smoothed together
//! with the true range, turned into DI+/DI-, then the DX series is
//! Wilder-smoothed once more. Warmup: `2 * period` candles.

use super::wilder::{true_range, WilderSmoother};

#[derive(Debug, Clone)]
pub struct Adx {
    prev: Option<(f64, f64, f64)>,
    smooth_plus_dm: WilderSmoother,
    smooth_minus_dm: WilderSmoother,
    smooth_tr: WilderSmoother,
    smooth_dx: WilderSmoother,
    period: usize,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            prev: None,
            smooth_plus_dm: WilderSmoother::new(period),
            smooth_minus_dm: WilderSmoother::new(period),
            smooth_tr: WilderSmoother::new(period),
            smooth_dx: WilderSmoother::new(period),
            period,
        }
    }

    pub fn warmup(&self) -> usize {
        2 * self.period
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let (prev_high, prev_low, prev_close) = match self.prev.replace((high, low, close)) {
            Some(p) => p,
            None => return None,
        };

        let up_move = high - prev_high;
        let down_move = prev_low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        let sp = self.smooth_plus_dm.update(plus_dm);
        let sm = self.smooth_minus_dm.update(minus_dm);
        let st = self.smooth_tr.update(true_range(high, low, prev_close));

        let (sp, sm, st) = match (sp, sm, st) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return None,
        };

        let (plus_di, minus_di) = if st == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * sp / st, 100.0 * sm / st)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };

        self.smooth_dx.update(dx)
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.smooth_plus_dm.reset();
        self.smooth_minus_dm.reset();
        self.smooth_tr.reset();
        self.smooth_dx.reset();
    }
}
