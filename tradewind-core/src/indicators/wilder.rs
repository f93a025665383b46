//! Wilder smoothing, shared by RSI, ATR and ADX.
//!
//! Seeded with the arithmetic mean of the first `period` inputs, then
//! `s = s + (x - s) / period` (an EMA with alpha = 1 / period).

#[derive(Debug, Clone)]
pub struct WilderSmoother {
    period: usize,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Wilder period must be >= 1");
        Self {
            period,
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        match self.value {
            Some(prev) => {
                let next = prev + (x - prev) / self.period as f64;
                self.value = Some(next);
                Some(next)
            }
            None => {
                self.seed_sum += x;
                self.seen += 1;
                if self.seen == self.period {
                    let seed = self.seed_sum / self.period as f64;
                    self.value = Some(seed);
                    Some(seed)
                } else {
                    None
                }
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.seen = 0;
        self.value = None;
    }
}

/// True range of a candle given the previous close.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}
