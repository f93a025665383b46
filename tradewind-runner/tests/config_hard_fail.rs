//! Startup validation is fail-fast: every constraint violation must abort
//! before a single candle is processed, with a message that names the field.

use tradewind_core::risk::TakeProfitPolicy;
use tradewind_runner::{AppConfig, ConfigError};

fn message(config: &AppConfig) -> String {
    config
        .validate()
        .expect_err("config should have been rejected")
        .to_string()
}

#[test]
fn empty_pair_is_rejected() {
    let mut config = AppConfig::default();
    config.data.pair = "  ".to_string();
    assert!(message(&config).contains("data.pair"));
}

#[test]
fn unknown_timeframe_is_rejected() {
    let mut config = AppConfig::default();
    config.data.timeframe = "3h".to_string();
    assert!(message(&config).contains("unknown timeframe '3h'"));
}

#[test]
fn non_positive_equity_is_rejected() {
    let mut config = AppConfig::default();
    config.engine.initial_equity = 0.0;
    assert!(message(&config).contains("initial_equity"));

    config.engine.initial_equity = f64::NAN;
    assert!(message(&config).contains("initial_equity"));
}

#[test]
fn fee_rate_must_stay_below_one() {
    let mut config = AppConfig::default();
    config.engine.fee_rate = 1.0;
    assert!(message(&config).contains("fee_rate"));

    config.engine.fee_rate = -0.001;
    assert!(message(&config).contains("fee_rate"));
}

#[test]
fn negative_slippage_is_rejected() {
    let mut config = AppConfig::default();
    config.engine.slippage_bps = -5.0;
    assert!(message(&config).contains("slippage"));
}

#[test]
fn zero_indicator_period_is_rejected() {
    let mut config = AppConfig::default();
    config.indicators.rsi_period = 0;
    assert!(message(&config).contains("rsi_period"));
}

#[test]
fn inverted_moving_averages_are_rejected() {
    let mut config = AppConfig::default();
    config.indicators.sma_short = config.indicators.sma_long;
    assert!(message(&config).contains("sma_short"));
}

#[test]
fn adx_threshold_outside_its_scale_is_rejected() {
    let mut config = AppConfig::default();
    config.regime.adx_threshold = 250.0;
    assert!(message(&config).contains("adx_threshold"));
}

#[test]
fn risk_fraction_bounds_are_enforced() {
    let mut config = AppConfig::default();
    config.risk.max_risk_per_trade = 0.0;
    assert!(message(&config).contains("max_risk_per_trade"));

    let mut config = AppConfig::default();
    config.risk.max_risk_per_trade = 1.0;
    assert!(message(&config).contains("max_risk_per_trade"));
}

#[test]
fn per_trade_risk_cannot_exceed_the_portfolio_ceiling() {
    let mut config = AppConfig::default();
    config.risk.max_risk_per_trade = config.risk.limits.max_total_risk + 0.01;
    assert!(message(&config).contains("max_total_risk"));
}

#[test]
fn zero_position_slots_are_rejected() {
    let mut config = AppConfig::default();
    config.risk.limits.max_open_positions = 0;
    assert!(message(&config).contains("max_open_positions"));
}

#[test]
fn scaled_ladder_fractions_must_sum_to_one() {
    let mut config = AppConfig::default();
    config.risk.take_profit = TakeProfitPolicy::Scaled {
        levels: vec![0.05, 0.10],
        amounts: vec![0.5, 0.4],
    };
    let text = message(&config);
    assert!(text.contains("amounts sum"), "unexpected message: {text}");
}

#[test]
fn inverted_backtest_window_is_rejected() {
    let mut config = AppConfig::default();
    config.backtest.start = Some("2024-09-02".to_string());
    config.backtest.end = Some("2024-09-01".to_string());
    assert!(message(&config).contains("backtest window"));

    // A one-day window is fine: the end day is inclusive.
    config.backtest.start = Some("2024-09-01".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn unparseable_window_date_is_rejected() {
    let mut config = AppConfig::default();
    config.backtest.start = Some("01/02/2024".to_string());
    assert!(message(&config).contains("YYYY-MM-DD"));
}

#[test]
fn sweep_axis_values_are_checked_up_front() {
    let mut config = AppConfig::default();
    config.sweep.entry_thresholds = vec![0.2, -0.1];
    assert!(message(&config).contains("entry_threshold"));
}

#[test]
fn unknown_toml_keys_are_a_parse_error() {
    let err = AppConfig::from_toml("[engine]\nstarting_cash = 5000.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_config_file_reports_the_path() {
    let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
    match err {
        ConfigError::Io { path, .. } => {
            assert!(path.to_string_lossy().contains("not/here.toml"));
        }
        other => panic!("expected Io error, got {other}"),
    }
}

#[test]
fn every_violation_is_fatal_not_recoverable() {
    // The engine treats configuration errors as the one non-recoverable
    // class; the config layer mirrors that by refusing to construct.
    let mut config = AppConfig::default();
    config.engine.fee_rate = 2.0;
    assert!(config.validate().is_err());
    assert!(AppConfig::from_toml("[engine]\nfee_rate = 2.0\n").is_err());
}
