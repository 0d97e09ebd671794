//! Tests for config module.

use super::*;
use rust_decimal::Decimal;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

// ==================== Duration parsing tests ====================

#[test]
fn test_parse_duration_seconds() {
    let d = duration::parse_duration("30s").unwrap();
    assert_eq!(d, Duration::from_secs(30));
}

#[test]
fn test_parse_duration_minutes() {
    let d = duration::parse_duration("5m").unwrap();
    assert_eq!(d, Duration::from_secs(300));
}

#[test]
fn test_parse_duration_hours_and_days() {
    assert_eq!(duration::parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(duration::parse_duration("1d").unwrap(), Duration::from_secs(86400));
}

#[test]
fn test_parse_duration_milliseconds() {
    let d = duration::parse_duration("100ms").unwrap();
    assert_eq!(d, Duration::from_millis(100));
}

#[test]
fn test_parse_duration_empty() {
    let d = duration::parse_duration("").unwrap();
    assert_eq!(d, Duration::ZERO);
}

#[test]
fn test_parse_duration_invalid() {
    let result = duration::parse_duration("10x");
    assert!(result.unwrap_err().contains("unknown duration unit"));

    let result = duration::parse_duration("s");
    assert!(result.unwrap_err().contains("missing duration number"));
}

#[test]
fn test_parse_duration_fractional() {
    let d = duration::parse_duration("1.5s").unwrap();
    assert_eq!(d, Duration::from_millis(1500));
}

// ==================== YAML field loading tests ====================

/// Parse config from YAML string (for testing).
fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    Ok(config)
}

fn minimal_valid_yaml() -> String {
    r#"
app:
  name: spread-monitor
  env: development

symbols:
  - sol

venues:
  jupiter:
    tokens:
      SOL:
        mint: So11111111111111111111111111111111111111112
        decimals: 9
"#
    .to_string()
}

#[test]
fn test_load_app_fields() {
    let yaml = r#"
app:
  name: monitor
  env: production
  log_level: debug
"#;
    let cfg = from_yaml(yaml).unwrap();

    assert_eq!(cfg.app.name, "monitor");
    assert_eq!(cfg.app.env, "production");
    assert_eq!(cfg.app.log_level, Some("debug".to_string()));
}

#[test]
fn test_app_env_defaults_to_development() {
    let cfg = from_yaml("app:\n  name: monitor\n").unwrap();
    assert_eq!(cfg.app.env, "development");
    assert!(cfg.symbols.is_empty());
    assert!(cfg.notification.is_none());
    assert!(cfg.storage.is_none());
}

#[test]
fn test_load_monitor_fields() {
    let yaml = r#"
app:
  name: test

monitor:
  minimum_profit_threshold_percent: "0.75"
  trading_notional: "2500"
  venue_a_fee: "0.00075"
  venue_b_swap_fee: "0.0025"
  venue_b_network_fee: "0.00001"
"#;
    let cfg = from_yaml(yaml).unwrap();

    let evaluator = cfg.monitor.evaluator().unwrap();
    assert_eq!(evaluator.min_profit_percent(), Decimal::new(75, 2));
    assert_eq!(evaluator.notional(), Decimal::from(2500));

    let fees = cfg.monitor.fee_model().unwrap();
    assert_eq!(fees.venue_a_taker, Decimal::new(75, 5));
    assert_eq!(fees.venue_b_swap, Decimal::new(25, 4));
    assert_eq!(fees.venue_b_network, Decimal::new(1, 5));
}

#[test]
fn test_monitor_defaults() {
    let cfg = from_yaml("app:\n  name: test\n").unwrap();

    let evaluator = cfg.monitor.evaluator().unwrap();
    assert_eq!(evaluator.min_profit_percent(), Decimal::new(5, 1));
    assert_eq!(evaluator.notional(), Decimal::from(1000));
    assert_eq!(cfg.monitor.fee_model().unwrap(), crate::domain::FeeModel::default());
}

#[test]
fn test_load_venue_fields() {
    let yaml = r#"
app:
  name: test

venues:
  binance:
    ws_url: wss://testnet.binance.vision/ws
    quote_asset: USDT
    reconnect_delay: 3s
  jupiter:
    slippage_bps: 30
    poll_interval: 15s
    tokens:
      JUP:
        mint: JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN
        decimals: 6
"#;
    let cfg = from_yaml(yaml).unwrap();

    let binance = cfg.venues.binance.unwrap();
    assert_eq!(binance.ws_url.as_deref(), Some("wss://testnet.binance.vision/ws"));
    assert_eq!(binance.quote_asset.as_deref(), Some("USDT"));
    assert!(binance.rest_url.is_none());
    assert_eq!(binance.reconnect_delay, Duration::from_secs(3));

    let jupiter = cfg.venues.jupiter;
    assert_eq!(jupiter.slippage_bps, Some(30));
    assert_eq!(jupiter.poll_interval, Duration::from_secs(15));
    assert_eq!(jupiter.tokens["JUP"].decimals, 6);
    assert!(jupiter.supports("jup"));
    assert!(!jupiter.supports("SOL"));
}

#[test]
fn test_load_notification_fields() {
    let yaml = r#"
app:
  name: test

notification:
  telegram:
    enabled: true
    notify_opportunities: true
    notify_errors: false
    notify_overview: true
    overview_interval: 1h
"#;
    let cfg = from_yaml(yaml).unwrap();

    let tg = cfg.telegram().unwrap();
    assert!(tg.enabled);
    assert!(tg.notify_opportunities);
    assert!(!tg.notify_errors);
    assert!(tg.notify_overview);
    assert_eq!(tg.overview_interval, Duration::from_secs(3600));
}

#[test]
fn test_load_storage_fields() {
    let yaml = r#"
app:
  name: test

storage:
  enabled: true
  path: "data.db"
  dedup_window: 2m
"#;
    let cfg = from_yaml(yaml).unwrap();

    let storage = cfg.storage.unwrap();
    assert!(storage.enabled);
    assert_eq!(storage.path, Some("data.db".to_string()));
    assert_eq!(storage.dedup_window, Duration::from_secs(120));
}

#[test]
fn test_normalize_symbols() {
    let yaml = r#"
app:
  name: test

symbols: [sol, " ETH ", SOL, ""]
"#;
    let mut cfg = from_yaml(yaml).unwrap();
    cfg.normalize_symbols();

    assert_eq!(cfg.symbols, vec!["SOL", "ETH"]);
}

// ==================== Credentials loading tests ====================

#[test]
fn test_load_credentials_from_env() {
    let yaml = r#"
app:
  name: test

notification:
  telegram:
    enabled: true
"#;
    let mut cfg = from_yaml(yaml).unwrap();

    // Set env vars (unsafe because modifying env is not thread-safe)
    unsafe {
        env::set_var("TELEGRAM_BOT_TOKEN", "bot_token_789");
        env::set_var("TELEGRAM_CHAT_ID", "chat_id_012");
        env::set_var("TELEGRAM_ERROR_CHAT_ID", "error_chat_345");
    }

    cfg.load_credentials_from_env();

    let tg = cfg.telegram().unwrap();
    assert_eq!(tg.bot_token, "bot_token_789");
    assert_eq!(tg.chat_id, "chat_id_012");
    assert_eq!(tg.error_chat_id, "error_chat_345");

    // Cleanup
    unsafe {
        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("TELEGRAM_CHAT_ID");
        env::remove_var("TELEGRAM_ERROR_CHAT_ID");
    }
}

// ==================== Validation tests ====================

fn validation_error(cfg: &Config) -> String {
    match cfg.validate() {
        Err(ConfigError::Validation(msg)) => msg,
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_validate_empty_app_name() {
    let cfg = from_yaml("app:\n  name: \"\"\n").unwrap();
    assert!(validation_error(&cfg).contains("app.name is required"));
}

#[test]
fn test_validate_non_positive_notional() {
    let yaml = r#"
app:
  name: test
monitor:
  trading_notional: "0"
"#;
    let cfg = from_yaml(yaml).unwrap();
    assert!(validation_error(&cfg).contains("trading_notional must be positive"));
}

#[test]
fn test_validate_invalid_decimal() {
    let yaml = r#"
app:
  name: test
monitor:
  venue_a_fee: "ten bps"
"#;
    let cfg = from_yaml(yaml).unwrap();
    assert!(validation_error(&cfg).contains("monitor.venue_a_fee: invalid decimal"));
}

#[test]
fn test_validate_negative_fee() {
    let yaml = r#"
app:
  name: test
monitor:
  venue_b_swap_fee: "-0.003"
"#;
    let cfg = from_yaml(yaml).unwrap();
    assert!(validation_error(&cfg).starts_with("monitor:"));
}

#[test]
fn test_validate_symbol_without_mint() {
    let yaml = r#"
app:
  name: test
symbols: [BTC]
"#;
    let cfg = from_yaml(yaml).unwrap();
    assert!(validation_error(&cfg).contains("symbol BTC: no token mint"));
}

#[test]
fn test_validate_telegram_credentials_in_production() {
    let yaml = r#"
app:
  name: test
  env: production
notification:
  telegram:
    enabled: true
"#;
    let cfg = from_yaml(yaml).unwrap();
    assert!(validation_error(&cfg).contains("credentials not found"));
}

// ==================== File loading tests ====================

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(minimal_valid_yaml().as_bytes()).unwrap();

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();

    assert_eq!(cfg.app.name, "spread-monitor");
    assert_eq!(cfg.symbols, vec!["SOL"]);
    assert!(cfg.venues.jupiter.supports("SOL"));
}

#[test]
fn test_load_missing_file() {
    let result = Config::load("/nonexistent/config.yaml");
    assert!(matches!(result, Err(ConfigError::ReadFile(_))));
}

#[test]
fn test_load_invalid_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"app: [unclosed").unwrap();

    let result = Config::load(file.path().to_str().unwrap());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
