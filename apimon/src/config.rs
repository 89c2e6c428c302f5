//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to unprefixed legacy variable names, plus the monitor's own settings.

use std::time::Duration;

/// Get an environment variable with fallback to a legacy name
///
/// If the new variable name is set, returns its value.
/// If only the legacy variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use apimon::config::get_env_with_fallback;
///
/// let port = get_env_with_fallback("APIMON_PORT", "PORT");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` when neither variable is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// プローブ用のオペレーターアカウント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAccount {
    /// ユーザー名
    pub username: String,
    /// パスワード
    pub password: String,
}

/// ヘルスモニター設定
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// 監視対象サービスのベースURL
    pub target_base_url: String,
    /// エンドポイントカタログ（YAML）のパス。未設定なら組み込みカタログ
    pub registry_path: Option<String>,
    /// プローブ周期
    pub probe_interval: Duration,
    /// 1プローブのタイムアウト
    pub probe_timeout: Duration,
    /// 1サイクル内の同時プローブ数
    pub probe_concurrency: usize,
    /// ヘルスチェック結果の保持日数
    pub health_retention_days: i64,
    /// エラーログの保持日数
    pub error_retention_days: i64,
    /// recentFailures / recentErrors の件数
    pub recent_limit: usize,
    /// 保持期間削除を実行する時刻（ローカル時）
    pub retention_hour: u32,
    /// 日次エラーレポートを送る時刻（ローカル時）
    pub report_hour: u32,
    /// ログインAPIのパス
    pub login_path: String,
    /// プローブ用アカウント
    pub probe_account: Option<ProbeAccount>,
    /// 日次レポートのWebhook URL
    pub report_webhook_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_base_url: "http://127.0.0.1:3000".to_string(),
            registry_path: None,
            probe_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
            probe_concurrency: 4,
            health_retention_days: 7,
            error_retention_days: 30,
            recent_limit: 10,
            retention_hour: 3,
            report_hour: 9,
            login_path: "/api/auth/login".to_string(),
            probe_account: None,
            report_webhook_url: None,
        }
    }
}

impl MonitorConfig {
    /// Load monitor configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let interval_secs = get_env_with_fallback_parse(
            "APIMON_PROBE_INTERVAL_SECS",
            "HEALTH_CHECK_INTERVAL",
            defaults.probe_interval.as_secs(),
        );
        let timeout_secs = get_env_with_fallback_parse(
            "APIMON_PROBE_TIMEOUT_SECS",
            "HEALTH_CHECK_TIMEOUT",
            defaults.probe_timeout.as_secs(),
        );

        let username = get_env_with_fallback("APIMON_PROBE_USERNAME", "PROBE_USERNAME");
        let password = get_env_with_fallback("APIMON_PROBE_PASSWORD", "PROBE_PASSWORD");
        let probe_account = match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(ProbeAccount {
                username,
                password,
            }),
            (Some(_), None) => {
                tracing::warn!("APIMON_PROBE_USERNAME is set without APIMON_PROBE_PASSWORD");
                None
            }
            _ => None,
        };

        Self {
            target_base_url: get_env_with_fallback_or(
                "APIMON_TARGET_BASE_URL",
                "TARGET_BASE_URL",
                &defaults.target_base_url,
            ),
            registry_path: get_env_with_fallback("APIMON_REGISTRY_PATH", "REGISTRY_PATH"),
            probe_interval: Duration::from_secs(interval_secs.max(1)),
            probe_timeout: Duration::from_secs(timeout_secs.max(1)),
            probe_concurrency: get_env_with_fallback_parse(
                "APIMON_PROBE_CONCURRENCY",
                "PROBE_CONCURRENCY",
                defaults.probe_concurrency,
            )
            .max(1),
            health_retention_days: get_env_with_fallback_parse(
                "APIMON_HEALTH_RETENTION_DAYS",
                "HEALTH_CHECK_RETENTION_DAYS",
                defaults.health_retention_days,
            ),
            error_retention_days: get_env_with_fallback_parse(
                "APIMON_ERROR_RETENTION_DAYS",
                "ERROR_LOG_RETENTION_DAYS",
                defaults.error_retention_days,
            ),
            recent_limit: get_env_with_fallback_parse(
                "APIMON_RECENT_LIMIT",
                "RECENT_LIMIT",
                defaults.recent_limit,
            ),
            retention_hour: get_env_with_fallback_parse(
                "APIMON_RETENTION_HOUR",
                "RETENTION_HOUR",
                defaults.retention_hour,
            )
            .min(23),
            report_hour: get_env_with_fallback_parse(
                "APIMON_REPORT_HOUR",
                "REPORT_HOUR",
                defaults.report_hour,
            )
            .min(23),
            login_path: get_env_with_fallback_or(
                "APIMON_LOGIN_PATH",
                "LOGIN_PATH",
                &defaults.login_path,
            ),
            probe_account,
            report_webhook_url: get_env_with_fallback(
                "APIMON_REPORT_WEBHOOK_URL",
                "REPORT_WEBHOOK_URL",
            )
            .filter(|url| !url.trim().is_empty()),
        }
    }
}

/// データベースURLを解決する
///
/// `APIMON_DATABASE_URL`（旧: `DATABASE_URL`）が未設定なら `sqlite:~/.apimon/apimon.db`。
pub fn database_url() -> Result<String, crate::common::error::CommonError> {
    if let Some(url) = get_env_with_fallback("APIMON_DATABASE_URL", "DATABASE_URL") {
        return Ok(url);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| {
            crate::common::error::CommonError::Config(
                "Failed to resolve home directory for the default database path".to_string(),
            )
        })?;
    Ok(format!("sqlite:{}/.apimon/apimon.db", home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MONITOR_VARS: &[&str] = &[
        "APIMON_PROBE_INTERVAL_SECS",
        "HEALTH_CHECK_INTERVAL",
        "APIMON_PROBE_TIMEOUT_SECS",
        "APIMON_HEALTH_RETENTION_DAYS",
        "APIMON_ERROR_RETENTION_DAYS",
        "APIMON_RECENT_LIMIT",
        "APIMON_PROBE_USERNAME",
        "APIMON_PROBE_PASSWORD",
        "APIMON_PROBE_CONCURRENCY",
        "APIMON_REPORT_WEBHOOK_URL",
    ];

    fn clear_monitor_vars() {
        for name in MONITOR_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_new_name() {
        std::env::set_var("TEST_NEW_VAR", "new_value");
        std::env::remove_var("TEST_OLD_VAR");

        let result = get_env_with_fallback("TEST_NEW_VAR", "TEST_OLD_VAR");
        assert_eq!(result, Some("new_value".to_string()));

        std::env::remove_var("TEST_NEW_VAR");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_old_name() {
        std::env::remove_var("TEST_NEW_VAR2");
        std::env::set_var("TEST_OLD_VAR2", "old_value");

        let result = get_env_with_fallback("TEST_NEW_VAR2", "TEST_OLD_VAR2");
        assert_eq!(result, Some("old_value".to_string()));

        std::env::remove_var("TEST_OLD_VAR2");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_parse_invalid_uses_default() {
        std::env::set_var("TEST_NEW_VAR3", "not-a-number");
        std::env::remove_var("TEST_OLD_VAR3");

        let result: u64 = get_env_with_fallback_parse("TEST_NEW_VAR3", "TEST_OLD_VAR3", 42);
        assert_eq!(result, 42);

        std::env::remove_var("TEST_NEW_VAR3");
    }

    #[test]
    #[serial]
    fn test_monitor_config_defaults() {
        clear_monitor_vars();
        let config = MonitorConfig::from_env();

        assert_eq!(config.probe_interval, Duration::from_secs(300));
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.health_retention_days, 7);
        assert_eq!(config.error_retention_days, 30);
        assert_eq!(config.recent_limit, 10);
        assert!(config.probe_account.is_none());
    }

    #[test]
    #[serial]
    fn test_monitor_config_from_env() {
        clear_monitor_vars();
        std::env::set_var("APIMON_PROBE_INTERVAL_SECS", "60");
        std::env::set_var("APIMON_PROBE_TIMEOUT_SECS", "3");
        std::env::set_var("APIMON_HEALTH_RETENTION_DAYS", "14");
        std::env::set_var("APIMON_PROBE_USERNAME", "operator");
        std::env::set_var("APIMON_PROBE_PASSWORD", "secret");

        let config = MonitorConfig::from_env();
        assert_eq!(config.probe_interval, Duration::from_secs(60));
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.health_retention_days, 14);
        assert_eq!(
            config.probe_account,
            Some(ProbeAccount {
                username: "operator".to_string(),
                password: "secret".to_string(),
            })
        );

        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_monitor_config_legacy_interval_name() {
        clear_monitor_vars();
        std::env::set_var("HEALTH_CHECK_INTERVAL", "120");

        let config = MonitorConfig::from_env();
        assert_eq!(config.probe_interval, Duration::from_secs(120));

        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_monitor_config_username_without_password() {
        clear_monitor_vars();
        std::env::set_var("APIMON_PROBE_USERNAME", "operator");

        let config = MonitorConfig::from_env();
        assert!(config.probe_account.is_none());

        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_database_url_prefers_env() {
        std::env::set_var("APIMON_DATABASE_URL", "sqlite::memory:");
        assert_eq!(database_url().unwrap(), "sqlite::memory:");
        std::env::remove_var("APIMON_DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_database_url_defaults_under_home() {
        std::env::remove_var("APIMON_DATABASE_URL");
        std::env::remove_var("DATABASE_URL");
        let previous = std::env::var("HOME").ok();
        std::env::set_var("HOME", "/tmp/apimon-home");
        let url = database_url();
        match previous {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
        assert_eq!(url.unwrap(), "sqlite:/tmp/apimon-home/.apimon/apimon.db");
    }
}
