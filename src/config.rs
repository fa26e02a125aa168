use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Run-wide tunables. Every numeric field can be overridden through an
/// environment variable; malformed values fall back to the default.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Step budget per scenario.
    pub max_steps: usize,
    /// Whole-attempt initialization retries (spawn + handshake + discovery).
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub default_tool_timeout: Duration,
    /// Chrome DevTools operations are empirically slower and get a longer
    /// per-call budget.
    pub slow_provider_timeout: Duration,
    /// Settle delay applied after navigation/click/press actions.
    pub settle_delay: Duration,
    pub vibium_warmup_delay: Duration,
    pub vercel_stabilization_delay: Duration,
    pub target_base_url: String,
    pub results_file: PathBuf,
    pub report_file: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
            default_tool_timeout: Duration::from_millis(5000),
            slow_provider_timeout: Duration::from_millis(10_000),
            settle_delay: Duration::from_millis(1000),
            vibium_warmup_delay: Duration::from_millis(2000),
            vercel_stabilization_delay: Duration::from_millis(5000),
            target_base_url: "http://localhost:3001".into(),
            results_file: "results.csv".into(),
            report_file: "LAST_RUN_SUMMARY.md".into(),
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_steps: env_usize("MAX_STEPS", defaults.max_steps),
            max_retries: env_u32("MAX_RETRIES", defaults.max_retries),
            retry_delay: env_millis("RETRY_DELAY_MS", defaults.retry_delay),
            default_tool_timeout: env_millis(
                "DEFAULT_TOOL_TIMEOUT_MS",
                defaults.default_tool_timeout,
            ),
            slow_provider_timeout: env_millis(
                "CHROME_DEVTOOLS_TIMEOUT_MS",
                defaults.slow_provider_timeout,
            ),
            settle_delay: env_millis("CHROME_DEVTOOLS_SETTLE_DELAY_MS", defaults.settle_delay),
            vibium_warmup_delay: env_millis(
                "VIBIUM_WARMUP_DELAY_MS",
                defaults.vibium_warmup_delay,
            ),
            vercel_stabilization_delay: env_millis(
                "VERCEL_STABILIZATION_DELAY_MS",
                defaults.vercel_stabilization_delay,
            ),
            target_base_url: env::var("TARGET_BASE_URL")
                .unwrap_or(defaults.target_base_url),
            results_file: env::var("RESULTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_file),
            report_file: env::var("REPORT_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_file),
        }
    }

    /// Warm-up delay applied before a session's first navigation. Some
    /// providers need time after spawn before their browser accepts commands.
    pub fn warmup_delay_for(&self, provider_label: &str) -> Option<Duration> {
        let label = provider_label.to_lowercase();
        if label.contains("vibium") {
            Some(self.vibium_warmup_delay)
        } else if label.contains("vercel") || label.contains("agent") {
            Some(self.vercel_stabilization_delay)
        } else {
            None
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {key}: {raw}");
            None
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env_u64(key).map(|v| v as usize).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_u64(key).map(|v| v as u32).unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env_u64(key).map(Duration::from_millis).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BenchConfig::default();
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(2000));
        assert_eq!(config.default_tool_timeout, Duration::from_millis(5000));
        assert_eq!(config.slow_provider_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn env_overrides_apply_and_malformed_values_fall_back() {
        env::set_var("MAX_STEPS", "7");
        env::set_var("RETRY_DELAY_MS", "not-a-number");
        let config = BenchConfig::from_env();
        env::remove_var("MAX_STEPS");
        env::remove_var("RETRY_DELAY_MS");

        assert_eq!(config.max_steps, 7);
        assert_eq!(config.retry_delay, Duration::from_millis(2000));
    }

    #[test]
    fn warmup_delay_depends_on_provider_label() {
        let config = BenchConfig::default();
        assert_eq!(
            config.warmup_delay_for("Vibium"),
            Some(config.vibium_warmup_delay)
        );
        assert_eq!(
            config.warmup_delay_for("Vercel-Agent"),
            Some(config.vercel_stabilization_delay)
        );
        assert_eq!(config.warmup_delay_for("MCP-Playwright"), None);
    }
}
