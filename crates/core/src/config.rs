use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::currency::RateFallback;

const MAX_LOOKBACK_DAYS: u32 = 31;
const MAX_PRECISION: u32 = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct PricingConfig {
    pub rates: RatesConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatesConfig {
    pub fallback: FallbackMode,
    pub max_lookback_days: u32,
    pub table_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputConfig {
    pub precision: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    Exact,
    PreviousAvailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub rates_table_path: Option<PathBuf>,
    pub output_precision: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rates: RatesConfig {
                fallback: FallbackMode::PreviousAvailable,
                max_lookback_days: 7,
                table_path: None,
            },
            output: OutputConfig { precision: 2 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl RatesConfig {
    pub fn rate_fallback(&self) -> RateFallback {
        match self.fallback {
            FallbackMode::Exact => RateFallback::Exact,
            FallbackMode::PreviousAvailable => {
                RateFallback::PreviousAvailable { max_lookback_days: self.max_lookback_days }
            }
        }
    }
}

impl std::str::FromStr for FallbackMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "previous_available" => Ok(Self::PreviousAvailable),
            other => Err(ConfigError::Validation(format!(
                "unsupported rate fallback `{other}` (expected exact|previous_available)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PricingConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("quote-pricing.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(rates) = patch.rates {
            if let Some(fallback) = rates.fallback {
                self.rates.fallback = fallback;
            }
            if let Some(max_lookback_days) = rates.max_lookback_days {
                self.rates.max_lookback_days = max_lookback_days;
            }
            if let Some(table_path) = rates.table_path {
                self.rates.table_path = Some(table_path);
            }
        }

        if let Some(output) = patch.output {
            if let Some(precision) = output.precision {
                self.output.precision = precision;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUOTE_PRICING_RATES_FALLBACK") {
            self.rates.fallback = value.parse()?;
        }
        if let Some(value) = read_env("QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS") {
            self.rates.max_lookback_days =
                parse_u32("QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read_env("QUOTE_PRICING_RATES_TABLE_PATH") {
            self.rates.table_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("QUOTE_PRICING_OUTPUT_PRECISION") {
            self.output.precision = parse_u32("QUOTE_PRICING_OUTPUT_PRECISION", &value)?;
        }

        let log_level = read_env("QUOTE_PRICING_LOGGING_LEVEL")
            .or_else(|| read_env("QUOTE_PRICING_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("QUOTE_PRICING_LOGGING_FORMAT")
            .or_else(|| read_env("QUOTE_PRICING_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(table_path) = overrides.rates_table_path {
            self.rates.table_path = Some(table_path);
        }
        if let Some(precision) = overrides.output_precision {
            self.output.precision = precision;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rates(&self.rates)?;
        validate_output(&self.output)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("quote-pricing.toml"), PathBuf::from("config/quote-pricing.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_rates(rates: &RatesConfig) -> Result<(), ConfigError> {
    if rates.max_lookback_days == 0 || rates.max_lookback_days > MAX_LOOKBACK_DAYS {
        return Err(ConfigError::Validation(format!(
            "rates.max_lookback_days must be in range 1..={MAX_LOOKBACK_DAYS}"
        )));
    }

    if let Some(path) = &rates.table_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "rates.table_path must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_output(output: &OutputConfig) -> Result<(), ConfigError> {
    if output.precision > MAX_PRECISION {
        return Err(ConfigError::Validation(format!(
            "output.precision must be in range 0..={MAX_PRECISION}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    rates: Option<RatesPatch>,
    output: Option<OutputPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RatesPatch {
    fallback: Option<FallbackMode>,
    max_lookback_days: Option<u32>,
    table_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputPatch {
    precision: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{ConfigError, ConfigOverrides, FallbackMode, LoadOptions, LogFormat, PricingConfig};
    use crate::pricing::currency::RateFallback;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = PricingConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.output.precision == 2, "default precision should be 2")?;
        ensure(
            config.rates.rate_fallback()
                == RateFallback::PreviousAvailable { max_lookback_days: 7 },
            "default fallback should look back one week",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RATES_TABLE", "/var/lib/rates/ecb.json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("quote-pricing.toml");
            fs::write(
                &path,
                r#"
[rates]
fallback = "exact"
table_path = "${TEST_RATES_TABLE}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = PricingConfig::load(LoadOptions {
                config_path: Some(path),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.rates.table_path == Some(PathBuf::from("/var/lib/rates/ecb.json")),
                "rates table path should be interpolated from environment",
            )?;
            ensure(
                config.rates.rate_fallback() == RateFallback::Exact,
                "fallback should be read from file",
            )
        })();

        clear_vars(&["TEST_RATES_TABLE"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTE_PRICING_LOG_LEVEL", "warn");
        env::set_var("QUOTE_PRICING_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = PricingConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["QUOTE_PRICING_LOG_LEVEL", "QUOTE_PRICING_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTE_PRICING_OUTPUT_PRECISION", "4");
        env::set_var("QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS", "3");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("quote-pricing.toml");
            fs::write(
                &path,
                r#"
[rates]
max_lookback_days = 14

[output]
precision = 3

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = PricingConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    output_precision: Some(1),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.output.precision == 1, "override precision should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.rates.max_lookback_days == 3,
                "env lookback should win over file and defaults",
            )?;
            ensure(
                config.rates.fallback == FallbackMode::PreviousAvailable,
                "untouched fallback keeps its default",
            )
        })();

        clear_vars(&["QUOTE_PRICING_OUTPUT_PRECISION", "QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS", "90");

        let result = (|| -> Result<(), String> {
            let error = match PricingConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("rates.max_lookback_days")
            );
            ensure(has_message, "validation failure should mention rates.max_lookback_days")
        })();

        clear_vars(&["QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUOTE_PRICING_OUTPUT_PRECISION", "two");

        let result = match PricingConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. })
                if key == "QUOTE_PRICING_OUTPUT_PRECISION" =>
            {
                Ok(())
            }
            other => Err(format!("expected invalid env override, got {other:?}")),
        };

        clear_vars(&["QUOTE_PRICING_OUTPUT_PRECISION"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = PricingConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "absent required file should fail",
        )
    }
}
