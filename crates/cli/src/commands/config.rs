use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quote_pricing_core::config::{FallbackMode, LoadOptions, PricingConfig};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match PricingConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let sources = SourceResolver::detect();
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    let fallback = match config.rates.fallback {
        FallbackMode::Exact => "exact",
        FallbackMode::PreviousAvailable => "previous_available",
    };
    lines.push(render_line(
        "rates.fallback",
        fallback,
        sources.resolve("rates.fallback", &["QUOTE_PRICING_RATES_FALLBACK"]),
    ));
    lines.push(render_line(
        "rates.max_lookback_days",
        &config.rates.max_lookback_days.to_string(),
        sources.resolve("rates.max_lookback_days", &["QUOTE_PRICING_RATES_MAX_LOOKBACK_DAYS"]),
    ));
    let table_path = config
        .rates
        .table_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "rates.table_path",
        &table_path,
        sources.resolve("rates.table_path", &["QUOTE_PRICING_RATES_TABLE_PATH"]),
    ));

    lines.push(render_line(
        "output.precision",
        &config.output.precision.to_string(),
        sources.resolve("output.precision", &["QUOTE_PRICING_OUTPUT_PRECISION"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        sources.resolve(
            "logging.level",
            &["QUOTE_PRICING_LOGGING_LEVEL", "QUOTE_PRICING_LOG_LEVEL"],
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_ascii_lowercase(),
        sources.resolve(
            "logging.format",
            &["QUOTE_PRICING_LOGGING_FORMAT", "QUOTE_PRICING_LOG_FORMAT"],
        ),
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

struct SourceResolver {
    path: Option<PathBuf>,
    document: Option<Value>,
}

impl SourceResolver {
    fn detect() -> Self {
        let path = [PathBuf::from("quote-pricing.toml"), PathBuf::from("config/quote-pricing.toml")]
            .into_iter()
            .find(|path| path.exists());
        let document = path.as_deref().and_then(load_document);
        Self { path, document }
    }

    fn resolve(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(document) = &self.document {
            if contains_path(document, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_document(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
