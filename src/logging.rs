// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization.
//!
//! Configuration is layered from:
//! 1. The `PS_LOG` environment variable (highest priority).
//! 2. An optional TOML file pointed to by `PS_LOGGING_CONFIG_PATH`.
//! 3. Built-in defaults (`info`, with chatty dependencies capped).
//!
//! Filters are comma-separated `target=level` pairs, same syntax as
//! `tracing_subscriber::EnvFilter`.

use std::collections::HashMap;
use std::sync::Once;

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// ENV used to override the filter directly
const FILTER_ENV: &str = "PS_LOG";

/// ENV used to set the path to the logging configuration file
const CONFIG_PATH_ENV: &str = "PS_LOGGING_CONFIG_PATH";

/// Once instance to ensure the logger is only initialized once
static INIT: Once = Once::new();

#[derive(Serialize, Deserialize, Debug)]
struct LoggingConfig {
    log_level: String,
    log_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: "info".to_string(),
            log_filters: HashMap::from([("tokio_util".to_string(), "error".to_string())]),
        }
    }
}

impl LoggingConfig {
    fn from_settings() -> Self {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }
        figment.extract().unwrap_or_default()
    }

    fn filter(&self) -> EnvFilter {
        if let Ok(directives) = std::env::var(FILTER_ENV) {
            return EnvFilter::new(directives);
        }
        let mut directives = vec![self.log_level.clone()];
        directives.extend(
            self.log_filters
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        EnvFilter::new(directives.join(","))
    }
}

/// Initialize the process-wide subscriber. Safe to call from every entry
/// point; only the first call installs anything.
pub fn init() {
    INIT.call_once(|| {
        let config = LoggingConfig::from_settings();
        tracing_subscriber::fmt()
            .with_env_filter(config.filter())
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_includes_level_and_targets() {
        let config = LoggingConfig::default();
        let rendered = config.filter().to_string();
        assert!(rendered.contains("info"));
        assert!(rendered.contains("tokio_util=error"));
    }
}
