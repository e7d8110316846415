//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment. Layers, lowest to highest:
//! 1. compiled-in defaults (every section is `#[serde(default)]`, so zero config works)
//! 2. `RDUMP_*` environment variables, nested with `__`
//!    (`RDUMP_STORE__URI`, `RDUMP_RUNTIME__WRITER_PARALLELISM`, ...)
//! 3. an optional TOML file, which wins on conflicts

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::info;

use crate::backends::StoreConfig;
use crate::extract::DEFAULT_LINK_PATTERN;

/// 📦 One struct to rule them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// 🧵 The pipeline knobs. The defaults are the numbers this loader has always run with.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📦 Records per batch. One batch = one store insert.
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
    /// 🚪 How many full batches may wait for a writer before readers block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 📖 Files read at the same time.
    #[serde(default = "default_reader_parallelism")]
    pub reader_parallelism: usize,
    /// 🚰 Writer workers, each with its own session.
    #[serde(default = "default_writer_parallelism")]
    pub writer_parallelism: usize,
    /// ⏳ Record count the ETA is measured against.
    #[serde(default = "default_target_total_records")]
    pub target_total_records: u64,
}

fn default_batch_capacity() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    100
}

fn default_reader_parallelism() -> usize {
    4
}

fn default_writer_parallelism() -> usize {
    10
}

fn default_target_total_records() -> u64 {
    24_000_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_capacity: default_batch_capacity(),
            queue_capacity: default_queue_capacity(),
            reader_parallelism: default_reader_parallelism(),
            writer_parallelism: default_writer_parallelism(),
            target_total_records: default_target_total_records(),
        }
    }
}

impl RuntimeConfig {
    /// 🚫 Zero of anything is a pipeline that never moves. Refuse it up front,
    /// along with more readers than a semaphore can hand out permits for.
    pub fn validate(&self) -> anyhow::Result<()> {
        let knobs = [
            ("batch_capacity", self.batch_capacity),
            ("queue_capacity", self.queue_capacity),
            ("reader_parallelism", self.reader_parallelism),
            ("writer_parallelism", self.writer_parallelism),
        ];
        for (name, value) in knobs {
            anyhow::ensure!(
                value > 0,
                "💀 runtime.{name} is 0. A pipeline with zero {name} is a very elaborate no-op."
            );
        }
        anyhow::ensure!(
            self.reader_parallelism <= Semaphore::MAX_PERMITS,
            "💀 runtime.reader_parallelism is {}, past the {} readers a semaphore can admit.",
            self.reader_parallelism,
            Semaphore::MAX_PERMITS
        );
        Ok(())
    }
}

/// 🔍 How destination keys get pulled out of each line.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    /// Regex with at least one capture group; group 1 is the destination key.
    #[serde(default = "default_link_pattern")]
    pub link_pattern: String,
}

fn default_link_pattern() -> String {
    DEFAULT_LINK_PATTERN.to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            link_pattern: default_link_pattern(),
        }
    }
}

/// 🚀 Load the config: env vars always, plus the TOML file if one is given.
///
/// 💀 Returns an error if the result doesn't deserialize. The context says
/// which sources were involved, so you know where to go looking.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("RDUMP_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (RDUMP_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (RDUMP_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DocumentFormat;
    use std::fs;

    fn write_test_config(dir: &Path, contents: &str) -> std::path::PathBuf {
        let temp_path = dir.join("rdump.toml");
        // 🧪 Figment wants TOML from disk, like it's method acting.
        fs::write(&temp_path, contents)
            .expect("💀 Failed to write test config. The filesystem said 'new phone who dis'.");
        temp_path
    }

    #[test]
    fn the_one_where_an_empty_file_still_gets_the_classic_numbers() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let config_path = write_test_config(dir.path(), "");

        let app_config: AppConfig = Figment::new()
            .merge(Toml::file(config_path.as_path()))
            .extract()
            .expect("💀 Defaults should fill every hole.");

        assert_eq!(app_config.runtime.batch_capacity, 500);
        assert_eq!(app_config.runtime.queue_capacity, 100);
        assert_eq!(app_config.runtime.reader_parallelism, 4);
        assert_eq!(app_config.runtime.writer_parallelism, 10);
        assert_eq!(app_config.runtime.target_total_records, 24_000_000);
        assert_eq!(app_config.extractor.link_pattern, DEFAULT_LINK_PATTERN);
        assert_eq!(app_config.store.document_format, DocumentFormat::Xml);
    }

    #[test]
    fn the_one_where_the_toml_file_turns_the_knobs() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let config_path = write_test_config(
            dir.path(),
            r#"
            [store]
            uri = "memory://"
            document_format = "json"
            request_timeout_secs = 5

            [runtime]
            batch_capacity = 50
            queue_capacity = 8
            reader_parallelism = 6
            writer_parallelism = 3

            [extractor]
            link_pattern = 'id="([^"]+)"'
            "#,
        );

        let app_config = load_config(Some(config_path.as_path()))
            .expect("💀 A perfectly reasonable file should parse.");

        assert_eq!(app_config.store.uri, "memory://");
        assert_eq!(app_config.store.document_format, DocumentFormat::Json);
        assert_eq!(app_config.store.request_timeout_secs, 5);
        assert_eq!(app_config.store.connect_timeout_secs, 10);
        assert_eq!(app_config.runtime.batch_capacity, 50);
        assert_eq!(app_config.runtime.queue_capacity, 8);
        assert_eq!(app_config.runtime.reader_parallelism, 6);
        assert_eq!(app_config.runtime.writer_parallelism, 3);
        assert_eq!(app_config.extractor.link_pattern, r#"id="([^"]+)""#);
    }

    #[test]
    fn the_one_where_env_vars_reach_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RDUMP_STORE__URI", "memory://");
            jail.set_env("RDUMP_RUNTIME__READER_PARALLELISM", "7");
            jail.create_file("rdump.toml", "[runtime]\nreader_parallelism = 2\n")?;

            let from_env = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(from_env.store.uri, "memory://");
            assert_eq!(from_env.runtime.reader_parallelism, 7);

            // -- 📄 the file outranks the environment
            let with_file = load_config(Some(Path::new("rdump.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(with_file.runtime.reader_parallelism, 2);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_zero_writers_is_refused() {
        let runtime = RuntimeConfig {
            writer_parallelism: 0,
            ..RuntimeConfig::default()
        };
        let err = runtime.validate().expect_err("💀 zero writers should not validate");
        assert!(err.to_string().contains("writer_parallelism"));
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn the_one_where_a_reader_count_no_semaphore_can_hold_is_refused() {
        let runtime = RuntimeConfig {
            reader_parallelism: usize::MAX,
            ..RuntimeConfig::default()
        };
        let err = runtime
            .validate()
            .expect_err("💀 usize::MAX readers should not validate");
        assert!(err.to_string().contains("reader_parallelism"));

        let at_the_limit = RuntimeConfig {
            reader_parallelism: Semaphore::MAX_PERMITS,
            ..RuntimeConfig::default()
        };
        assert!(at_the_limit.validate().is_ok());
    }
}
