use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BenchConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Usable capacity of every queue under test.
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    /// Push/pop pairs per timed run.
    #[serde(default = "defaults::iterations")]
    pub iterations: usize,
    /// Untimed runs before the measured ones.
    #[serde(default = "defaults::warmup_runs")]
    pub warmup_runs: usize,
    #[serde(default = "defaults::runs")]
    pub runs: usize,
    #[serde(default = "defaults::variants")]
    pub variants: Vec<QueueVariant>,
    #[serde(default = "defaults::modes")]
    pub modes: Vec<RunMode>,
    /// Where to write the JSON report; nothing is written when absent.
    #[serde(default)]
    pub report_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueVariant {
    Fixed,
    Spsc,
    Blocking,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    SingleThread,
    Spsc,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    use super::{QueueVariant, RunMode};

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn capacity() -> usize {
        1024
    }

    pub fn iterations() -> usize {
        10_000_000
    }

    pub fn warmup_runs() -> usize {
        1
    }

    pub fn runs() -> usize {
        5
    }

    pub fn variants() -> Vec<QueueVariant> {
        vec![QueueVariant::Fixed, QueueVariant::Spsc, QueueVariant::Blocking]
    }

    pub fn modes() -> Vec<RunMode> {
        vec![RunMode::SingleThread, RunMode::Spsc]
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            capacity: defaults::capacity(),
            iterations: defaults::iterations(),
            warmup_runs: defaults::warmup_runs(),
            runs: defaults::runs(),
            variants: defaults::variants(),
            modes: defaults::modes(),
            report_path: None,
        }
    }
}

impl BenchConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let bench_config: BenchConfig = toml::from_str(s)?;
        bench_config.validate()?;
        Ok(bench_config)
    }

    /// Rejects settings no queue or run could honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(ConfigError::Invalid("iterations must be at least 1".into()));
        }
        if self.runs == 0 {
            return Err(ConfigError::Invalid("runs must be at least 1".into()));
        }
        Ok(())
    }
}
