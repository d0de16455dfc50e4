use serde::Deserialize;
use std::path::Path;

/// Mirrors `candela_pipeline::MAX_CONSUMERS`. Duplicated rather than
/// depended on, since `candela-config` stays free of a `candela-pipeline`
/// dependency (see [`WaitStrategyKind`]).
pub const MAX_PIPELINE_CONSUMERS: usize = 4;

#[derive(Deserialize, Debug)]
pub struct CandelaConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub late_event: LateEventConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub symbols: SymbolsConfig,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct PipelineConfig {
    pub buffer_size: usize,
    /// One of `"spin"`, `"yield"`, `"sleep_ms:<n>"`, `"block"`.
    pub wait_strategy: String,
    /// Number of consumer threads `EventPipeline::start` spawns, each
    /// draining its own `sequence % consumers` partition of the ring.
    pub consumers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: defaults::buffer_size(),
            wait_strategy: defaults::wait_strategy(),
            consumers: defaults::consumers(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct LateEventConfig {
    pub tolerance_ms: i64,
}

impl Default for LateEventConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: defaults::tolerance_ms(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct StoreConfig {
    pub path: String,
    #[serde(default = "defaults::max_entries")]
    pub max_entries: u64,
    /// Human-facing sizing hints only: the on-disk layout is fixed-size per
    /// slot, so these do not change byte layout, only a startup log line.
    #[serde(default = "defaults::avg_key_size")]
    pub avg_key_size: u64,
    #[serde(default = "defaults::avg_value_size")]
    pub avg_value_size: u64,
}

#[derive(Deserialize, Debug, Default)]
pub struct SymbolsConfig {
    /// Empty means no whitelist: every valid symbol is accepted.
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// Parsed form of [`PipelineConfig::wait_strategy`]. Kept local to this
/// crate so `candela-config` does not need to depend on `candela-pipeline`;
/// the engine binary maps this to `candela_pipeline::WaitStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategyKind {
    Spin,
    Yield,
    SleepMs(u64),
    Block,
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

    #[error("pipeline.buffer_size ({0}) must be a power of two")]
    InvalidBufferSize(usize),

    #[error("pipeline.wait_strategy '{0}' is not one of spin|yield|sleep_ms:<n>|block")]
    InvalidWaitStrategy(String),

    #[error("pipeline.consumers ({0}) must be between 1 and {MAX_PIPELINE_CONSUMERS}")]
    InvalidConsumers(usize),
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn buffer_size() -> usize {
        1 << 16
    }

    pub fn wait_strategy() -> String {
        "yield".into()
    }

    pub fn tolerance_ms() -> i64 {
        5_000
    }

    pub fn max_entries() -> u64 {
        1 << 20
    }

    pub fn avg_key_size() -> u64 {
        32
    }

    pub fn avg_value_size() -> u64 {
        48
    }

    pub fn consumers() -> usize {
        1
    }
}

impl CandelaConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: CandelaConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.pipeline.buffer_size.is_power_of_two() {
            return Err(ConfigError::InvalidBufferSize(self.pipeline.buffer_size));
        }
        if self.pipeline.consumers == 0 || self.pipeline.consumers > MAX_PIPELINE_CONSUMERS {
            return Err(ConfigError::InvalidConsumers(self.pipeline.consumers));
        }
        self.pipeline.wait_strategy_kind()?;
        Ok(())
    }
}

impl PipelineConfig {
    pub fn wait_strategy_kind(&self) -> Result<WaitStrategyKind, ConfigError> {
        let s = self.wait_strategy.as_str();
        if s == "spin" {
            return Ok(WaitStrategyKind::Spin);
        }
        if s == "yield" {
            return Ok(WaitStrategyKind::Yield);
        }
        if s == "block" {
            return Ok(WaitStrategyKind::Block);
        }
        if let Some(ms) = s.strip_prefix("sleep_ms:") {
            if let Ok(n) = ms.parse::<u64>() {
                return Ok(WaitStrategyKind::SleepMs(n));
            }
        }
        Err(ConfigError::InvalidWaitStrategy(s.to_string()))
    }
}
