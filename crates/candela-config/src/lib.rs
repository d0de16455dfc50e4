//! `candela-config`: TOML configuration loading for the candle aggregation
//! engine, in the same shape as this workspace's other `*-config` crates.

pub mod config;

pub use config::{
    CandelaConfig, ConfigError, LateEventConfig, PipelineConfig, StoreConfig, SymbolsConfig,
    WaitStrategyKind,
};
