// 7.0 config.rs: all settings in one place. swap fees, interest model, decoder, server.
// 7.1 values come from defaults, then an optional file, then STOICH__ env vars.

use crate::lending::InterestModel;
use crate::pricing::FeeSchedule;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "STOICH";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingDefaults {
    pub interest_model: InterestModel,
}

/** 7.2: the decoder is an external binary called with two hex arguments */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub binary: PathBuf,
    pub timeout_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("./stoichiometric-decoder"),
            timeout_ms: 5_000,
        }
    }
}

impl DecoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    // comma separated, none allows any origin
    pub cors_allowed_origin: Option<String>,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 8080,
            cors_allowed_origin: None,
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fees: FeeSchedule,
    pub lending: LendingDefaults,
    pub decoder: DecoderConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.decoder.timeout_ms = 10_000; // testnet gateway nodes are slow
        config.server.ip = "0.0.0.0".to_string();
        config
    }

    // the issuer contract charges simple interest, mainnet follows it
    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.lending.interest_model = InterestModel::Simple;
        config.decoder.timeout_ms = 2_000;
        config.server.ip = "0.0.0.0".to_string();
        config.server.workers = 8;
        config
    }

    /// Layers `path` (any format the `config` crate knows) and `STOICH__SECTION__KEY`
    /// environment variables over the `env` preset.
    pub fn load(env: Environment, path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder().add_source(::config::Config::try_from(&env.config())?);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let config: AppConfig = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fee_range = Decimal::ZERO..dec!(0.1);
        if !fee_range.contains(&self.fees.lp_fee) || !fee_range.contains(&self.fees.protocol_fee) {
            return Err(ConfigError::InvalidFees {
                reason: "Fees must be in [0, 10%)".to_string(),
            });
        }

        if self.decoder.binary.as_os_str().is_empty() {
            return Err(ConfigError::InvalidDecoder {
                reason: "Decoder binary path is empty".to_string(),
            });
        }

        if self.decoder.timeout_ms == 0 {
            return Err(ConfigError::InvalidDecoder {
                reason: "Decoder timeout must be positive".to_string(),
            });
        }

        if self.server.port == 0 || self.server.workers == 0 {
            return Err(ConfigError::InvalidServer {
                reason: "Port and worker count must be positive".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid decoder settings: {reason}")]
    InvalidDecoder { reason: String },

    #[error("Invalid server settings: {reason}")]
    InvalidServer { reason: String },

    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> AppConfig {
        match self {
            Environment::Development => AppConfig::default(),
            Environment::Testnet => AppConfig::testnet(),
            Environment::Mainnet => AppConfig::mainnet(),
        }
    }
}
