//! Configuration module for the mint issuer
//!
//! Values are layered, later sources winning:
//! built-in defaults → optional TOML file → `MINT_`-prefixed environment
//! variables (`MINT_RPC__ENDPOINT`, `MINT_ISSUANCE__DECIMALS`, ...) →
//! the plain `RPC_ENDPOINT` and `SECRET` variables → CLI flags.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::rpc_manager::{ConfirmationLevel, RetryPolicy};
use crate::tx_builder::address::parse_identity;
use crate::tx_builder::builder::IssuanceRequest;
use crate::tx_builder::errors::IssuanceError;
use crate::tx_builder::instructions::MAX_DECIMALS;
use crate::tx_builder::submit::SubmissionConfig;

/// Prefix for layered environment overrides
pub const ENV_PREFIX: &str = "MINT";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
    pub issuance: IssuanceConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint
    pub endpoint: String,

    /// Commitment used for reads and preflight
    pub commitment: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Max retries per request on transient failures
    pub max_retries: u32,

    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Path to a keypair file (JSON array or 64 raw bytes)
    pub keypair_path: Option<String>,

    /// Base58-encoded 64-byte secret key
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// Faucet amount requested for a generated fee payer
    pub airdrop_lamports: u64,

    pub airdrop_timeout_secs: u64,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("keypair_path", &self.keypair_path)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("airdrop_lamports", &self.airdrop_lamports)
            .field("airdrop_timeout_secs", &self.airdrop_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    pub decimals: u8,

    /// Initial supply in whole tokens
    pub supply_tokens: u64,

    /// Holder of the initial supply; defaults to the fee payer
    pub owner: Option<String>,

    /// Defaults to the fee payer
    pub mint_authority: Option<String>,

    /// Defaults to the fee payer unless `no_freeze_authority` is set
    pub freeze_authority: Option<String>,

    pub no_freeze_authority: bool,

    /// Commitment to wait for before reporting success
    pub confirmation: String,

    pub poll_interval_ms: u64,

    /// Resend pending bytes every N polls (0 disables)
    pub rebroadcast_every: u32,

    /// Fresh envelopes to build after expiries
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Print Prometheus metrics on exit
    pub print_metrics: bool,
}

// Default value functions
fn default_endpoint() -> String {
    "http://127.0.0.1:8899".to_string()
}
fn default_commitment() -> String {
    "confirmed".to_string()
}
fn default_confirmation() -> String {
    "finalized".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            commitment: default_commitment(),
            timeout_ms: 30_000,
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: None,
            secret: None,
            airdrop_lamports: 1_000_000_000,
            airdrop_timeout_secs: 30,
        }
    }
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            decimals: 6,
            supply_tokens: 21_000_000,
            owner: None,
            mint_authority: None,
            freeze_authority: None,
            no_freeze_authority: false,
            confirmation: default_confirmation(),
            poll_interval_ms: 500,
            rebroadcast_every: 4,
            max_attempts: 3,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file only
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Layer an optional file and `MINT_` variables over the defaults
    ///
    /// `env` replaces the process environment when given.
    pub fn layered(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load `.env`, the layered sources and the plain variables
    ///
    /// Not validated here: command line overrides still apply on top, so
    /// callers validate the final value.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::layered(path, None)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Honour `RPC_ENDPOINT` and `SECRET`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("RPC_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            self.rpc.endpoint = endpoint;
        }
        if let Some(secret) = lookup("SECRET").filter(|v| !v.trim().is_empty()) {
            self.wallet.secret = Some(secret);
        }
    }

    /// Reject values that cannot produce a valid issuance
    pub fn validate(&self) -> Result<(), IssuanceError> {
        if self.rpc.endpoint.trim().is_empty() {
            return Err(IssuanceError::Configuration(
                "rpc.endpoint must not be empty".to_string(),
            ));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(IssuanceError::Configuration(
                "rpc.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.rpc.base_delay_ms > self.rpc.max_delay_ms {
            return Err(IssuanceError::Configuration(format!(
                "rpc.base_delay_ms ({}) exceeds rpc.max_delay_ms ({})",
                self.rpc.base_delay_ms, self.rpc.max_delay_ms
            )));
        }
        self.commitment()?;
        self.confirmation()?;

        if self.issuance.decimals > MAX_DECIMALS {
            return Err(IssuanceError::InvalidDecimals {
                decimals: self.issuance.decimals,
                max: MAX_DECIMALS,
            });
        }
        if self.issuance.max_attempts == 0 {
            return Err(IssuanceError::Configuration(
                "issuance.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.issuance.poll_interval_ms == 0 {
            return Err(IssuanceError::Configuration(
                "issuance.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.issuance.no_freeze_authority && self.issuance.freeze_authority.is_some() {
            return Err(IssuanceError::Configuration(
                "issuance.freeze_authority conflicts with issuance.no_freeze_authority".to_string(),
            ));
        }

        for key in [
            &self.issuance.owner,
            &self.issuance.mint_authority,
            &self.issuance.freeze_authority,
        ]
        .into_iter()
        .flatten()
        {
            parse_identity(key)?;
        }

        Ok(())
    }

    pub fn commitment(&self) -> Result<ConfirmationLevel, IssuanceError> {
        ConfirmationLevel::from_str(&self.rpc.commitment)
            .map_err(|e| IssuanceError::Configuration(format!("rpc.commitment: {e}")))
    }

    pub fn confirmation(&self) -> Result<ConfirmationLevel, IssuanceError> {
        ConfirmationLevel::from_str(&self.issuance.confirmation)
            .map_err(|e| IssuanceError::Configuration(format!("issuance.confirmation: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.rpc.max_retries,
            base_delay_ms: self.rpc.base_delay_ms,
            max_delay_ms: self.rpc.max_delay_ms,
            ..RetryPolicy::default()
        }
    }

    pub fn submission_config(&self) -> Result<SubmissionConfig, IssuanceError> {
        Ok(SubmissionConfig {
            commitment: self.confirmation()?,
            poll_interval: Duration::from_millis(self.issuance.poll_interval_ms),
            rebroadcast_every: self.issuance.rebroadcast_every,
            retry_policy: self.retry_policy(),
        })
    }

    /// Resolve the configured roles against the fee payer
    pub fn issuance_request(&self, fee_payer: Pubkey) -> Result<IssuanceRequest, IssuanceError> {
        let resolve = |value: &Option<String>| -> Result<Pubkey, IssuanceError> {
            value.as_deref().map_or(Ok(fee_payer), parse_identity)
        };

        let freeze_authority = if self.issuance.no_freeze_authority {
            None
        } else {
            Some(resolve(&self.issuance.freeze_authority)?)
        };

        Ok(IssuanceRequest {
            fee_payer,
            owner: resolve(&self.issuance.owner)?,
            mint_authority: resolve(&self.issuance.mint_authority)?,
            freeze_authority,
            decimals: self.issuance.decimals,
            supply_tokens: self.issuance.supply_tokens,
        })
    }
}
