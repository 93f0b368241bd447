//! Wallet management module
//!
//! Resolves the fee payer from, in order: a base58 secret, a keypair file,
//! or a freshly generated keypair funded through the faucet.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::WalletConfig;
use crate::rpc_manager::{ConfirmationLevel, LedgerRpc};
use crate::tx_builder::errors::{IssuanceError, Stage};

const FAUCET_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Where the fee payer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeePayerSource {
    Secret,
    File(String),
    Generated,
}

impl fmt::Display for FeePayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeePayerSource::Secret => f.write_str("secret"),
            FeePayerSource::File(path) => write!(f, "file:{path}"),
            FeePayerSource::Generated => f.write_str("generated"),
        }
    }
}

/// Wallet manager holding the fee payer keypair
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
    source: FeePayerSource,
}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .field("source", &self.source)
            .finish()
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

impl WalletManager {
    /// Load from a keypair file: a JSON array of 64 bytes or 64 raw bytes
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = Zeroizing::new(
            std::fs::read(path)
                .with_context(|| format!("Failed to read keypair file: {}", path.display()))?,
        );

        let keypair = if contents.len() == 64 {
            keypair_from_bytes(&contents)?
        } else {
            let json: Zeroizing<Vec<u8>> = Zeroizing::new(
                serde_json::from_slice(&contents).context("Failed to parse keypair JSON")?,
            );
            keypair_from_bytes(&json)?
        };

        Ok(Self {
            keypair: Arc::new(keypair),
            source: FeePayerSource::File(path.display().to_string()),
        })
    }

    /// Decode a base58-encoded 64-byte secret key
    pub fn from_base58_secret(secret: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .context("Secret is not valid base58")?,
        );
        let keypair = keypair_from_bytes(&bytes)?;

        Ok(Self {
            keypair: Arc::new(keypair),
            source: FeePayerSource::Secret,
        })
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
            source: FeePayerSource::Generated,
        }
    }

    /// Fresh random keypair; fund it before use
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::new())
    }

    /// Use the first configured source, generating and funding a keypair
    /// when none is set
    ///
    /// An inline secret wins over a keypair file. The command line clears the
    /// secret when it names a file, so both reaching here means file and
    /// environment configuration disagree.
    pub async fn resolve<R: LedgerRpc + ?Sized>(config: &WalletConfig, rpc: &R) -> Result<Self> {
        if let Some(secret) = config.secret.as_deref() {
            if let Some(path) = config.keypair_path.as_deref() {
                warn!(keypair_path = path, "Both SECRET and a keypair file are set, using SECRET");
            }
            return Self::from_base58_secret(secret).context("Failed to load fee payer secret");
        }

        if let Some(path) = config.keypair_path.as_deref() {
            return Self::from_file(Path::new(path));
        }

        let wallet = Self::generate();
        info!(
            pubkey = %wallet.pubkey(),
            lamports = config.airdrop_lamports,
            "No fee payer configured, funding a generated keypair"
        );
        wallet
            .fund_from_faucet(
                rpc,
                config.airdrop_lamports,
                Duration::from_secs(config.airdrop_timeout_secs),
            )
            .await?;
        Ok(wallet)
    }

    /// Request `lamports` from the faucet and wait until the credit is confirmed
    pub async fn fund_from_faucet<R: LedgerRpc + ?Sized>(
        &self,
        rpc: &R,
        lamports: u64,
        timeout: Duration,
    ) -> Result<Signature, IssuanceError> {
        let pubkey = self.pubkey();
        let signature = rpc
            .request_airdrop(&pubkey, lamports)
            .await
            .map_err(|e| IssuanceError::from_rpc(e, Stage::Fund))?;
        debug!(%signature, %pubkey, lamports, "Airdrop requested");

        let wait = async {
            loop {
                let status = rpc
                    .get_signature_status(&signature)
                    .await
                    .map_err(|e| IssuanceError::from_rpc(e, Stage::Fund))?;
                match status {
                    Some(status) if status.err.is_some() => {
                        return Err(IssuanceError::Rejected {
                            stage: Stage::Fund,
                            message: status.err.map(|e| e.to_string()).unwrap_or_default(),
                        })
                    }
                    Some(status) if status.confirmation.satisfies(ConfirmationLevel::Confirmed) => {
                        return Ok(signature)
                    }
                    _ => tokio::time::sleep(FAUCET_POLL_INTERVAL).await,
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| IssuanceError::NetworkUnavailable {
                stage: Stage::Fund,
                message: format!("airdrop {signature} not confirmed within {timeout:?}"),
            })?
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn source(&self) -> &FeePayerSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;
    use std::io::Write;

    #[test]
    fn test_from_file_json_and_raw() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let mut json = tempfile::NamedTempFile::new().unwrap();
        write!(json, "{}", serde_json::to_string(&bytes.to_vec()).unwrap()).unwrap();
        let wallet = WalletManager::from_file(json.path()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
        assert!(matches!(wallet.source(), FeePayerSource::File(_)));

        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&bytes).unwrap();
        let wallet = WalletManager::from_file(raw.path()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_all_zero_key_rejected() {
        let mut raw = tempfile::NamedTempFile::new().unwrap();
        raw.write_all(&[0u8; 64]).unwrap();
        let err = WalletManager::from_file(raw.path()).unwrap_err();
        assert!(err.to_string().contains("all-zero"));

        let secret = bs58::encode([0u8; 64]).into_string();
        assert!(WalletManager::from_base58_secret(&secret).is_err());
    }

    #[test]
    fn test_from_base58_secret() {
        let keypair = Keypair::new();
        let secret = bs58::encode(keypair.to_bytes()).into_string();

        let wallet = WalletManager::from_base58_secret(&format!("{secret}\n")).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
        assert_eq!(wallet.source(), &FeePayerSource::Secret);

        assert!(WalletManager::from_base58_secret("0OIl").is_err());
        assert!(WalletManager::from_base58_secret(&bs58::encode([7u8; 32]).into_string()).is_err());
    }

    #[test]
    fn test_debug_omits_secret() {
        let wallet = WalletManager::generate();
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains(&wallet.pubkey().to_string()));
        assert!(!rendered.contains(&bs58::encode(wallet.keypair().to_bytes()).into_string()));
    }

    #[tokio::test]
    async fn test_resolve_prefers_secret_over_file() {
        let from_secret = Keypair::new();
        let from_file = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&from_file.to_bytes()).unwrap();

        let config = WalletConfig {
            keypair_path: Some(file.path().display().to_string()),
            secret: Some(bs58::encode(from_secret.to_bytes()).into_string()),
            ..WalletConfig::default()
        };
        let ledger = MockLedger::new();
        let wallet = WalletManager::resolve(&config, &ledger).await.unwrap();
        assert_eq!(wallet.pubkey(), from_secret.pubkey());
        assert_eq!(ledger.landed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_generates_and_funds() {
        let ledger = MockLedger::new();
        let config = WalletConfig::default();

        let wallet = WalletManager::resolve(&config, &ledger).await.unwrap();
        assert_eq!(wallet.source(), &FeePayerSource::Generated);
        assert_eq!(ledger.lamports(&wallet.pubkey()), config.airdrop_lamports);
    }
}
