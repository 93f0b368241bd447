//! Rent-exemption sizing
//!
//! One `RentSizer` lives for one submission: values are cached per record
//! size for that lifetime only and never guessed when the ledger can't be
//! reached.

use std::sync::Arc;

use dashmap::DashMap;
use spl_token::solana_program::program_pack::Pack;
use tracing::debug;

use crate::rpc_manager::LedgerRpc;
use crate::tx_builder::errors::{IssuanceError, Stage};

/// Byte size of an SPL mint record
pub const MINT_RECORD_SIZE: usize = spl_token::state::Mint::LEN;

pub struct RentSizer<R: LedgerRpc + ?Sized> {
    rpc: Arc<R>,
    cache: DashMap<usize, u64>,
}

impl<R: LedgerRpc + ?Sized> RentSizer<R> {
    pub fn new(rpc: Arc<R>) -> Self {
        Self {
            rpc,
            cache: DashMap::new(),
        }
    }

    /// Minimum balance for a record of `record_size` bytes to be rent exempt
    pub async fn minimum_rent_exempt_balance(
        &self,
        record_size: usize,
    ) -> Result<u64, IssuanceError> {
        if let Some(cached) = self.cache.get(&record_size) {
            return Ok(*cached);
        }

        let lamports = self
            .rpc
            .get_minimum_balance_for_rent_exemption(record_size)
            .await
            .map_err(|e| IssuanceError::from_rpc(e, Stage::Rent))?;

        debug!(record_size, lamports, "Rent-exempt minimum fetched");
        self.cache.insert(record_size, lamports);
        Ok(lamports)
    }

    /// Rent-exempt minimum for the mint record
    pub async fn mint_record_balance(&self) -> Result<u64, IssuanceError> {
        self.minimum_rent_exempt_balance(MINT_RECORD_SIZE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;

    #[test]
    fn test_mint_record_size() {
        assert_eq!(MINT_RECORD_SIZE, 82);
    }

    #[tokio::test]
    async fn test_rent_is_cached_per_size() {
        let ledger = Arc::new(MockLedger::new());
        let sizer = RentSizer::new(ledger.clone());

        let first = sizer.mint_record_balance().await.unwrap();
        let second = sizer.mint_record_balance().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, MockLedger::rent_for(82));
        assert_eq!(ledger.rent_queries(), 1);

        sizer.minimum_rent_exempt_balance(165).await.unwrap();
        assert_eq!(ledger.rent_queries(), 2);
    }

    #[tokio::test]
    async fn test_rent_unavailable_is_network_error() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_rent_unavailable(true);
        let sizer = RentSizer::new(ledger.clone());

        let err = sizer.mint_record_balance().await.unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::NetworkUnavailable {
                stage: Stage::Rent,
                ..
            }
        ));

        // No stale value gets cached after a failure
        ledger.set_rent_unavailable(false);
        assert_eq!(
            sizer.mint_record_balance().await.unwrap(),
            MockLedger::rent_for(82)
        );
    }
}
