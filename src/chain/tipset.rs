// Tip summary - the node's view of the chain head

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::TokenAmount;

/// Gas parameters in force at the current tip
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasInfo {
    pub block_gas_limit: u64,
    pub block_gas_target: u64,
    pub min_gas_premium: TokenAmount,
    pub base_fee_max_change_denom: u64,
}

impl Default for GasInfo {
    fn default() -> Self {
        Self {
            block_gas_limit: 10_000_000_000,
            block_gas_target: 5_000_000_000,
            min_gas_premium: TokenAmount::from_atto(100_000),
            base_fee_max_change_denom: 8,
        }
    }
}

/// Latest known chain head
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipSummary {
    pub height: u64,
    pub parent_base_fee: TokenAmount,
    pub gas: GasInfo,
    pub observed_at: DateTime<Utc>,
}

impl TipSummary {
    /// Tip observed now, with default gas parameters
    pub fn new(height: u64, parent_base_fee: TokenAmount) -> Self {
        Self {
            height,
            parent_base_fee,
            gas: GasInfo::default(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_gas(mut self, gas: GasInfo) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }
}
