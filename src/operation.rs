//! Client-submitted operations.
//!
//! An operation is immutable once accepted. Fee fields are 256-bit and all
//! comparisons on them go through `U256`, never a native integer.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Queue-assigned identifier. Ids increase with arrival, so sorting by id
/// recovers arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// A delegated-execution intent, in the shape clients send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
    /// Meta-transaction group this operation belongs to.
    #[serde(rename = "meta_tx_id")]
    pub meta_tx_id: U256,
    /// Position of this operation inside its group.
    #[serde(rename = "meta_tx_order_id")]
    pub meta_tx_order_id: U256,
    /// Declared size of the group.
    #[serde(deserialize_with = "deserialize_ops_count")]
    pub user_ops_count: u8,
}

/// Group size arrives in the same forms as the other numeric fields:
/// a JSON number, or a hex or decimal string.
fn deserialize_ops_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = U256::deserialize(deserializer)?;
    u8::try_from(value).map_err(|_| D::Error::custom(format!("userOpsCount out of range: {value}")))
}

impl UserOperation {
    /// Hash of the call payload, used to identify operations in traces.
    pub fn call_data_hash(&self) -> B256 {
        keccak256(&self.call_data)
    }
}
