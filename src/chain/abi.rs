//! EntryPoint ABI: the batch call, the outcome events, and the wallet and
//! target calls used to label operations in traces.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};

use super::client::LogRecord;
use crate::operation::UserOperation;

sol! {
    /// Wire tuple for one operation, fields in EntryPoint order.
    #[derive(Debug, PartialEq, Eq)]
    struct UserOperationTuple {
        address sender;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        uint256 callGasLimit;
        uint256 verificationGasLimit;
        uint256 preVerificationGas;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        bytes paymasterAndData;
        bytes signature;
        uint256 meta_tx_id;
        uint256 meta_tx_order_id;
        uint8 userOpsCount;
    }

    function handleOps(UserOperationTuple[] ops, address beneficiary);

    #[derive(Debug, PartialEq, Eq)]
    event UserOpHandled(address indexed sender, bool success, string reason);

    #[derive(Debug, PartialEq, Eq)]
    event MetaTransactionHandled(uint256 indexed meta_tx_id, bool success);

    function execute(address target, bytes data);

    function increase();
    function decrease();

    #[derive(Debug, PartialEq, Eq)]
    event NumberChanged(string action, uint256 newValue);
}

impl From<&UserOperation> for UserOperationTuple {
    fn from(op: &UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            initCode: op.init_code.clone(),
            callData: op.call_data.clone(),
            callGasLimit: op.call_gas_limit,
            verificationGasLimit: op.verification_gas_limit,
            preVerificationGas: op.pre_verification_gas,
            maxFeePerGas: op.max_fee_per_gas,
            maxPriorityFeePerGas: op.max_priority_fee_per_gas,
            paymasterAndData: op.paymaster_and_data.clone(),
            signature: op.signature.clone(),
            meta_tx_id: op.meta_tx_id,
            meta_tx_order_id: op.meta_tx_order_id,
            userOpsCount: op.user_ops_count,
        }
    }
}

/// Encode `handleOps(ops, beneficiary)` with the operations in the given order.
pub fn encode_handle_ops<'a, I>(ops: I, beneficiary: Address) -> Bytes
where
    I: IntoIterator<Item = &'a UserOperation>,
{
    let call = handleOpsCall {
        ops: ops.into_iter().map(UserOperationTuple::from).collect(),
        beneficiary,
    };
    Bytes::from(call.abi_encode())
}

/// An event the bundler understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// Per-operation outcome emitted by the EntryPoint.
    OperationHandled { sender: Address, success: bool, reason: String },
    /// Group-level outcome emitted by the EntryPoint.
    MetaTransactionHandled { meta_tx_id: U256, success: bool },
    /// State change emitted by the inner target contract.
    NumberChanged { action: String, new_value: U256 },
}

/// Decode a receipt log. Returns `None` for anything unrecognised.
pub fn decode_log(log: &LogRecord) -> Option<DecodedEvent> {
    let topic0 = *log.topics.first()?;
    let topics = log.topics.iter().copied();

    if topic0 == UserOpHandled::SIGNATURE_HASH {
        let ev = UserOpHandled::decode_raw_log(topics, &log.data, true).ok()?;
        return Some(DecodedEvent::OperationHandled {
            sender: ev.sender,
            success: ev.success,
            reason: ev.reason,
        });
    }
    if topic0 == MetaTransactionHandled::SIGNATURE_HASH {
        let ev = MetaTransactionHandled::decode_raw_log(topics, &log.data, true).ok()?;
        return Some(DecodedEvent::MetaTransactionHandled {
            meta_tx_id: ev.meta_tx_id,
            success: ev.success,
        });
    }
    if topic0 == NumberChanged::SIGNATURE_HASH {
        let ev = NumberChanged::decode_raw_log(topics, &log.data, true).ok()?;
        return Some(DecodedEvent::NumberChanged { action: ev.action, new_value: ev.newValue });
    }
    None
}

/// Trace label for an operation's call data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLabel {
    /// A recognised call on the inner target.
    Target(&'static str),
    /// A wallet `execute` aimed somewhere other than the inner target.
    Unknown,
    /// Not a wallet `execute`, or an unrecognised call on the inner target.
    Undecodable,
}

impl std::fmt::Display for CallLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(name) => f.write_str(name),
            Self::Unknown => f.write_str("unknown"),
            Self::Undecodable => f.write_str("undecodable"),
        }
    }
}

/// Label `call_data` by unwrapping the wallet `execute` call and naming
/// the inner call when it targets `target`.
pub fn describe_call(call_data: &[u8], target: Option<Address>) -> CallLabel {
    let Ok(exec) = executeCall::abi_decode(call_data, true) else {
        return CallLabel::Undecodable;
    };
    if Some(exec.target) != target {
        return CallLabel::Unknown;
    }
    match exec.data.get(..4) {
        Some(sel) if sel == increaseCall::SELECTOR => CallLabel::Target("increase"),
        Some(sel) if sel == decreaseCall::SELECTOR => CallLabel::Target("decrease"),
        _ => CallLabel::Undecodable,
    }
}
