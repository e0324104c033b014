//! Outcome correlation: matching receipt events back to batch operations.
//!
//! `UserOpHandled` carries the sender but no nonce, so identity matching
//! uses the sender plus submitted order. The positional strategies exist
//! to reproduce strict front-removal matching and flag every event whose
//! sender disagrees with the operation it was paired with.

use std::collections::VecDeque;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::chain::abi::{decode_log, DecodedEvent};
use crate::chain::LogRecord;
use crate::operation::{OperationId, UserOperation};

/// How per-operation events are paired with submitted operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorrelationStrategy {
    /// First unresolved operation, in submitted order, with the event's sender.
    #[default]
    BySender,
    /// Strict front-removal over the submitted (fee-sorted) order.
    SubmissionOrder,
    /// Strict front-removal over arrival order, ignoring the sort.
    ArrivalOrder,
}

#[derive(Debug, Error)]
#[error("unknown correlation strategy: {0} (expected by-sender, submission-order or arrival-order)")]
pub struct UnknownStrategy(String);

impl FromStr for CorrelationStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by-sender" | "sender" => Ok(Self::BySender),
            "submission-order" | "submission" => Ok(Self::SubmissionOrder),
            "arrival-order" | "arrival" => Ok(Self::ArrivalOrder),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for CorrelationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BySender => "by-sender",
            Self::SubmissionOrder => "submission-order",
            Self::ArrivalOrder => "arrival-order",
        })
    }
}

/// One operation paired with one outcome event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedOutcome {
    pub operation_id: OperationId,
    pub sender: Address,
    pub nonce: U256,
    pub meta_tx_id: U256,
    pub meta_tx_order_id: U256,
    pub user_ops_count: u8,
    /// Sender named by the event itself.
    pub event_sender: Address,
    pub success: bool,
    pub reason: String,
    /// Set when a positional strategy paired the event with an operation
    /// from a different sender.
    pub sender_mismatch: bool,
}

/// Outcome of a whole meta-transaction group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub meta_tx_id: U256,
    pub success: bool,
}

/// State change reported by the inner target contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEvent {
    pub action: String,
    pub new_value: U256,
}

/// Everything learned from one receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationReport {
    /// Pairings, in event emission order.
    pub correlated: Vec<CorrelatedOutcome>,
    pub groups: Vec<GroupOutcome>,
    pub target_events: Vec<TargetEvent>,
    /// Senders of per-operation events that found no operation.
    pub unmatched_events: Vec<Address>,
    /// Operations no event was paired with, in submitted order.
    pub uncorrelated: Vec<OperationId>,
    /// Logs that decoded as none of the known events.
    pub ignored_logs: usize,
}

impl CorrelationReport {
    pub fn mismatches(&self) -> usize {
        self.correlated.iter().filter(|c| c.sender_mismatch).count()
    }
}

/// Pairs receipt events with the operations of the batch that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeCorrelator {
    strategy: CorrelationStrategy,
}

impl OutcomeCorrelator {
    pub fn new(strategy: CorrelationStrategy) -> Self {
        Self { strategy }
    }

    /// Walk `logs` in emission order. `submitted` is the batch in the order
    /// it was encoded; arrival order is recovered from the operation ids.
    pub fn correlate(
        &self,
        submitted: &[(OperationId, &UserOperation)],
        logs: &[LogRecord],
    ) -> CorrelationReport {
        let mut tracking: VecDeque<(OperationId, &UserOperation)> =
            submitted.iter().copied().collect();
        if self.strategy == CorrelationStrategy::ArrivalOrder {
            tracking.make_contiguous().sort_by_key(|(id, _)| *id);
        }

        let mut report = CorrelationReport::default();
        for log in logs {
            match decode_log(log) {
                Some(DecodedEvent::OperationHandled { sender, success, reason }) => {
                    match self.take(&mut tracking, sender) {
                        Some((id, op)) => {
                            let outcome = CorrelatedOutcome {
                                operation_id: id,
                                sender: op.sender,
                                nonce: op.nonce,
                                meta_tx_id: op.meta_tx_id,
                                meta_tx_order_id: op.meta_tx_order_id,
                                user_ops_count: op.user_ops_count,
                                event_sender: sender,
                                success,
                                reason,
                                sender_mismatch: op.sender != sender,
                            };
                            if outcome.sender_mismatch {
                                tracing::warn!(
                                    operation = %id,
                                    expected = %op.sender,
                                    event_sender = %sender,
                                    strategy = %self.strategy,
                                    "outcome event paired with an operation from another sender"
                                );
                            }
                            report.correlated.push(outcome);
                        }
                        None => report.unmatched_events.push(sender),
                    }
                }
                Some(DecodedEvent::MetaTransactionHandled { meta_tx_id, success }) => {
                    report.groups.push(GroupOutcome { meta_tx_id, success });
                }
                Some(DecodedEvent::NumberChanged { action, new_value }) => {
                    report.target_events.push(TargetEvent { action, new_value });
                }
                None => report.ignored_logs += 1,
            }
        }

        // Leftovers are reported in submitted order regardless of strategy.
        let mut leftover: Vec<OperationId> = tracking.into_iter().map(|(id, _)| id).collect();
        leftover.sort_by_key(|id| position_of(submitted, *id));
        report.uncorrelated = leftover;
        report
    }

    fn take<'a>(
        &self,
        tracking: &mut VecDeque<(OperationId, &'a UserOperation)>,
        sender: Address,
    ) -> Option<(OperationId, &'a UserOperation)> {
        match self.strategy {
            CorrelationStrategy::BySender => {
                let idx = tracking.iter().position(|(_, op)| op.sender == sender)?;
                tracking.remove(idx)
            }
            CorrelationStrategy::SubmissionOrder | CorrelationStrategy::ArrivalOrder => {
                tracking.pop_front()
            }
        }
    }
}

fn position_of(submitted: &[(OperationId, &UserOperation)], id: OperationId) -> usize {
    submitted.iter().position(|(sid, _)| *sid == id).unwrap_or(usize::MAX)
}

#[cfg(test)]
#[path = "correlator_tests.rs"]
mod tests;
