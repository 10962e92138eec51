//! Transfer State Machine
//!
//! Tracks one logical transfer on the companion:
//! `Idle -> AwaitingStartAck -> ReceivingChunks -> Reassembling -> Delivered`,
//! with `Aborted` reachable from any non-terminal state on timeout or error.
//! Both terminal states return to `Idle`. The single-message path skips the
//! chunk states and goes straight from `AwaitingStartAck` to `Reassembling`.

use tracing::debug;

use crate::errors::SyncError;

/// Phase of one logical transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No transfer in flight
    Idle,
    /// Request sent, waiting for the peer's ready acknowledgement
    AwaitingStartAck,
    /// Session open, accepting chunks
    ReceivingChunks,
    /// All bytes in hand, decoding
    Reassembling,
    /// Snapshot decoded and stored
    Delivered,
    /// Transfer abandoned on timeout or error
    Aborted,
}

impl TransferState {
    fn is_terminal(self) -> bool {
        matches!(self, TransferState::Delivered | TransferState::Aborted)
    }
}

/// Validated state tracker for one transfer attempt, recording the path
/// taken for diagnostics.
#[derive(Debug)]
pub struct TransferStateMachine {
    state: TransferState,
    history: Vec<TransferState>,
}

impl TransferStateMachine {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            history: vec![TransferState::Idle],
        }
    }

    /// Move to `next`, rejecting transitions the protocol does not allow
    pub fn advance(&mut self, next: TransferState) -> Result<(), SyncError> {
        use TransferState::*;

        let legal = match (self.state, next) {
            (Idle, AwaitingStartAck) => true,
            (AwaitingStartAck, ReceivingChunks) => true,
            // Single-message reply carries the payload directly
            (AwaitingStartAck, Reassembling) => true,
            (ReceivingChunks, Reassembling) => true,
            (Reassembling, Delivered) => true,
            (from, Aborted) if !from.is_terminal() => true,
            (from, Idle) if from.is_terminal() => true,
            _ => false,
        };

        if !legal {
            return Err(SyncError::ProtocolViolation(format!(
                "illegal transfer transition {:?} -> {:?}",
                self.state, next
            )));
        }

        debug!(from = ?self.state, to = ?next, "Transfer state change");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Every state visited, starting at `Idle`
    pub fn history(&self) -> &[TransferState] {
        &self.history
    }
}

impl Default for TransferStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransferState::*;

    #[test]
    fn test_chunked_transfer_path() {
        let mut machine = TransferStateMachine::new();
        for next in [AwaitingStartAck, ReceivingChunks, Reassembling, Delivered] {
            machine.advance(next).unwrap();
        }
        assert_eq!(
            machine.history(),
            &[Idle, AwaitingStartAck, ReceivingChunks, Reassembling, Delivered]
        );
    }

    #[test]
    fn test_single_message_path_skips_chunk_states() {
        let mut machine = TransferStateMachine::new();
        machine.advance(AwaitingStartAck).unwrap();
        machine.advance(Reassembling).unwrap();
        machine.advance(Delivered).unwrap();
        assert_eq!(machine.state(), Delivered);
    }

    #[test]
    fn test_abort_from_any_non_terminal_state() {
        for path in [
            vec![],
            vec![AwaitingStartAck],
            vec![AwaitingStartAck, ReceivingChunks],
            vec![AwaitingStartAck, ReceivingChunks, Reassembling],
        ] {
            let mut machine = TransferStateMachine::new();
            for next in path {
                machine.advance(next).unwrap();
            }
            machine.advance(Aborted).unwrap();
            assert_eq!(machine.state(), Aborted);
        }
    }

    #[test]
    fn test_terminal_states_return_to_idle() {
        let mut machine = TransferStateMachine::new();
        machine.advance(AwaitingStartAck).unwrap();
        machine.advance(Aborted).unwrap();
        machine.advance(Idle).unwrap();
        assert_eq!(machine.state(), Idle);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut machine = TransferStateMachine::new();
        assert!(machine.advance(ReceivingChunks).is_err());
        assert!(machine.advance(Delivered).is_err());

        machine.advance(AwaitingStartAck).unwrap();
        machine.advance(ReceivingChunks).unwrap();
        machine.advance(Reassembling).unwrap();
        machine.advance(Delivered).unwrap();
        // Delivered is terminal; only Idle is reachable
        assert!(machine.advance(Aborted).is_err());
    }
}
