//! Outbound message types for network communication.

use ibft_messages::{MessageCode, SignedMessage};

/// Outbound network messages.
///
/// One variant per consensus phase so runners can route or prioritise by
/// kind without decoding. The runner handles the actual network I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Proposer's PRE-PREPARE.
    Preprepare(SignedMessage),

    /// PREPARE vote.
    Prepare(SignedMessage),

    /// COMMIT vote carrying a commit seal.
    Commit(SignedMessage),

    /// Vote to move to a higher round.
    RoundChange(SignedMessage),
}

impl OutboundMessage {
    /// Wrap a signed message in the variant matching its code.
    pub fn from_signed(message: SignedMessage) -> Self {
        match message.code() {
            MessageCode::Preprepare => OutboundMessage::Preprepare(message),
            MessageCode::Prepare => OutboundMessage::Prepare(message),
            MessageCode::Commit => OutboundMessage::Commit(message),
            MessageCode::RoundChange => OutboundMessage::RoundChange(message),
        }
    }

    pub fn code(&self) -> MessageCode {
        self.signed().code()
    }

    pub fn signed(&self) -> &SignedMessage {
        match self {
            OutboundMessage::Preprepare(m)
            | OutboundMessage::Prepare(m)
            | OutboundMessage::Commit(m)
            | OutboundMessage::RoundChange(m) => m,
        }
    }

    pub fn into_signed(self) -> SignedMessage {
        match self {
            OutboundMessage::Preprepare(m)
            | OutboundMessage::Prepare(m)
            | OutboundMessage::Commit(m)
            | OutboundMessage::RoundChange(m) => m,
        }
    }

    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Preprepare(_) => "Preprepare",
            OutboundMessage::Prepare(_) => "Prepare",
            OutboundMessage::Commit(_) => "Commit",
            OutboundMessage::RoundChange(_) => "RoundChange",
        }
    }
}

impl From<SignedMessage> for OutboundMessage {
    fn from(message: SignedMessage) -> Self {
        Self::from_signed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibft_messages::{ConsensusMessage, Subject};
    use ibft_types::{KeyPair, ValidatorId, View};

    #[test]
    fn test_variant_follows_message_code() {
        let key = KeyPair::ed25519_from_seed(&[1u8; 32]);
        let signed = SignedMessage::sign(
            ConsensusMessage::RoundChange(Subject::round_change(View::new(3, 1))),
            ValidatorId(0),
            &key,
        )
        .unwrap();

        let outbound = OutboundMessage::from(signed.clone());
        assert!(matches!(outbound, OutboundMessage::RoundChange(_)));
        assert_eq!(outbound.code(), MessageCode::RoundChange);
        assert_eq!(outbound.type_name(), "RoundChange");
        assert_eq!(outbound.into_signed(), signed);
    }
}
