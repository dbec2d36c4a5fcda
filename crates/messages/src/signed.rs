//! Signed message envelope, the unit that travels on the wire.

use crate::{ConsensusMessage, MessageCode};
use ibft_types::signing::consensus_message_signing_bytes;
use ibft_types::{KeyPair, PublicKey, Signature, ValidatorId, View};
use sbor::prelude::*;
use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("SBOR encode error: {0}")]
    Encode(String),

    #[error("SBOR decode error: {0}")]
    Decode(String),
}

/// A consensus message together with its sender and the sender's signature.
///
/// The signature covers the sender id and the SBOR encoding of `message`
/// under the consensus-message domain tag.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct SignedMessage {
    pub message: ConsensusMessage,
    pub sender: ValidatorId,
    pub signature: Signature,
}

impl SignedMessage {
    /// Sign `message` as `sender`.
    pub fn sign(
        message: ConsensusMessage,
        sender: ValidatorId,
        key: &KeyPair,
    ) -> Result<Self, WireError> {
        let payload = Self::signing_bytes(&message, sender)?;
        let signature = key.sign(&payload);
        Ok(Self {
            message,
            sender,
            signature,
        })
    }

    fn signing_bytes(message: &ConsensusMessage, sender: ValidatorId) -> Result<Vec<u8>, WireError> {
        let encoded =
            sbor::basic_encode(message).map_err(|e| WireError::Encode(format!("{:?}", e)))?;
        Ok(consensus_message_signing_bytes(sender, &encoded))
    }

    /// Check the envelope signature against the sender's key.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        match Self::signing_bytes(&self.message, self.sender) {
            Ok(payload) => public_key.verify(&payload, &self.signature),
            Err(_) => false,
        }
    }

    pub fn code(&self) -> MessageCode {
        self.message.code()
    }

    pub fn view(&self) -> View {
        self.message.view()
    }

    /// SBOR encoding of the whole envelope.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        sbor::basic_encode(self).map_err(|e| WireError::Encode(format!("{:?}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        sbor::basic_decode(bytes).map_err(|e| WireError::Decode(format!("{:?}", e)))
    }
}
