//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Every consensus message is SBOR-encoded then LZ4-compressed, with the
//! uncompressed size prepended:
//!
//! ```text
//! [u32 LE uncompressed size][LZ4 block of the SBOR-encoded SignedMessage]
//! ```
//!
//! The message kind is carried by the SBOR variant tag, so no topic or
//! header is needed to dispatch.

use ibft_core::OutboundMessage;
use ibft_messages::{SignedMessage, WireError};
use thiserror::Error;

/// Largest decompressed message accepted from the network.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message too short")]
    MessageTooShort,

    #[error("Message of {0} bytes exceeds the size limit")]
    MessageTooLarge(usize),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Encode an outbound message to wire format.
pub fn encode_message(message: &OutboundMessage) -> Result<Vec<u8>, CodecError> {
    let sbor_bytes = message.signed().encode()?;
    Ok(lz4_flex::compress_prepend_size(&sbor_bytes))
}

/// Decode a message from wire format.
///
/// The signature is not checked here; the state machine validates sender
/// and signature before acting on the message.
pub fn decode_message(data: &[u8]) -> Result<SignedMessage, CodecError> {
    let Some(size_prefix) = data.get(..4) else {
        return Err(CodecError::MessageTooShort);
    };
    let declared = u32::from_le_bytes([size_prefix[0], size_prefix[1], size_prefix[2], size_prefix[3]])
        as usize;
    if declared > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(declared));
    }

    let payload = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| CodecError::Decompress(e.to_string()))?;
    Ok(SignedMessage::decode(&payload)?)
}
