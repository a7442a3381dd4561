#![allow(clippy::missing_errors_doc)]

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use thero_idle_session::SessionCheckpoint;
use thiserror::Error;

const TRANSFER_DOMAIN: &str = "thero";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded checkpoint payload.
pub(crate) const TRANSFER_HEADER: &str = "thero:v1";
/// Delimiter used to separate the prefix, tower count and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes a checkpoint into a single-line string suitable for clipboard transfer.
///
/// The tower count travels in clear text so truncated payloads are caught
/// before they are restored.
pub(crate) fn encode(checkpoint: &SessionCheckpoint) -> Result<String, TransferError> {
    let json = serde_json::to_vec(checkpoint).map_err(TransferError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{TRANSFER_HEADER}:{}:{encoded}",
        checkpoint.towers.len()
    ))
}

/// Decodes a checkpoint from its transfer string.
pub(crate) fn decode(value: &str) -> Result<SessionCheckpoint, TransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
    let version = parts.next().ok_or(TransferError::MissingVersion)?;
    let count = parts.next().ok_or(TransferError::MissingTowerCount)?;
    let payload = parts.next().ok_or(TransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(TransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(TransferError::UnsupportedVersion(version.to_owned()));
    }

    let expected = count
        .trim()
        .parse::<usize>()
        .map_err(|_| TransferError::InvalidTowerCount(count.to_owned()))?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(TransferError::InvalidEncoding)?;
    let checkpoint: SessionCheckpoint =
        serde_json::from_slice(&bytes).map_err(TransferError::InvalidPayload)?;

    if checkpoint.towers.len() != expected {
        return Err(TransferError::TowerCountMismatch {
            expected,
            found: checkpoint.towers.len(),
        });
    }

    Ok(checkpoint)
}

/// Errors that can occur while encoding or decoding checkpoint transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("checkpoint string was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("checkpoint string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("checkpoint string is missing the version")]
    MissingVersion,
    /// The tower count segment was missing.
    #[error("checkpoint string is missing the tower count")]
    MissingTowerCount,
    /// The payload segment was missing.
    #[error("checkpoint string is missing the payload")]
    MissingPayload,
    /// The string used an unexpected prefix.
    #[error("checkpoint prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    #[error("checkpoint version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The tower count could not be parsed.
    #[error("could not parse tower count '{0}'")]
    InvalidTowerCount(String),
    /// The payload holds a different number of towers than announced.
    #[error("checkpoint announces {expected} towers but carries {found}")]
    TowerCountMismatch {
        /// Count announced in the header.
        expected: usize,
        /// Count found in the payload.
        found: usize,
    },
    /// The base64 payload could not be decoded.
    #[error("could not decode checkpoint payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    #[error("could not parse checkpoint payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}
