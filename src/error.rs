//! Error taxonomy for the OWEN codec, device and sensor registry.
//!
//! Mirrors the exception hierarchy of the original Python implementation
//! (`PacketHeaderError`, `PacketFooterError`, `PacketDecodeError`, ...) but
//! collapsed into two closed enums so callers match exhaustively instead of
//! catching a blanket `Exception`.

use thiserror::Error;

/// Errors raised while encoding a request or decoding/validating a response.
/// Pure, no I/O involved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// `get_command_packet` was handed a parameter id that isn't exactly two bytes.
    #[error("parameter id must be exactly two bytes")]
    BadParameterLength,

    /// ASCII frame did not start with `#`.
    #[error("response missing '#' header")]
    BadHeader,

    /// ASCII frame did not end with `\r`.
    #[error("response missing '\\r' footer")]
    BadFooter,

    /// Binary response shorter than the minimum 6-byte frame.
    #[error("response shorter than 6 bytes")]
    BadLength,

    /// Structural or validation failure with a specific reason.
    #[error("decode error: {0}")]
    Decode(String),

    /// A BCD nibble was not a decimal digit, or the input was empty.
    #[error("invalid BCD payload")]
    BadBcd,

    /// Clock payload was not exactly 7 bytes.
    #[error("invalid clock payload")]
    BadTime,
}

/// Errors raised while performing a device transaction.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Caller asked to read a parameter id this device doesn't recognize.
    #[error("unsupported parameter")]
    UnsupportedParameter,

    /// No bytes arrived within the bus read deadline.
    #[error("timeout waiting for response")]
    Timeout,

    /// Construction-time misconfiguration (bad address, bad address width, bad serial settings).
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    /// A runtime I/O failure talking to the bus (port gone, write failed, ...).
    /// Distinct from `Misconfigured`, which is construction-time only.
    #[error("bus error: {0}")]
    Bus(String),
}

/// Raised by the sensor registry when a lookup by name fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device not found: {0}")]
pub struct DeviceNotFound(pub String);
