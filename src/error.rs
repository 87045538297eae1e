//! Error kinds surfaced by the acoustic link core.
//!
//! `EngineError` is the flat, FFI-safe set a host caller can match on.
//! `CodecError` and `SessionError` stay internal — they never cross the
//! uniffi boundary as an `Err`, they turn into `EngineEvent::SendFailed`
//! or a silent log line.

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum EngineError {
    #[error("output device is not ready")]
    DeviceUnavailable,
    #[error("a transmission is already in flight")]
    Busy,
    #[error("payload exceeds the 32 byte frame limit")]
    PayloadTooLarge,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload of {0} bytes exceeds the 32 byte frame limit")]
    PayloadTooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("datagram did not match the expected schema for its type")]
    Malformed,
    #[error("no matching key for private-mode content")]
    DecryptFailed,
}
