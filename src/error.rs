//! Crate error types
//!
//! Errors are grouped by the concern that produces them. Nothing in this
//! crate is fatal to the process: media errors become session error
//! transitions, and identity errors are returned to the caller that
//! requested the action. Transport failures are deliberately absent here —
//! they are recovered by the reconnect path and surface only as connection
//! state, never as a typed error across the coordination boundary.

use std::fmt;

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum Error {
    /// Identity lookup or registration failure
    Identity(IdentityError),
    /// Media capability failure
    Media(MediaError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Identity(e) => write!(f, "identity error: {}", e),
            Error::Media(e) => write!(f, "media error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Error::Identity(e)
    }
}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        Error::Media(e)
    }
}

/// Errors produced by identity registration and lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Camera id is not present in the registry
    CameraNotFound(String),
    /// The signaling socket is not open
    NotConnected,
    /// A camera with this id is already registered locally
    AlreadyRegistered(String),
    /// The operation needs a registered camera identity
    NotRegistered,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::CameraNotFound(id) => write!(f, "camera not found: {}", id),
            IdentityError::NotConnected => write!(f, "signaling socket is not connected"),
            IdentityError::AlreadyRegistered(id) => {
                write!(f, "camera already registered: {}", id)
            }
            IdentityError::NotRegistered => write!(f, "no camera identity registered"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// Errors produced by the media capability adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Local capture hardware or permission is unavailable
    CaptureUnavailable(String),
    /// Peer negotiation timed out or was rejected
    NegotiationFailed(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::CaptureUnavailable(reason) => {
                write!(f, "capture unavailable: {}", reason)
            }
            MediaError::NegotiationFailed(reason) => {
                write!(f, "negotiation failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for MediaError {}
