//! # Poll Error Types Module
//!
//! This module defines the error types used by the deep-link codec and the
//! poll flow. Transition-level rejections live in `state_machine` because
//! they never leave the core.

/// Reasons a deep-link token could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No token was supplied
    Empty,
    /// Token is not valid URL-safe base64
    Encoding(String),
    /// Decoded payload is not UTF-8
    Utf8,
    /// Payload starts with an unknown kind tag
    UnknownKind(String),
    /// An id segment is not a number
    InvalidId(String),
    /// Wrong number of ids for the kind
    Arity {
        kind: String,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "Empty deep-link token"),
            DecodeError::Encoding(msg) => write!(f, "Invalid token encoding: {msg}"),
            DecodeError::Utf8 => write!(f, "Token payload is not valid UTF-8"),
            DecodeError::UnknownKind(kind) => write!(f, "Unknown deep-link kind: {kind:?}"),
            DecodeError::InvalidId(id) => write!(f, "Invalid deep-link id: {id:?}"),
            DecodeError::Arity {
                kind,
                expected,
                found,
            } => write!(
                f,
                "Deep-link kind {kind:?} expects {expected} id(s), found {found}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors surfaced by the poll service
#[derive(Debug)]
pub enum PollError {
    /// Entry token could not be decoded
    InvalidToken(DecodeError),
    /// Token decoded but names no known teacher/group
    SubjectNotFound,
    /// A collaborator lookup (subjects, questions, prior results) failed
    Collaborator(anyhow::Error),
    /// The finished response could not be stored
    Persist(anyhow::Error),
    /// Delivering output to the chat failed
    Presentation(anyhow::Error),
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::InvalidToken(err) => write!(f, "Invalid entry token: {err}"),
            PollError::SubjectNotFound => write!(f, "Subject not found"),
            PollError::Collaborator(err) => write!(f, "Collaborator error: {err}"),
            PollError::Persist(err) => write!(f, "Failed to persist poll result: {err}"),
            PollError::Presentation(err) => write!(f, "Failed to deliver poll output: {err}"),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::InvalidToken(err) => Some(err),
            PollError::SubjectNotFound => None,
            PollError::Collaborator(err) | PollError::Persist(err) | PollError::Presentation(err) => {
                Some(&**err)
            }
        }
    }
}

impl From<DecodeError> for PollError {
    fn from(err: DecodeError) -> Self {
        PollError::InvalidToken(err)
    }
}
