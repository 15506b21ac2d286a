use changetracker_path::PathError;
use thiserror::Error;

use crate::value::{KeyKind, Kind};

/// Navigation and mutation failures reported by a [`Resolver`](crate::Resolver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("cannot navigate through null")]
    NilNavigation,

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("field {0} is not accessible")]
    NotAccessible(String),

    #[error("{0} cannot be set")]
    NotSettable(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key {key:?} does not match map key type {expected}")]
    KeyTypeMismatch { key: String, expected: KeyKind },

    #[error("map value type mismatch: expected {expected}, found {found}")]
    ValueTypeMismatch { expected: Kind, found: Kind },

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot navigate {element:?} on {container}")]
    UnsupportedContainer { element: String, container: String },

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("method {method} takes {found} argument(s), expected {expected}")]
    MethodArity {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("method {0} returns no value")]
    NoReturnValue(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: Kind },

    #[error("{0} is a setter call and cannot be read")]
    WriteOnlyElement(String),

    #[error("value is already borrowed")]
    AlreadyBorrowed,
}

/// Value JSON encoding and decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("nested arrays are not allowed (element {index})")]
    NestedArrayNotAllowed { index: usize },

    #[error("Bad object reference: {0}")]
    BadObjectReference(i64),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Tracker-level failures.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(i64),

    #[error("parent {parent_id} of variable {id} not found")]
    ParentNotFound { id: i64, parent_id: i64 },

    #[error("variable {0} is not readable")]
    NotReadable(i64),

    #[error("variable {0} is not writable")]
    NotWritable(i64),
}
