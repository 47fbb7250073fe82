//! Error types for pagemodel operations.

use thiserror::Error;

use crate::marker::ElementKey;

/// Errors raised while building, freezing, or rendering content nodes.
///
/// Everything except [`Error::Io`] is a programming error: the violating
/// call is rejected immediately and the node is left unchanged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mutator was called on a node that has already been frozen.
    #[error("node is frozen")]
    Frozen,

    /// A single-assignment field was set a second time.
    #[error("{0} already set")]
    AlreadySet(&'static str),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("duplicate property: {0}")]
    DuplicateProperty(String),

    #[error("duplicate author: {0}")]
    DuplicateAuthor(String),

    #[error("duplicate parent: {0}")]
    DuplicateParentPage(String),

    #[error("duplicate child: {0}")]
    DuplicateChildPage(String),

    /// The parent element lives on a different page than the child.
    #[error("parent element is not on the same page")]
    PageMismatch,

    /// An explicit id does not match `[A-Za-z][A-Za-z0-9:_.-]*`.
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid author: {0}")]
    InvalidAuthor(&'static str),

    /// Fresh keys kept colliding with registered ones.
    #[error("no unused element key found after {attempts} attempts")]
    AllocatorExhausted { attempts: u32 },

    /// A well-formed marker had no registered writer (strict scanning only).
    #[error("element writer not found by key: {0}")]
    UnresolvedMarker(ElementKey),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
