use std::fmt;

/// Store operations that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchAlbums,
    FetchUserAlbums,
    AddAlbum,
    UpdateAlbum,
    DeleteAlbum,
}

impl Operation {
    /// Fixed message written to the store's `error` field when this operation fails
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::FetchAlbums => "Failed to fetch albums",
            Operation::FetchUserAlbums => "Failed to fetch user albums",
            Operation::AddAlbum => "Failed to add album",
            Operation::UpdateAlbum => "Failed to update album",
            Operation::DeleteAlbum => "Failed to delete album",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::FetchAlbums => write!(f, "fetch_albums"),
            Operation::FetchUserAlbums => write!(f, "fetch_user_albums"),
            Operation::AddAlbum => write!(f, "add_album"),
            Operation::UpdateAlbum => write!(f, "update_album"),
            Operation::DeleteAlbum => write!(f, "delete_album"),
        }
    }
}

/// Coarse failure cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No principal at call time
    Unauthenticated,
    /// The principal could not produce a token
    CredentialFailure,
    /// Network error or non-success response
    TransportFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthenticated => write!(f, "unauthenticated"),
            ErrorKind::CredentialFailure => write!(f, "credential failure"),
            ErrorKind::TransportFailure => write!(f, "transport failure"),
        }
    }
}

/// Error returned by album API adapters
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Failure of a single store operation
///
/// The same failure is also recorded as `Operation::failure_message` in the
/// store state, so callers may ignore this value and observe the state instead.
#[derive(Debug, thiserror::Error)]
#[error("{msg} ({kind}): {detail}", msg = .op.failure_message())]
pub struct StoreError {
    pub op: Operation,
    pub kind: ErrorKind,
    pub detail: String,
}

impl StoreError {
    pub fn new(op: Operation, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            op,
            kind,
            detail: detail.into(),
        }
    }

    pub fn unauthenticated(op: Operation) -> Self {
        Self::new(op, ErrorKind::Unauthenticated, "no signed-in user")
    }

    pub fn credential(op: Operation, err: &anyhow::Error) -> Self {
        Self::new(op, ErrorKind::CredentialFailure, format!("{err:#}"))
    }

    pub fn transport(op: Operation, err: &ApiError) -> Self {
        Self::new(op, ErrorKind::TransportFailure, err.to_string())
    }
}
