//! Client-side album cache kept in sync with a remote album API.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod router;
pub mod store;

pub use api::{AlbumApi, HttpAlbumApi};
pub use auth::{CredentialProvider, Principal, Session, SessionProvider};
pub use error::{ApiError, ErrorKind, Operation, StoreError};
pub use model::{Album, NewAlbum, Track};
pub use store::{AlbumState, AlbumStore};
