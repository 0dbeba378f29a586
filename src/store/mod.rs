//! Album state store.
//!
//! Holds the global catalog, the signed-in user's albums and the derived
//! genre index, and publishes them as one snapshot through a
//! `tokio::sync::watch` channel. The store is the only writer; views read
//! clones or subscribe.
//!
//! `add_album` appends to the catalog only. The user's own collection does
//! not see a new album until `fetch_user_albums` runs again.

pub mod state;
mod sync;

use std::sync::Arc;

use tokio::sync::watch;

use crate::api::AlbumApi;
use crate::auth::CredentialProvider;
use crate::model::Album;

pub use state::{derive_genres, AlbumState, ALL_GENRES};

pub struct AlbumStore {
    api: Arc<dyn AlbumApi>,
    credentials: Arc<dyn CredentialProvider>,
    state: watch::Sender<AlbumState>,
}

impl AlbumStore {
    pub fn new(api: Arc<dyn AlbumApi>, credentials: Arc<dyn CredentialProvider>) -> Self {
        let (state, _) = watch::channel(AlbumState::default());
        Self {
            api,
            credentials,
            state,
        }
    }

    /// Receiver notified after every completed state change
    pub fn subscribe(&self) -> watch::Receiver<AlbumState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AlbumState {
        self.state.borrow().clone()
    }

    pub fn albums(&self) -> Vec<Album> {
        self.state.borrow().albums.clone()
    }

    pub fn user_albums(&self) -> Vec<Album> {
        self.state.borrow().user_albums.clone()
    }

    pub fn genres(&self) -> Vec<String> {
        self.state.borrow().genres().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Replace the whole catalog and rebuild the genre index. No I/O.
    pub fn set_albums(&self, albums: Vec<Album>) {
        self.state.send_modify(|s| s.set_albums(albums));
    }

    /// First catalog entry with `id`; `user_albums` is never consulted
    pub fn get_album_by_id(&self, id: &str) -> Option<Album> {
        self.state.borrow().albums.iter().find(|a| a.id == id).cloned()
    }

    /// Catalog entries matching a genre index entry
    pub fn albums_by_genre(&self, genre: &str) -> Vec<Album> {
        let state = self.state.borrow();
        if genre.eq_ignore_ascii_case(ALL_GENRES) {
            return state.albums.clone();
        }

        let wanted = genre.to_lowercase();
        state
            .albums
            .iter()
            .filter(|a| a.genre.to_lowercase() == wanted)
            .cloned()
            .collect()
    }
}
