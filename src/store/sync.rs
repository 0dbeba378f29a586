//! Server round-trips.
//!
//! Every operation follows the same shape: clear `error` and mark itself in
//! flight, obtain a bearer token, call the API, then apply the outcome to the
//! state in a single `send_modify`. Failures of any cause end up as the
//! operation's fixed message in `error` and are also returned to the caller.

use std::future::Future;

use tokio::sync::watch;

use super::state::AlbumState;
use super::AlbumStore;
use crate::error::{ApiError, Operation, StoreError};
use crate::model::{Album, NewAlbum};

impl AlbumStore {
    /// Reload the global catalog
    pub async fn fetch_albums(&self) -> Result<(), StoreError> {
        let api = &self.api;
        self.run(
            Operation::FetchAlbums,
            |token| async move { api.list_albums(&token).await },
            |state, albums| {
                tracing::debug!("Loaded {} albums", albums.len());
                state.set_albums(albums);
            },
        )
        .await
        .map(drop)
    }

    /// Reload the signed-in user's albums. The genre index is not touched.
    pub async fn fetch_user_albums(&self) -> Result<(), StoreError> {
        let api = &self.api;
        self.run(
            Operation::FetchUserAlbums,
            |token| async move { api.list_user_albums(&token).await },
            |state, albums| {
                tracing::debug!("Loaded {} user albums", albums.len());
                state.user_albums = albums;
            },
        )
        .await
        .map(drop)
    }

    /// Create an album and append the server's record to the catalog.
    ///
    /// `user_albums` is left alone; call `fetch_user_albums` to see the new
    /// album there.
    pub async fn add_album(&self, album: NewAlbum) -> Result<Album, StoreError> {
        let api = &self.api;
        let album = &album;
        self.run(
            Operation::AddAlbum,
            |token| async move { api.create_album(&token, album).await },
            |state, created| state.push_album(created),
        )
        .await
    }

    /// Replace an album server-side, then patch whichever local collections
    /// already hold it
    pub async fn update_album(&self, album: Album) -> Result<Album, StoreError> {
        let api = &self.api;
        let album = &album;
        self.run(
            Operation::UpdateAlbum,
            |token| async move { api.update_album(&token, album).await },
            |state, updated| {
                let (in_albums, in_user_albums) = state.replace_album(&updated);
                tracing::debug!(
                    "Updated album {} (catalog: {}, user: {})",
                    updated.id,
                    in_albums,
                    in_user_albums
                );
            },
        )
        .await
    }

    /// Delete an album server-side, then drop it from both local collections
    pub async fn delete_album(&self, id: &str) -> Result<(), StoreError> {
        let api = &self.api;
        self.run(
            Operation::DeleteAlbum,
            |token| async move { api.delete_album(&token, id).await },
            |state, ()| {
                let (in_albums, in_user_albums) = state.remove_album(id);
                tracing::debug!(
                    "Deleted album {} (catalog: {}, user: {})",
                    id,
                    in_albums,
                    in_user_albums
                );
            },
        )
        .await
    }

    async fn bearer_token(&self, op: Operation) -> Result<String, StoreError> {
        let principal = self
            .credentials
            .current_principal()
            .ok_or_else(|| StoreError::unauthenticated(op))?;

        principal
            .get_token()
            .await
            .map_err(|e| StoreError::credential(op, &e))
    }

    async fn run<T, F, Fut, A>(&self, op: Operation, call: F, apply: A) -> Result<T, StoreError>
    where
        T: Clone,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        A: FnOnce(&mut AlbumState, T),
    {
        let in_flight = InFlight::begin(&self.state);

        let outcome = match self.bearer_token(op).await {
            Ok(token) => call(token)
                .await
                .map_err(|e| StoreError::transport(op, &e)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                in_flight.finish(|s| apply(s, value.clone()));
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", op, e);
                in_flight.finish(|s| s.error = Some(op.failure_message().to_string()));
                Err(e)
            }
        }
    }
}

/// Counts one operation in `in_flight` until it finishes or its future is dropped
struct InFlight<'a> {
    state: &'a watch::Sender<AlbumState>,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a watch::Sender<AlbumState>) -> Self {
        state.send_modify(|s| {
            s.error = None;
            s.in_flight += 1;
        });
        Self {
            state,
            finished: false,
        }
    }

    /// Leave the in-flight set and apply the outcome in one state change
    fn finish(mut self, apply: impl FnOnce(&mut AlbumState)) {
        self.finished = true;
        self.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            apply(s);
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Album operation dropped before completion");
            self.state
                .send_modify(|s| s.in_flight = s.in_flight.saturating_sub(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::AlbumApi;
    use crate::auth::{Session, SessionProvider};
    use crate::error::ErrorKind;
    use crate::store::ALL_GENRES;

    const TOKEN: &str = "test-token";

    /// In-memory album API that checks the bearer token and counts calls
    #[derive(Default)]
    struct FakeApi {
        server: Mutex<Vec<Album>>,
        mine: Mutex<Vec<Album>>,
        calls: AtomicUsize,
        next_id: AtomicUsize,
        fail_with: Mutex<Option<u16>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeApi {
        fn with_albums(albums: Vec<Album>) -> Self {
            Self {
                server: Mutex::new(albums),
                next_id: AtomicUsize::new(100),
                ..Self::default()
            }
        }

        fn failing(status: u16) -> Self {
            let api = Self::default();
            *api.fail_with.lock().unwrap() = Some(status);
            api
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self, token: &str) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if token != TOKEN {
                return Err(ApiError::Status {
                    status: 401,
                    body: "bad token".to_string(),
                });
            }
            if let Some(status) = *self.fail_with.lock().unwrap() {
                return Err(ApiError::Status {
                    status,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AlbumApi for FakeApi {
        async fn list_albums(&self, token: &str) -> Result<Vec<Album>, ApiError> {
            self.enter(token).await?;
            Ok(self.server.lock().unwrap().clone())
        }

        async fn list_user_albums(&self, token: &str) -> Result<Vec<Album>, ApiError> {
            self.enter(token).await?;
            Ok(self.mine.lock().unwrap().clone())
        }

        async fn create_album(&self, token: &str, album: &NewAlbum) -> Result<Album, ApiError> {
            self.enter(token).await?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            let created = album.clone().with_id(id);
            self.server.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update_album(&self, token: &str, album: &Album) -> Result<Album, ApiError> {
            self.enter(token).await?;
            Ok(album.clone())
        }

        async fn delete_album(&self, token: &str, id: &str) -> Result<(), ApiError> {
            self.enter(token).await?;
            self.server.lock().unwrap().retain(|a| a.id != id);
            Ok(())
        }
    }

    fn album(id: &str, genre: &str) -> Album {
        new_album(genre).with_id(id)
    }

    fn new_album(genre: &str) -> NewAlbum {
        NewAlbum {
            title: format!("{} record", genre),
            artist: "Some Artist".to_string(),
            genre: genre.to_string(),
            image: "cover.jpg".to_string(),
            tracks: vec![],
            download_url: "album.zip".to_string(),
        }
    }

    fn signed_in() -> Arc<SessionProvider> {
        let provider = SessionProvider::new();
        provider.sign_in(Session::new("user-1", TOKEN)).unwrap();
        Arc::new(provider)
    }

    fn store_with(api: Arc<FakeApi>, provider: Arc<SessionProvider>) -> AlbumStore {
        AlbumStore::new(api, provider)
    }

    #[test]
    fn test_set_albums_rebuilds_genres() {
        let store = store_with(Arc::new(FakeApi::default()), signed_in());
        store.set_albums(vec![album("1", "Rock"), album("2", "Jazz"), album("3", "rock")]);

        assert_eq!(store.genres(), vec!["all genres", "rock", "jazz"]);

        store.set_albums(vec![]);
        assert_eq!(store.genres(), vec![ALL_GENRES]);
    }

    #[test]
    fn test_get_album_by_id_ignores_user_albums() {
        let store = store_with(Arc::new(FakeApi::default()), signed_in());
        store.set_albums(vec![album("1", "Rock")]);
        store.state.send_modify(|s| s.user_albums = vec![album("2", "Pop")]);

        assert_eq!(store.get_album_by_id("1").unwrap().genre, "Rock");
        assert!(store.get_album_by_id("2").is_none());
    }

    #[test]
    fn test_albums_by_genre() {
        let store = store_with(Arc::new(FakeApi::default()), signed_in());
        store.set_albums(vec![album("1", "Rock"), album("2", "Jazz"), album("3", "ROCK")]);

        assert_eq!(store.albums_by_genre("all genres").len(), 3);
        let rock: Vec<String> = store.albums_by_genre("rock").into_iter().map(|a| a.id).collect();
        assert_eq!(rock, vec!["1", "3"]);
        assert!(store.albums_by_genre("metal").is_empty());
    }

    #[tokio::test]
    async fn test_fetch_albums_replaces_catalog() {
        let api = Arc::new(FakeApi::with_albums(vec![album("1", "Rock"), album("2", "Jazz")]));
        let store = store_with(api.clone(), signed_in());
        store.set_albums(vec![album("old", "Polka")]);

        store.fetch_albums().await.unwrap();

        assert_eq!(store.albums().len(), 2);
        assert_eq!(store.genres(), vec!["all genres", "rock", "jazz"]);
        assert!(!store.is_loading());
        assert!(store.error().is_none());
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_user_albums_leaves_genres() {
        let api = Arc::new(FakeApi::default());
        *api.mine.lock().unwrap() = vec![album("7", "Metal")];
        let store = store_with(api, signed_in());

        store.fetch_user_albums().await.unwrap();

        assert_eq!(store.user_albums().len(), 1);
        assert_eq!(store.genres(), vec![ALL_GENRES]);
        assert!(store.albums().is_empty());
    }

    #[tokio::test]
    async fn test_add_album_appends_to_catalog_only() {
        let api = Arc::new(FakeApi::with_albums(vec![]));
        let store = store_with(api, signed_in());
        store.set_albums(vec![album("1", "Rock")]);
        store.state.send_modify(|s| s.user_albums = vec![album("1", "Rock")]);

        let created = store.add_album(new_album("Jazz")).await.unwrap();

        let albums = store.albums();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[1], created);
        assert!(!created.id.is_empty());
        assert_eq!(store.genres(), vec!["all genres", "rock", "jazz"]);
        assert_eq!(store.user_albums().len(), 1);
    }

    #[tokio::test]
    async fn test_update_album_patches_both_collections() {
        let api = Arc::new(FakeApi::default());
        let store = store_with(api, signed_in());
        store.set_albums(vec![album("1", "Rock"), album("2", "Pop")]);
        store.state.send_modify(|s| s.user_albums = vec![album("2", "Pop"), album("3", "Folk")]);

        let mut changed = album("2", "Pop");
        changed.title = "Renamed".to_string();
        changed.genre = "Soul".to_string();
        let returned = store.update_album(changed.clone()).await.unwrap();

        assert_eq!(returned, changed);
        assert_eq!(store.albums()[1], changed);
        assert_eq!(store.user_albums()[0], changed);
        assert_eq!(store.albums()[0], album("1", "Rock"));
        assert_eq!(store.user_albums()[1], album("3", "Folk"));
        assert_eq!(store.genres(), vec!["all genres", "rock", "soul"]);
    }

    #[tokio::test]
    async fn test_update_unknown_album_inserts_nothing() {
        let store = store_with(Arc::new(FakeApi::default()), signed_in());
        store.set_albums(vec![album("1", "Rock")]);
        store.state.send_modify(|s| s.user_albums = vec![album("3", "Folk")]);
        let before = store.snapshot();

        store.update_album(album("99", "Metal")).await.unwrap();

        let after = store.snapshot();
        assert_eq!(after.albums, before.albums);
        assert_eq!(after.user_albums, before.user_albums);
    }

    #[tokio::test]
    async fn test_delete_album_removes_from_both_collections() {
        let api = Arc::new(FakeApi::with_albums(vec![album("1", "Rock"), album("2", "Jazz")]));
        let store = store_with(api, signed_in());
        store.set_albums(vec![album("1", "Rock"), album("2", "Jazz")]);
        store.state.send_modify(|s| s.user_albums = vec![album("2", "Jazz")]);

        store.delete_album("2").await.unwrap();

        assert!(store.albums().iter().all(|a| a.id != "2"));
        assert!(store.user_albums().is_empty());
        assert_eq!(store.genres(), vec!["all genres", "rock"]);
    }

    #[tokio::test]
    async fn test_unauthenticated_operations_never_reach_api() {
        let api = Arc::new(FakeApi::with_albums(vec![album("9", "Rock")]));
        let store = store_with(api.clone(), Arc::new(SessionProvider::new()));
        store.set_albums(vec![album("1", "Rock")]);
        let before = store.snapshot();

        let err = store.fetch_albums().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
        assert_eq!(store.error().as_deref(), Some("Failed to fetch albums"));

        assert!(store.fetch_user_albums().await.is_err());
        assert!(store.add_album(new_album("Jazz")).await.is_err());
        assert!(store.update_album(album("1", "Jazz")).await.is_err());
        let err = store.delete_album("1").await.unwrap_err();
        assert_eq!(err.op, Operation::DeleteAlbum);
        assert_eq!(store.error().as_deref(), Some("Failed to delete album"));

        let after = store.snapshot();
        assert_eq!(after.albums, before.albums);
        assert_eq!(after.user_albums, before.user_albums);
        assert_eq!(after.genres(), before.genres());
        assert!(!after.is_loading());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_credential_failure_is_reported() {
        let api = Arc::new(FakeApi::default());
        let provider = SessionProvider::new();
        provider.sign_in(Session::new("user-1", "")).unwrap();
        let store = store_with(api.clone(), Arc::new(provider));

        let err = store.fetch_user_albums().await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::CredentialFailure);
        assert_eq!(store.error().as_deref(), Some("Failed to fetch user albums"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_server_rejection_keeps_state() {
        let api = Arc::new(FakeApi::failing(500));
        let store = store_with(api, signed_in());
        store.set_albums(vec![album("1", "Rock")]);

        let err = store.add_album(new_album("Jazz")).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::TransportFailure);
        assert_eq!(store.error().as_deref(), Some("Failed to add album"));
        assert_eq!(store.albums().len(), 1);
        assert_eq!(store.genres(), vec!["all genres", "rock"]);
    }

    #[tokio::test]
    async fn test_error_cleared_when_next_operation_starts() {
        let provider = signed_in();
        let store = store_with(Arc::new(FakeApi::default()), provider.clone());

        provider.sign_out().unwrap();
        assert!(store.fetch_albums().await.is_err());
        assert!(store.error().is_some());

        provider.sign_in(Session::new("user-1", TOKEN)).unwrap();
        store.fetch_albums().await.unwrap();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_is_loading_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::with_albums(vec![album("1", "Rock")])
        });
        let store = store_with(api, signed_in());
        store.state.send_modify(|s| s.error = Some("stale".to_string()));

        let (result, ()) = tokio::join!(store.fetch_albums(), async {
            assert!(store.is_loading());
            assert!(store.error().is_none());
            gate.notify_one();
        });

        result.unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.albums().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_operation_stops_loading() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::with_albums(vec![album("1", "Rock")])
        });
        let store = store_with(api.clone(), signed_in());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), store.fetch_albums()).await;

        assert!(timed_out.is_err());
        assert_eq!(api.calls(), 1);
        assert!(!store.is_loading());
        assert!(store.albums().is_empty());
        assert!(store.error().is_none());

        gate.notify_one();
        store.fetch_albums().await.unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.albums().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_both_land() {
        let api = Arc::new(FakeApi::with_albums(vec![album("1", "Rock")]));
        *api.mine.lock().unwrap() = vec![album("1", "Rock")];
        let store = store_with(api.clone(), signed_in());

        let (all, mine) = tokio::join!(store.fetch_albums(), store.fetch_user_albums());

        all.unwrap();
        mine.unwrap();
        assert_eq!(store.albums().len(), 1);
        assert_eq!(store.user_albums().len(), 1);
        assert!(!store.is_loading());
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_complete_snapshots() {
        let api = Arc::new(FakeApi::with_albums(vec![album("1", "Rock"), album("2", "Jazz")]));
        let store = store_with(api, signed_in());
        let mut rx = store.subscribe();

        store.fetch_albums().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.albums.len(), 2);
        assert_eq!(seen.genres(), ["all genres", "rock", "jazz"]);
        assert!(!seen.is_loading());
    }

    #[tokio::test]
    async fn test_add_album_scenario_from_rock_to_jazz() {
        let api = Arc::new(FakeApi::with_albums(vec![album("1", "Rock")]));
        api.next_id.store(2, Ordering::SeqCst);
        let store = store_with(api, signed_in());
        store.set_albums(vec![album("1", "Rock")]);

        let created = store.add_album(new_album("Jazz")).await.unwrap();

        assert_eq!(created.id, "2");
        assert_eq!(store.albums().len(), 2);
        assert_eq!(store.genres(), vec!["all genres", "rock", "jazz"]);
    }
}
