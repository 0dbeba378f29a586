use std::collections::HashSet;

use crate::model::Album;

/// Leading entry of every genre index
pub const ALL_GENRES: &str = "all genres";

/// One consistent snapshot of everything the store publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumState {
    /// Global visible catalog
    pub albums: Vec<Album>,
    /// Albums owned by the signed-in user
    pub user_albums: Vec<Album>,
    /// Derived from `albums`; only rewritten by `refresh_genres`
    genres: Vec<String>,
    /// Operations currently awaiting the network
    pub in_flight: usize,
    pub error: Option<String>,
}

impl Default for AlbumState {
    fn default() -> Self {
        Self {
            albums: Vec::new(),
            user_albums: Vec::new(),
            genres: derive_genres(&[]),
            in_flight: 0,
            error: None,
        }
    }
}

impl AlbumState {
    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn set_albums(&mut self, albums: Vec<Album>) {
        self.albums = albums;
        self.refresh_genres();
    }

    pub fn push_album(&mut self, album: Album) {
        self.albums.push(album);
        self.refresh_genres();
    }

    /// Replace every entry with the same id in each collection that holds one.
    /// Returns whether `albums` and `user_albums` were patched.
    pub fn replace_album(&mut self, album: &Album) -> (bool, bool) {
        let in_albums = replace_by_id(&mut self.albums, album);
        let in_user_albums = replace_by_id(&mut self.user_albums, album);
        self.refresh_genres();
        (in_albums, in_user_albums)
    }

    /// Drop every entry with `id` from each collection that holds one
    pub fn remove_album(&mut self, id: &str) -> (bool, bool) {
        let in_albums = remove_by_id(&mut self.albums, id);
        let in_user_albums = remove_by_id(&mut self.user_albums, id);
        self.refresh_genres();
        (in_albums, in_user_albums)
    }

    fn refresh_genres(&mut self) {
        self.genres = derive_genres(&self.albums);
    }
}

/// `["all genres", <distinct lowercase genres in first-seen order>]`
pub fn derive_genres(albums: &[Album]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut genres = vec![ALL_GENRES.to_string()];

    for album in albums {
        let genre = album.genre.to_lowercase();
        if seen.insert(genre.clone()) {
            genres.push(genre);
        }
    }

    genres
}

fn replace_by_id(albums: &mut [Album], album: &Album) -> bool {
    let mut replaced = false;
    for slot in albums.iter_mut().filter(|a| a.id == album.id) {
        *slot = album.clone();
        replaced = true;
    }
    replaced
}

fn remove_by_id(albums: &mut Vec<Album>, id: &str) -> bool {
    let before = albums.len();
    albums.retain(|a| a.id != id);
    albums.len() != before
}
