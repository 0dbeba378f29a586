use serde::{Deserialize, Serialize};

/// A playable track, carried inside its parent album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique within the parent album only
    pub id: String,
    pub title: String,
    pub url: String,
}

/// An album record as stored by the album API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Server-assigned identifier
    pub id: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub image: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    pub download_url: String,
}

/// Album payload for creation; the server assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlbum {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub image: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    pub download_url: String,
}

impl Album {
    /// Strip the id, e.g. to re-submit an existing record as a new one
    pub fn without_id(&self) -> NewAlbum {
        NewAlbum {
            title: self.title.clone(),
            artist: self.artist.clone(),
            genre: self.genre.clone(),
            image: self.image.clone(),
            tracks: self.tracks.clone(),
            download_url: self.download_url.clone(),
        }
    }
}

impl NewAlbum {
    pub fn with_id(self, id: impl Into<String>) -> Album {
        Album {
            id: id.into(),
            title: self.title,
            artist: self.artist,
            genre: self.genre,
            image: self.image,
            tracks: self.tracks,
            download_url: self.download_url,
        }
    }
}
