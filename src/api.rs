use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, RequestBuilder, Response};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::{Album, NewAlbum};

/// Remote album resource API
///
/// Every call takes the bearer token explicitly; adapters never cache
/// credentials. Ownership scoping is enforced server-side.
#[async_trait]
pub trait AlbumApi: Send + Sync {
    /// Every album visible to the caller
    async fn list_albums(&self, token: &str) -> Result<Vec<Album>, ApiError>;

    /// Albums owned by the token's principal
    async fn list_user_albums(&self, token: &str) -> Result<Vec<Album>, ApiError>;

    /// Create an album; the server assigns the id
    async fn create_album(&self, token: &str, album: &NewAlbum) -> Result<Album, ApiError>;

    /// Replace the album identified by `album.id`
    async fn update_album(&self, token: &str, album: &Album) -> Result<Album, ApiError>;

    async fn delete_album(&self, token: &str, id: &str) -> Result<(), ApiError>;
}

/// reqwest-backed [`AlbumApi`]
pub struct HttpAlbumApi {
    base_url: String,
    http_client: HttpClient,
}

impl HttpAlbumApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self::with_client(&config.base_url, builder.build()?))
    }

    pub fn with_client(base_url: &str, http_client: HttpClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        self.base_url.clone()
    }

    fn user_url(&self) -> String {
        format!("{}/user", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(id))
    }

    async fn send(&self, request: RequestBuilder, token: &str) -> Result<Response, ApiError> {
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl AlbumApi for HttpAlbumApi {
    async fn list_albums(&self, token: &str) -> Result<Vec<Album>, ApiError> {
        let url = self.collection_url();
        tracing::debug!("GET {}", url);
        let response = self.send(self.http_client.get(&url), token).await?;
        Ok(response.json().await?)
    }

    async fn list_user_albums(&self, token: &str) -> Result<Vec<Album>, ApiError> {
        let url = self.user_url();
        tracing::debug!("GET {}", url);
        let response = self.send(self.http_client.get(&url), token).await?;
        Ok(response.json().await?)
    }

    async fn create_album(&self, token: &str, album: &NewAlbum) -> Result<Album, ApiError> {
        let url = self.collection_url();
        tracing::debug!("POST {} ({})", url, album.title);
        let response = self
            .send(self.http_client.post(&url).json(album), token)
            .await?;
        Ok(response.json().await?)
    }

    async fn update_album(&self, token: &str, album: &Album) -> Result<Album, ApiError> {
        let url = self.item_url(&album.id);
        tracing::debug!("PUT {}", url);
        let response = self
            .send(self.http_client.put(&url).json(album), token)
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_album(&self, token: &str, id: &str) -> Result<(), ApiError> {
        let url = self.item_url(id);
        tracing::debug!("DELETE {}", url);
        // Body is ignored; 204 and 200-with-payload both count as success
        self.send(self.http_client.delete(&url), token).await?;
        Ok(())
    }
}
