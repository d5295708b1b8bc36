//! Client for this crate's own HTTP API, used by the CLI and as the network
//! source behind the feed loaders.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;

use crate::feed::RecipeSource;
use crate::models::{RecipeFull, RecipePage};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlugBody {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct LikeBody {
    liked: bool,
}

#[derive(Debug, Deserialize)]
struct LikesBody {
    likes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn recipe_url(&self, slug: &str) -> String {
        self.url(&format!("/api/recipes/{}", urlencoding::encode(slug)))
    }

    pub async fn fetch_page(&self, page: u32) -> Result<RecipePage> {
        let response = self
            .http
            .get(self.url("/api/recipes"))
            .query(&[("page", page)])
            .send()
            .await
            .context("Failed to reach recipe API")?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// `Ok(None)` on 404.
    pub async fn fetch_recipe(&self, slug: &str) -> Result<Option<RecipeFull>> {
        let response = self
            .http
            .get(self.recipe_url(slug))
            .send()
            .await
            .context("Failed to reach recipe API")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }

    /// A random recipe slug other than `exclude`.
    pub async fn random_recipe(&self, exclude: Option<&str>) -> Result<String> {
        let mut request = self.http.get(self.url("/api/random-recipe"));
        if let Some(exclude) = exclude {
            request = request.query(&[("exclude", exclude)]);
        }
        let response = request.send().await.context("Failed to reach recipe API")?;
        let body: SlugBody = ensure_success(response).await?.json().await?;
        Ok(body.slug)
    }

    /// Delete a recipe with the edit token. Returns the server's message.
    pub async fn delete_recipe(&self, slug: &str, edit_token: &str) -> Result<Option<String>> {
        let response = self
            .http
            .delete(self.recipe_url(slug))
            .bearer_auth(edit_token)
            .header("content-type", "application/json")
            .send()
            .await
            .context("Failed to reach recipe API")?;
        let body: MessageBody = ensure_success(response).await?.json().await?;
        Ok(body.message)
    }

    pub async fn likes(&self, session_token: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.url("/api/recipes/likes"))
            .bearer_auth(session_token)
            .send()
            .await
            .context("Failed to reach recipe API")?;
        let body: LikesBody = ensure_success(response).await?.json().await?;
        Ok(body.likes)
    }

    async fn like_call(&self, method: Method, slug: &str, session_token: &str) -> Result<bool> {
        let response = self
            .http
            .request(method, format!("{}/like", self.recipe_url(slug)))
            .bearer_auth(session_token)
            .send()
            .await
            .context("Failed to reach recipe API")?;
        let body: LikeBody = ensure_success(response).await?.json().await?;
        Ok(body.liked)
    }

    pub async fn is_liked(&self, slug: &str, session_token: &str) -> Result<bool> {
        self.like_call(Method::GET, slug, session_token).await
    }

    /// Flip the like on `slug`. Returns whether it is now liked.
    pub async fn toggle_like(&self, slug: &str, session_token: &str) -> Result<bool> {
        self.like_call(Method::POST, slug, session_token).await
    }

    pub async fn unlike(&self, slug: &str, session_token: &str) -> Result<()> {
        self.like_call(Method::DELETE, slug, session_token).await?;
        Ok(())
    }
}

/// Fail with the `{error}` message of a non-success response, or its status
/// text when the body carries none.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    bail!("{} ({})", message, status.as_u16())
}

#[async_trait]
impl RecipeSource for ApiClient {
    async fn fetch_page(&self, page: u32) -> Result<RecipePage> {
        ApiClient::fetch_page(self, page).await
    }

    async fn fetch_recipe(&self, slug: &str) -> Result<Option<RecipeFull>> {
        ApiClient::fetch_recipe(self, slug).await
    }
}
