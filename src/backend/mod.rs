//! Client for the hosted backend: recipe rows, RPC, auth lookup and object
//! storage, spoken over its REST endpoints.

pub mod storage;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::auth::{SessionUser, SessionVerifier};
use crate::config::BackendSettings;
use crate::errors::BackendError;
use crate::models::{RecipeRow, RecipeSummaryRow};

const LIST_COLUMNS: &str = "slug,name,description,tags,image_url,prep_time_minutes,cook_time_minutes";

/// Operations the HTTP API needs from the backend.
#[async_trait]
pub trait Backend: SessionVerifier {
    /// One random slug from the `get_random_recipe` RPC, if any rows exist.
    async fn random_recipe_slug(&self) -> Result<Option<String>, BackendError>;

    /// One page of recipes, newest first, and the total row count.
    async fn list_recipes(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RecipeSummaryRow>, u64), BackendError>;

    async fn get_recipe(&self, slug: &str) -> Result<Option<RecipeRow>, BackendError>;

    /// Returns whether a row was deleted.
    async fn delete_recipe(&self, slug: &str) -> Result<bool, BackendError>;

    /// Slugs liked by `user_id`, most recent first.
    async fn list_likes(&self, user_id: &str) -> Result<Vec<String>, BackendError>;

    async fn recipe_exists(&self, slug: &str) -> Result<bool, BackendError>;

    async fn is_liked(&self, user_id: &str, slug: &str) -> Result<bool, BackendError>;

    async fn like(&self, user_id: &str, slug: &str) -> Result<(), BackendError>;

    async fn unlike(&self, user_id: &str, slug: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Deserialize)]
struct SlugRow {
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LikeRow {
    recipe_slug: String,
}

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    public_key: String,
    service_key: Option<String>,
    bucket: String,
}

impl SupabaseClient {
    /// Build a client from settings. Returns `None` (after a warning) when
    /// the URL or every key is missing.
    pub fn from_settings(settings: &BackendSettings) -> Option<Self> {
        let Some(url) = settings.url.as_deref() else {
            tracing::warn!(
                "Backend URL is missing; set NEXT_PUBLIC_SUPABASE_URL to enable database access"
            );
            return None;
        };
        let Some(public_key) = settings
            .anon_key
            .clone()
            .or_else(|| settings.service_role_key.clone())
        else {
            tracing::warn!(
                "Backend keys are missing; set NEXT_PUBLIC_SUPABASE_ANON_KEY or SUPABASE_SERVICE_ROLE_KEY"
            );
            return None;
        };

        Some(Self {
            http: Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            public_key,
            service_key: settings.service_role_key.clone(),
            bucket: settings.storage_bucket.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn with_key(&self, request: RequestBuilder, key: &str) -> RequestBuilder {
        request.header("apikey", key).bearer_auth(key)
    }

    fn public(&self, request: RequestBuilder) -> RequestBuilder {
        self.with_key(request, &self.public_key)
    }

    fn admin(&self, request: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let key = self.service_key.as_deref().ok_or(BackendError::NotConfigured)?;
        Ok(self.with_key(request, key))
    }
}

/// Turn a non-success response into `BackendError::Status`.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Total from a `Content-Range: 0-19/41` header.
fn parse_total(content_range: Option<&str>) -> Option<u64> {
    content_range?.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl SessionVerifier for SupabaseClient {
    async fn verify_session(&self, token: &str) -> Result<Option<SessionUser>, BackendError> {
        let key = self.service_key.as_deref().unwrap_or(&self.public_key);
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", key)
            .bearer_auth(token)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }

        let user = check(response).await?.json::<SessionUser>().await?;
        Ok(Some(user))
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn random_recipe_slug(&self) -> Result<Option<String>, BackendError> {
        let request = self
            .http
            .post(self.rest_url("rpc/get_random_recipe"))
            .json(&serde_json::json!({}));
        let rows: Vec<SlugRow> = check(self.public(request).send().await?)
            .await?
            .json()
            .await?;
        Ok(rows.into_iter().next().and_then(|row| row.slug))
    }

    async fn list_recipes(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RecipeSummaryRow>, u64), BackendError> {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
        let request = self
            .http
            .get(self.rest_url("recipes"))
            .header("Prefer", "count=exact")
            .query(&[
                ("select", LIST_COLUMNS.to_string()),
                ("order", "created_at.desc".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ]);
        let response = self.public(request).send().await?;

        let total = parse_total(
            response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok()),
        );

        // Past the last row the range is unsatisfiable; that is an empty page.
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok((Vec::new(), total.unwrap_or(0)));
        }

        let rows: Vec<RecipeSummaryRow> = check(response).await?.json().await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    async fn get_recipe(&self, slug: &str) -> Result<Option<RecipeRow>, BackendError> {
        let request = self.http.get(self.rest_url("recipes")).query(&[
            ("select", "*".to_string()),
            ("slug", format!("eq.{}", slug)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<RecipeRow> = check(self.public(request).send().await?)
            .await?
            .json()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_recipe(&self, slug: &str) -> Result<bool, BackendError> {
        let request = self
            .http
            .delete(self.rest_url("recipes"))
            .header("Prefer", "return=representation")
            .query(&[("slug", format!("eq.{}", slug))]);
        let deleted: Vec<SlugRow> = check(self.admin(request)?.send().await?)
            .await?
            .json()
            .await?;
        Ok(!deleted.is_empty())
    }

    async fn list_likes(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        let request = self.http.get(self.rest_url("recipe_likes")).query(&[
            ("select", "recipe_slug".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        let likes: Vec<LikeRow> = check(self.admin(request)?.send().await?)
            .await?
            .json()
            .await?;
        Ok(likes.into_iter().map(|like| like.recipe_slug).collect())
    }

    async fn recipe_exists(&self, slug: &str) -> Result<bool, BackendError> {
        let request = self.http.get(self.rest_url("recipes")).query(&[
            ("select", "slug".to_string()),
            ("slug", format!("eq.{}", slug)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<SlugRow> = check(self.public(request).send().await?)
            .await?
            .json()
            .await?;
        Ok(!rows.is_empty())
    }

    async fn is_liked(&self, user_id: &str, slug: &str) -> Result<bool, BackendError> {
        let request = self.http.get(self.rest_url("recipe_likes")).query(&[
            ("select", "id".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("recipe_slug", format!("eq.{}", slug)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<serde_json::Value> = check(self.admin(request)?.send().await?)
            .await?
            .json()
            .await?;
        Ok(!rows.is_empty())
    }

    async fn like(&self, user_id: &str, slug: &str) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.rest_url("recipe_likes"))
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "user_id": user_id, "recipe_slug": slug }));
        check(self.admin(request)?.send().await?).await?;
        Ok(())
    }

    async fn unlike(&self, user_id: &str, slug: &str) -> Result<(), BackendError> {
        let request = self.http.delete(self.rest_url("recipe_likes")).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("recipe_slug", format!("eq.{}", slug)),
        ]);
        check(self.admin(request)?.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn settings(url: &str, service: bool) -> BackendSettings {
        BackendSettings {
            url: Some(url.to_string()),
            anon_key: Some("anon".to_string()),
            service_role_key: service.then(|| "service".to_string()),
            storage_bucket: "recipe-images".to_string(),
        }
    }

    #[test]
    fn test_missing_settings_disable_client() {
        let mut missing_url = settings("http://x", false);
        missing_url.url = None;
        assert!(SupabaseClient::from_settings(&missing_url).is_none());

        let mut missing_keys = settings("http://x", false);
        missing_keys.anon_key = None;
        assert!(SupabaseClient::from_settings(&missing_keys).is_none());

        let client = SupabaseClient::from_settings(&settings("http://x/", false)).unwrap();
        assert_eq!(client.base_url(), "http://x");
    }

    #[test]
    fn test_parse_total() {
        assert_eq!(parse_total(Some("0-19/41")), Some(41));
        assert_eq!(parse_total(Some("*/0")), Some(0));
        assert_eq!(parse_total(Some("0-19/*")), None);
        assert_eq!(parse_total(None), None);
    }

    #[tokio::test]
    async fn test_random_recipe_slug_uses_rpc() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/get_random_recipe")
            .match_header("apikey", "anon")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"slug":"miso-soup"}]"#)
            .expect(1)
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), false)).unwrap();
        assert_eq!(client.random_recipe_slug().await.unwrap().as_deref(), Some("miso-soup"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_recipes_reads_count_header() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/recipes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("offset".into(), "20".into()),
                Matcher::UrlEncoded("limit".into(), "20".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .match_header("prefer", "count=exact")
            .with_status(206)
            .with_header("content-type", "application/json")
            .with_header("content-range", "20-20/21")
            .with_body(r#"[{"slug":"last","name":"Last","description":null,"tags":null,"image_url":null}]"#)
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), false)).unwrap();
        let (rows, total) = client.list_recipes(2, 20).await.unwrap();
        assert_eq!(total, 21);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "last");
    }

    #[tokio::test]
    async fn test_list_recipes_past_end_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/recipes")
            .match_query(Matcher::Any)
            .with_status(416)
            .with_header("content-range", "*/3")
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), false)).unwrap();
        let (rows, total) = client.list_recipes(9, 20).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_get_recipe_filters_by_slug() {
        let mut server = mockito::Server::new_async().await;
        let _found = server
            .mock("GET", "/rest/v1/recipes")
            .match_query(Matcher::UrlEncoded("slug".into(), "eq.stew".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"slug":"stew","name":"Stew","ingredients":"[]","instructions":"1. Cook","tags":["winter"]}]"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/rest/v1/recipes")
            .match_query(Matcher::UrlEncoded("slug".into(), "eq.nope".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), false)).unwrap();
        let row = client.get_recipe("stew").await.unwrap().unwrap();
        assert_eq!(row.tags, Some(vec!["winter".to_string()]));
        assert!(client.get_recipe("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_calls_need_service_key() {
        let client = SupabaseClient::from_settings(&settings("http://127.0.0.1:9", false)).unwrap();
        assert!(matches!(
            client.delete_recipe("x").await,
            Err(BackendError::NotConfigured)
        ));
        assert!(matches!(
            client.list_likes("u").await,
            Err(BackendError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_delete_recipe_reports_whether_row_existed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/rest/v1/recipes")
            .match_query(Matcher::UrlEncoded("slug".into(), "eq.stew".into()))
            .match_header("apikey", "service")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"slug":"stew"}]"#)
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), true)).unwrap();
        assert!(client.delete_recipe("stew").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_likes_and_errors() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/rest/v1/recipe_likes")
            .match_query(Matcher::UrlEncoded("user_id".into(), "eq.u1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"recipe_slug":"b"},{"recipe_slug":"a"}]"#)
            .create_async()
            .await;
        let _fail = server
            .mock("GET", "/rest/v1/recipe_likes")
            .match_query(Matcher::UrlEncoded("user_id".into(), "eq.u2".into()))
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), true)).unwrap();
        assert_eq!(client.list_likes("u1").await.unwrap(), vec!["b", "a"]);
        match client.list_likes("u2").await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_like_rows_are_written_with_service_key() {
        let mut server = mockito::Server::new_async().await;
        let liked = server
            .mock("GET", "/rest/v1/recipe_likes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("recipe_slug".into(), "eq.stew".into()),
            ]))
            .match_header("apikey", "service")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":7}]"#)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/rest/v1/recipe_likes")
            .match_body(Matcher::Json(
                serde_json::json!({ "user_id": "u1", "recipe_slug": "stew" }),
            ))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/rest/v1/recipe_likes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("recipe_slug".into(), "eq.stew".into()),
            ]))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), true)).unwrap();
        assert!(client.is_liked("u1", "stew").await.unwrap());
        client.like("u1", "stew").await.unwrap();
        client.unlike("u1", "stew").await.unwrap();
        liked.assert_async().await;
        insert.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_recipe_exists() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/recipes")
            .match_query(Matcher::UrlEncoded("select".into(), "slug".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), false)).unwrap();
        assert!(!client.recipe_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_session() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer good")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"user-1","email":"cook@example.com","role":"authenticated"}"#)
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer expired")
            .with_status(401)
            .with_body(r#"{"msg":"invalid JWT"}"#)
            .create_async()
            .await;

        let client = SupabaseClient::from_settings(&settings(&server.url(), true)).unwrap();
        let user = client.verify_session("good").await.unwrap().unwrap();
        assert_eq!(user.id, "user-1");
        assert!(client.verify_session("expired").await.unwrap().is_none());
    }
}
