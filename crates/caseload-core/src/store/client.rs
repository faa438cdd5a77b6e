//! PostgREST client for the hosted case-management database.
//!
//! Every table is exposed under `<url>/rest/v1/<table>`; filtering and ordering
//! are expressed as query parameters. Requests carry the anon key both as the
//! `apikey` header and as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{RemoteStore, StoreError};
use crate::config::RemoteConfig;
use crate::models::{Authorization, BillingClaim, NewStudent, Student, StudentUpdate, Teacher};

// ============================================================================
// Constants
// ============================================================================

/// REST root relative to the project URL
const REST_PATH: &str = "/rest/v1";

/// Stored procedure that upserts billing drafts from completed sessions
const DRAFT_RPC: &str = "generate_billing_drafts";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting, doubled on each retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Table queries, already ordered by each collection's natural key
const STUDENTS_QUERY: &str = "students?select=*&order=name.asc";
const TEACHERS_QUERY: &str = "teachers?select=*&order=name.asc";
const AUTHORIZATIONS_QUERY: &str = "authorizations?select=*,student:students(id,name,student_id),service:services(service_key,label,default_cpt_code)&order=authorization_number.asc";
const CLAIMS_QUERY: &str = "billing_claims?select=*&order=session_date.desc";

/// Client for the PostgREST API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl RestClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&config.anon_key)
            .map_err(|_| StoreError::InvalidConfig("anon key is not a valid header value".into()))?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", config.anon_key))
            .map_err(|_| StoreError::InvalidConfig("anon key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}{}", config.url.trim_end_matches('/'), REST_PATH),
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the rate-limit backoff (tests use a short one).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, retrying on 429 with exponential backoff.
    /// Any other non-success status is mapped through `StoreError::from_status`.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, StoreError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build().send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(StoreError::RateLimited);
                }
                warn!(
                    url = %response.url(),
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, StoreError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn get_list<T: DeserializeOwned>(&self, query: &str, what: &str) -> Result<Vec<T>, StoreError> {
        let url = self.url(query);
        debug!(url = %url, "Fetching collection");
        let response = self.send(|| self.client.get(&url)).await?;
        Self::parse(response, what).await
    }

    /// PostgREST answers writes made with `return=representation` with an
    /// array of the affected rows.
    async fn single_row<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, StoreError> {
        let mut rows: Vec<T> = Self::parse(response, what).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{} returned no rows", what)));
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl RemoteStore for RestClient {
    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        self.get_list(STUDENTS_QUERY, "students").await
    }

    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        self.get_list(TEACHERS_QUERY, "teachers").await
    }

    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError> {
        self.get_list(AUTHORIZATIONS_QUERY, "authorizations").await
    }

    async fn list_claims(&self) -> Result<Vec<BillingClaim>, StoreError> {
        self.get_list(CLAIMS_QUERY, "billing claims").await
    }

    async fn create_student(&self, student: &NewStudent) -> Result<Student, StoreError> {
        let url = self.url("students");
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(student)
            })
            .await?;
        Self::single_row(response, "student insert").await
    }

    async fn update_student(&self, id: &str, update: &StudentUpdate) -> Result<Student, StoreError> {
        let url = self.url("students");
        let filter = [("id", format!("eq.{}", id))];
        let response = self
            .send(|| {
                self.client
                    .patch(&url)
                    .query(&filter)
                    .header("Prefer", "return=representation")
                    .json(update)
            })
            .await?;
        Self::single_row(response, "student update").await
    }

    async fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        let url = self.url("students");
        let filter = [("id", format!("eq.{}", id))];
        self.send(|| self.client.delete(&url).query(&filter)).await?;
        Ok(())
    }

    async fn generate_billing_drafts(&self) -> Result<(), StoreError> {
        let url = self.url(&format!("rpc/{}", DRAFT_RPC));
        self.send(|| self.client.post(&url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const KEY: &str = "test-anon-key";

    fn client_for(server: &Server) -> RestClient {
        let config = RemoteConfig {
            url: server.url(),
            anon_key: KEY.to_string(),
            request_timeout: Duration::from_secs(5),
        };
        RestClient::new(&config)
            .expect("Failed to create client")
            .with_initial_backoff(Duration::from_millis(5))
    }

    fn student_json(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "name": name, "student_id": format!("S-{}", id), "age": 8,
            "grade": "3", "school": "Lincoln", "disability": "ADHD", "teacher_id": null,
            "profile_picture_url": null, "created_at": null, "updated_at": null
        })
    }

    #[tokio::test]
    async fn test_list_students_sends_key_and_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/students")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("order".into(), "name.asc".into()),
            ]))
            .match_header("apikey", KEY)
            .match_header("authorization", format!("Bearer {}", KEY).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!([student_json("1", "Alex"), student_json("2", "Emma")]).to_string())
            .create_async()
            .await;

        let students = client_for(&server).list_students().await.expect("list failed");

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "Alex");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_student_returns_representation() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/students")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::PartialJson(serde_json::json!({"name": "Chen"})))
            .with_status(201)
            .with_body(serde_json::json!([student_json("9", "Chen")]).to_string())
            .create_async()
            .await;

        let new_student = NewStudent {
            name: "Chen".to_string(),
            student_id: "S-9".to_string(),
            age: 8,
            grade: "3".to_string(),
            school: "Lincoln".to_string(),
            disability: "ADHD".to_string(),
            teacher_id: None,
            profile_picture_url: None,
        };
        let created = client_for(&server).create_student(&new_student).await.unwrap();

        assert_eq!(created.id, "9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_with_no_matching_row_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/students")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.missing".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let result = client_for(&server)
            .update_student("missing", &StudentUpdate::default())
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_student() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/rest/v1/students")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.4".into()))
            .with_status(204)
            .create_async()
            .await;

        client_for(&server).delete_student("4").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_id_filter_is_encoded() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/rest/v1/students")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.a&order=name, b".into()))
            .with_status(204)
            .create_async()
            .await;

        client_for(&server).delete_student("a&order=name, b").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_drafts_calls_rpc() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/generate_billing_drafts")
            .with_status(200)
            .with_body("3")
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        client.generate_billing_drafts().await.unwrap();
        client.generate_billing_drafts().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_maps_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/v1/teachers")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let result = client_for(&server).list_teachers().await;

        assert!(matches!(result, Err(StoreError::ServerError(ref m)) if m == "maintenance"));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/billing_claims")
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(1 + MAX_RATE_LIMIT_RETRIES as usize)
            .create_async()
            .await;

        let result = client_for(&server).list_claims().await;

        assert!(matches!(result, Err(StoreError::RateLimited)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/v1/students")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let result = client_for(&server).list_students().await;

        assert!(matches!(result, Err(StoreError::InvalidResponse(ref m)) if m.contains("students")));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let config = RemoteConfig {
            url: "http://localhost".to_string(),
            anon_key: "bad\nkey".to_string(),
            request_timeout: Duration::from_secs(1),
        };
        assert!(matches!(RestClient::new(&config), Err(StoreError::InvalidConfig(_))));
    }
}
