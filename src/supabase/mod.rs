//! Connection layer for the hosted backend
//!
//! [`SupabaseClient`] is the one handle to the remote platform: it owns the
//! HTTP client, the project URL and anon key, and the bearer token of the
//! signed-in session. It is constructed explicitly from configuration and
//! passed to each facade - there is no process-wide singleton.
//!
//! The REST helpers here do the envelope work every facade method relies
//! on: attach auth headers, map non-2xx responses to typed errors, and log
//! each failure before returning it.

pub mod query;
pub mod realtime;

use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::SupabaseConfig;
use crate::errors::FlowError;
use crate::logger::{self, LogTag};

use self::query::Query;
use self::realtime::{ChangeHandler, RealtimeSubscription, SubscribeRequest};

/// Accept header that makes PostgREST return a bare object for
/// single-row reads (and fail with 406 when no row matches)
const SINGLE_OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

/// PostgREST error code for "JSON object requested, multiple (or no) rows returned"
const PGRST_NO_ROWS: &str = "PGRST116";

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    /// Access token of the signed-in session; anon key is used when absent
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, FlowError> {
        if config.url.trim().is_empty() {
            return Err(FlowError::config("backend URL is empty"));
        }
        if config.anon_key.trim().is_empty() {
            return Err(FlowError::config("backend anon key is empty"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| FlowError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set (or clear) the session token attached to subsequent requests
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn bearer_token(&self) -> String {
        self.access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    async fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.bearer_token().await;
        builder.header("apikey", self.anon_key.as_str()).bearer_auth(token)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Websocket endpoint of the realtime feed, derived from the project URL
    pub fn realtime_endpoint(&self) -> Result<String, FlowError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| FlowError::config(format!("invalid backend URL: {}", e)))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(FlowError::config(format!(
                    "unsupported backend URL scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| FlowError::config("could not derive websocket scheme"))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url.to_string())
    }

    // =========================================================================
    // ROW STORE (PostgREST)
    // =========================================================================

    /// Execute a filtered read returning all matching rows
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, FlowError> {
        let url = self.rest_url(query.table_name());
        logger::debug(LogTag::Http, &format!("GET {}", url));

        let builder = self.http.get(&url).query(&query.to_params());
        let response = self.authed(builder).await.send().await?;

        if !response.status().is_success() {
            return Err(self.rest_error(query.table_name(), response).await);
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    /// Execute a read expecting exactly one row; no match is `NotFound`
    pub async fn select_single<T: DeserializeOwned>(&self, query: &Query) -> Result<T, FlowError> {
        let url = self.rest_url(query.table_name());
        logger::debug(LogTag::Http, &format!("GET {} (single)", url));

        let builder = self
            .http
            .get(&url)
            .query(&query.to_params())
            .header(ACCEPT, SINGLE_OBJECT_ACCEPT);
        let response = self.authed(builder).await.send().await?;

        if !response.status().is_success() {
            return Err(self.rest_error(query.table_name(), response).await);
        }
        Ok(response.json::<T>().await?)
    }

    /// Insert one row and return its stored representation
    pub async fn insert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, FlowError> {
        let url = self.rest_url(table);
        logger::debug(LogTag::Http, &format!("POST {}", url));

        let builder = self
            .http
            .post(&url)
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.authed(builder).await.send().await?;

        if !response.status().is_success() {
            return Err(self.rest_error(table, response).await);
        }
        // PostgREST returns the inserted rows as an array
        let mut rows = response.json::<Vec<T>>().await?;
        rows.pop()
            .ok_or_else(|| FlowError::parse(format!("empty insert response from {}", table)))
    }

    /// Patch the rows matched by the query's filters, returning them
    pub async fn update<T: DeserializeOwned, B: Serialize>(
        &self,
        query: &Query,
        changes: &B,
    ) -> Result<Vec<T>, FlowError> {
        let url = self.rest_url(query.table_name());
        logger::debug(LogTag::Http, &format!("PATCH {}", url));

        let builder = self
            .http
            .patch(&url)
            .query(&query.to_params())
            .header("Prefer", "return=representation")
            .json(changes);
        let response = self.authed(builder).await.send().await?;

        if !response.status().is_success() {
            return Err(self.rest_error(query.table_name(), response).await);
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn rest_error(&self, table: &str, response: Response) -> FlowError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let error = if status == StatusCode::NOT_ACCEPTABLE || body.contains(PGRST_NO_ROWS) {
            FlowError::not_found(format!("row in {}", table))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            FlowError::auth(format!("HTTP {} from {}: {}", status.as_u16(), table, body))
        } else {
            FlowError::Api {
                status: status.as_u16(),
                message: body,
            }
        };

        // "No rows" on a single read is an expected outcome for some caller
        // queries; keep it out of the error log
        if error.is_not_found() {
            logger::debug(LogTag::Http, &format!("{} returned no rows", table));
        } else {
            logger::error(LogTag::Http, &format!("Request to {} failed: {}", table, error));
        }
        error
    }

    // =========================================================================
    // AUTH (GoTrue)
    // =========================================================================

    /// POST an auth request and decode the JSON response
    pub async fn auth_post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, FlowError> {
        let response = self.auth_send(self.http.post(self.auth_endpoint(path)), body, bearer, path).await?;
        Ok(response.json::<T>().await?)
    }

    /// POST an auth request where the response body is irrelevant
    /// (logout returns 204, recover returns an empty object)
    pub async fn auth_post_empty<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<(), FlowError> {
        self.auth_send(self.http.post(self.auth_endpoint(path)), body, bearer, path).await?;
        Ok(())
    }

    /// PUT an auth request (user attribute updates)
    pub async fn auth_put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T, FlowError> {
        let response = self.auth_send(self.http.put(self.auth_endpoint(path)), body, bearer, path).await?;
        Ok(response.json::<T>().await?)
    }

    /// GET an auth resource with an explicit bearer token
    pub async fn auth_get<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: &str,
    ) -> Result<T, FlowError> {
        let url = self.auth_endpoint(path);
        logger::debug(LogTag::Http, &format!("GET {}", url));

        let response = self
            .http
            .get(&url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.auth_error(path, response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn auth_send<B: Serialize>(
        &self,
        builder: RequestBuilder,
        body: &B,
        bearer: Option<&str>,
        path: &str,
    ) -> Result<Response, FlowError> {
        logger::debug(LogTag::Http, &format!("auth request: {}", path));

        let token = match bearer {
            Some(token) => token.to_string(),
            None => self.bearer_token().await,
        };
        let response = builder
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.auth_error(path, response).await);
        }
        Ok(response)
    }

    async fn auth_error(&self, path: &str, response: Response) -> FlowError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // GoTrue reports failures as {"error_description": ...} or {"msg": ...}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                ["error_description", "msg", "message", "error"]
                    .iter()
                    .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(str::to_string))
            })
            .unwrap_or(body);

        let error = if status.is_client_error() {
            FlowError::auth(message)
        } else {
            FlowError::Api {
                status: status.as_u16(),
                message,
            }
        };
        logger::error(
            LogTag::Http,
            &format!("Auth request {} failed: {}", path, error),
        );
        error
    }

    // =========================================================================
    // REALTIME
    // =========================================================================

    /// Open a live change feed; events go straight to the handler
    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
        handler: ChangeHandler,
    ) -> Result<RealtimeSubscription, FlowError> {
        let endpoint = self.realtime_endpoint()?;
        realtime::open_subscription(&endpoint, request, handler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;

    fn test_config() -> SupabaseConfig {
        SupabaseConfig {
            url: "https://example.supabase.co".to_string(),
            anon_key: "public-anon-key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_empty_config() {
        let mut config = test_config();
        config.url = String::new();
        assert!(SupabaseClient::new(&config).is_err());

        let mut config = test_config();
        config.anon_key = "  ".to_string();
        assert!(SupabaseClient::new(&config).is_err());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let mut config = test_config();
        config.url = "https://example.supabase.co/".to_string();
        let client = SupabaseClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://example.supabase.co");
        assert_eq!(
            client.rest_url("patients"),
            "https://example.supabase.co/rest/v1/patients"
        );
    }

    fn canned_response(status: u16, body: &'static str) -> Response {
        Response::from(
            http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_rest_error_maps_no_rows_to_not_found() {
        let client = SupabaseClient::new(&test_config()).unwrap();

        // 406 from the single-object Accept header
        let error = client
            .rest_error("patient_flow_stats", canned_response(406, "{}"))
            .await;
        assert!(error.is_not_found());

        // PGRST116 in the body regardless of status
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows"}"#;
        let error = client.rest_error("patients", canned_response(400, body)).await;
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_rest_error_maps_denials_and_failures() {
        let client = SupabaseClient::new(&test_config()).unwrap();

        let denied = client.rest_error("patients", canned_response(401, "{}")).await;
        assert!(matches!(denied, FlowError::Auth { .. }));

        let failed = client
            .rest_error("patients", canned_response(503, "upstream down"))
            .await;
        match failed {
            FlowError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_realtime_endpoint_derivation() {
        let client = SupabaseClient::new(&test_config()).unwrap();
        let endpoint = client.realtime_endpoint().unwrap();
        assert!(endpoint.starts_with("wss://example.supabase.co/realtime/v1/websocket"));
        assert!(endpoint.contains("apikey=public-anon-key"));
        assert!(endpoint.contains("vsn=1.0.0"));
    }
}
