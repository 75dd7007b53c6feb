//! REST remote implementation.
//!
//! Speaks the PostgREST dialect used by the hosted backend:
//!
//! - `GET /rest/v1/{table}?select=*&user_id=eq.{id}` to pull a user's rows
//! - `POST /rest/v1/{table}?on_conflict=a,b` with
//!   `Prefer: resolution=merge-duplicates` to upsert
//! - `GET /auth/v1/user` to resolve the session
//!
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest behind the `reqwest` feature, fakes in tests).

use crate::auth::{AuthProvider, AuthUser};
use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{RemoteStore, UpsertOptions};
use gmpq_store::{Row, USER_ID};
use parking_lot::RwLock;
use std::sync::Arc;

/// HTTP method used by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Body bytes, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// connection-level failures; non-2xx statuses come back as responses.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }
}

/// Maps a non-2xx status to a sync error.
pub fn status_error(status: u16, body: &[u8]) -> SyncError {
    let message = String::from_utf8_lossy(body).into_owned();
    match status {
        401 | 403 => SyncError::PermissionDenied(message),
        500..=599 => SyncError::ServerError(message),
        _ => SyncError::Remote { status, message },
    }
}

fn auth_headers(config: &RemoteConfig, token: Option<&str>) -> Vec<(String, String)> {
    let bearer = token.unwrap_or(&config.api_key);
    vec![
        ("apikey".into(), config.api_key.clone()),
        ("Authorization".into(), format!("Bearer {bearer}")),
    ]
}

fn send<C: HttpClient>(client: &C, request: HttpRequest) -> SyncResult<HttpResponse> {
    let response = client
        .execute(request)
        .map_err(SyncError::transport_retryable)?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(status_error(response.status, &response.body))
    }
}

/// Remote store backed by the hosted REST API.
pub struct RestRemote<C: HttpClient> {
    config: RemoteConfig,
    client: C,
    /// Session token; the API key is used as bearer when absent.
    access_token: RwLock<Option<String>>,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> RestRemote<C> {
    /// Creates a REST remote.
    pub fn new(config: RemoteConfig, client: C) -> Self {
        Self {
            config,
            client,
            access_token: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Sets or clears the session token sent as bearer.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn headers(&self) -> Vec<(String, String)> {
        let token = self.access_token.read();
        auth_headers(&self.config, token.as_deref())
    }

    fn track<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }
}

impl<C: HttpClient> RemoteStore for RestRemote<C> {
    fn select_by_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<Row>> {
        let url = format!(
            "{}?select=*&{}=eq.{}",
            self.config.rest_url(table),
            USER_ID,
            urlencoding::encode(user_id)
        );
        let mut headers = self.headers();
        headers.push(("Accept".into(), "application/json".into()));

        let result = send(
            &self.client,
            HttpRequest {
                method: Method::Get,
                url,
                headers,
                body: None,
            },
        )
        .and_then(|response| {
            serde_json::from_slice::<Vec<Row>>(&response.body).map_err(|e| {
                SyncError::Protocol(format!("unexpected select response for {table}: {e}"))
            })
        });
        self.track(result)
    }

    fn upsert(&self, table: &str, rows: &[Row], options: &UpsertOptions) -> SyncResult<usize> {
        let url = format!(
            "{}?on_conflict={}",
            self.config.rest_url(table),
            urlencoding::encode(&options.on_conflict_param())
        );
        let resolution = if options.ignore_duplicates {
            "resolution=ignore-duplicates"
        } else {
            "resolution=merge-duplicates"
        };
        let body = serde_json::to_vec(rows)
            .map_err(|e| SyncError::Protocol(format!("failed to encode rows: {e}")))?;

        let mut headers = self.headers();
        headers.push(("Content-Type".into(), "application/json".into()));
        headers.push(("Prefer".into(), format!("{resolution},return=minimal")));

        let result = send(
            &self.client,
            HttpRequest {
                method: Method::Post,
                url,
                headers,
                body: Some(body),
            },
        )
        .map(|_| rows.len());
        self.track(result)
    }
}

/// Resolves the user behind a session token via the auth endpoint.
pub struct TokenAuth<C: HttpClient> {
    config: RemoteConfig,
    client: C,
    token: RwLock<Option<String>>,
}

impl<C: HttpClient> TokenAuth<C> {
    /// Creates a provider; nobody is signed in until a token is set.
    pub fn new(config: RemoteConfig, client: C) -> Self {
        Self {
            config,
            client,
            token: RwLock::new(None),
        }
    }

    /// Sets or clears the session token.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

impl<C: HttpClient> AuthProvider for TokenAuth<C> {
    fn current_user(&self) -> SyncResult<AuthUser> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(SyncError::not_authenticated)?;

        let request = HttpRequest {
            method: Method::Get,
            url: self.config.user_url(),
            headers: auth_headers(&self.config, Some(&token)),
            body: None,
        };
        let response = send(&self.client, request).map_err(|e| match e {
            SyncError::PermissionDenied(message) => SyncError::AuthenticationFailed(message),
            other => other,
        })?;

        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("unexpected user response: {e}")))
    }
}

/// Blocking HTTP client built on `reqwest`.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestClient {
    /// Creates a client with the timeout from `config`.
    pub fn new(config: &RemoteConfig) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct TestClient {
        requests: Mutex<Vec<HttpRequest>>,
        response: RwLock<Result<HttpResponse, String>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: RwLock::new(Ok(HttpResponse::new(200, "[]"))),
            }
        }

        fn respond(&self, response: Result<HttpResponse, String>) {
            *self.response.write() = response;
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    impl HttpClient for TestClient {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            self.response.read().clone()
        }
    }

    fn remote() -> (Arc<TestClient>, RestRemote<Arc<TestClient>>) {
        let client = Arc::new(TestClient::new());
        let remote = RestRemote::new(
            RemoteConfig::new("https://demo.supabase.co", "anon-key"),
            Arc::clone(&client),
        );
        (client, remote)
    }

    #[test]
    fn select_request_shape() {
        let (client, remote) = remote();
        client.respond(Ok(HttpResponse::new(
            200,
            r#"[{"id":1,"user_id":"u 1","module":2}]"#,
        )));
        remote.set_access_token(Some("jwt".into()));

        let rows = remote.select_by_user("level_4", "u 1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["module"], json!(2));

        let request = client.last_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.url,
            "https://demo.supabase.co/rest/v1/level_4?select=*&user_id=eq.u%201"
        );
        assert_eq!(request.header("apikey"), Some("anon-key"));
        assert_eq!(request.header("authorization"), Some("Bearer jwt"));
    }

    #[test]
    fn upsert_request_shape() {
        let (client, remote) = remote();
        client.respond(Ok(HttpResponse::new(201, "")));
        let row = match json!({"user_id": "u1", "module": 1, "level": 2, "scenario_index": 0}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let options = UpsertOptions::overwrite(&["user_id", "module", "level", "scenario_index"]);

        let sent = remote.upsert("level3_progress", &[row], &options).unwrap();
        assert_eq!(sent, 1);

        let request = client.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.url,
            "https://demo.supabase.co/rest/v1/level3_progress?on_conflict=user_id%2Cmodule%2Clevel%2Cscenario_index"
        );
        assert_eq!(
            request.header("prefer"),
            Some("resolution=merge-duplicates,return=minimal")
        );
        assert_eq!(request.header("authorization"), Some("Bearer anon-key"));
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(body[0]["scenario_index"], json!(0));
    }

    #[test]
    fn statuses_map_to_errors() {
        let (client, remote) = remote();

        client.respond(Ok(HttpResponse::new(403, "row-level security")));
        assert!(matches!(
            remote.select_by_user("level_4", "u1"),
            Err(SyncError::PermissionDenied(_))
        ));
        assert!(remote.last_error().unwrap().contains("row-level security"));

        client.respond(Ok(HttpResponse::new(503, "unavailable")));
        assert!(matches!(
            remote.select_by_user("level_4", "u1"),
            Err(SyncError::ServerError(_))
        ));

        client.respond(Ok(HttpResponse::new(409, "conflict")));
        assert!(matches!(
            remote.select_by_user("level_4", "u1"),
            Err(SyncError::Remote { status: 409, .. })
        ));

        client.respond(Err("connection refused".into()));
        let err = remote.select_by_user("level_4", "u1").unwrap_err();
        assert!(err.is_retryable());

        client.respond(Ok(HttpResponse::new(200, "[]")));
        remote.select_by_user("level_4", "u1").unwrap();
        assert!(remote.last_error().is_none());
    }

    #[test]
    fn malformed_select_is_protocol_error() {
        let (client, remote) = remote();
        client.respond(Ok(HttpResponse::new(200, r#"{"not":"an array"}"#)));
        assert!(matches!(
            remote.select_by_user("level_4", "u1"),
            Err(SyncError::Protocol(_))
        ));
    }

    #[test]
    fn token_auth_resolves_user() {
        let client = Arc::new(TestClient::new());
        let auth = TokenAuth::new(
            RemoteConfig::new("https://demo.supabase.co", "anon-key"),
            Arc::clone(&client),
        );
        assert!(matches!(
            auth.current_user(),
            Err(SyncError::AuthenticationFailed(_))
        ));

        auth.set_token(Some("jwt".into()));
        client.respond(Ok(HttpResponse::new(200, r#"{"id":"u1","email":"a@b.c"}"#)));
        assert_eq!(auth.current_user().unwrap().id, "u1");
        assert_eq!(
            client.last_request().url,
            "https://demo.supabase.co/auth/v1/user"
        );

        client.respond(Ok(HttpResponse::new(401, "expired")));
        assert!(matches!(
            auth.current_user(),
            Err(SyncError::AuthenticationFailed(_))
        ));
    }
}
