//! HTTP executor for remote debugger commands
//!
//! One `RequestService` per debug session. It owns the authenticated reqwest
//! client (timeout, optional proxy) and executes [`DebuggerCommand`]s against
//! the org's debugger endpoint. Success hands the raw response body to the
//! caller; failure propagates the raw error body unmodified. No retry.

use crate::commands::DebuggerCommand;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tether_config::{WorkspaceSettings, DEBUG_API_VERSION};
use tether_core::{ConnectionInfo, Error, Result};
use tracing::{debug, trace};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub struct RequestService {
    client: reqwest::Client,
    instance_url: String,
    access_token: String,
    timeout_ms: u64,
}

impl RequestService {
    /// Build the service for one org connection, applying the workspace's
    /// proxy and timeout settings.
    pub fn new(connection: ConnectionInfo, settings: &WorkspaceSettings) -> Result<Self> {
        let timeout_ms = settings.connection_timeout_ms;
        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms));

        if let Some(proxy_url) = &settings.proxy_url {
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::Communication(format!("Invalid proxy url: {e}")))?;
            if let Some(auth) = &settings.proxy_auth {
                let value = HeaderValue::from_str(auth).map_err(|e| {
                    Error::Communication(format!("Invalid proxy authorization: {e}"))
                })?;
                proxy = proxy.custom_http_auth(value);
            }
            builder = builder.proxy(proxy);
            if !settings.proxy_strict_ssl {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Communication(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            instance_url: connection.instance_url,
            access_token: connection.access_token,
            timeout_ms,
        })
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Execute one command and return the raw response body.
    ///
    /// Any non-2xx status rejects with the raw error body; transport errors
    /// reject with [`Error::Timeout`] or [`Error::Communication`].
    pub async fn execute(&self, command: &dyn DebuggerCommand) -> Result<String> {
        let mut url = format!(
            "{}/services/debug/v{}/{}/{}",
            self.instance_url,
            DEBUG_API_VERSION,
            command.name(),
            command.request_id()
        );
        if let Some(query) = command.query() {
            url.push('?');
            url.push_str(&query);
        }
        debug!(command = command.name(), %url, "executing debugger command");

        let mut request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("OAuth {}", self.access_token))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE);
        if let Some(body) = command.body() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout_ms)
            } else {
                Error::Communication(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Communication(e.to_string()))?;
        trace!(command = command.name(), %status, "debugger command completed");

        if status.is_success() {
            Ok(body)
        } else if body.is_empty() {
            Err(Error::Remote(status.to_string()))
        } else {
            Err(Error::Remote(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{RunCommand, StateCommand, StepCommand, StepKind};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> RequestService {
        RequestService::new(
            ConnectionInfo {
                instance_url: server.uri(),
                access_token: "00D!token".to_string(),
            },
            &WorkspaceSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_posts_with_oauth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/debug/v1/run/07nFAKE"))
            .and(header("Authorization", "OAuth 00D!token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let body = service.execute(&RunCommand::new("07nFAKE")).await.unwrap();
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_execute_appends_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/debug/v1/step/07nFAKE"))
            .and(query_param("type", "over"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let body = service
            .execute(&StepCommand::new("07nFAKE", StepKind::Over))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_error_body_propagates_verbatim() {
        let raw = r#"{"message":"Invalid request id","action":"Relaunch the session"}"#;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(raw))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service
            .execute(&StateCommand::new("07nFAKE"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Remote(raw.to_string()));
    }

    #[tokio::test]
    async fn test_empty_error_body_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service
            .execute(&RunCommand::new("07nFAKE"))
            .await
            .unwrap_err();
        match err {
            Error::Remote(body) => assert!(body.contains("503")),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }
}
