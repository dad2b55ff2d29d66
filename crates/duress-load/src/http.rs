//! HTTP client for the system under test

use crate::config::TargetConfig;
use async_trait::async_trait;
use duress_core::{Client, ClientError, ClientResult};
use tracing::{debug, trace};

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// [`Client`] issuing `GET` reads and JSON `POST` writes
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    read_url: String,
    write_url: String,
}

impl HttpClient {
    /// Build a client for `config`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RequestFailed`] if the HTTP stack cannot be
    /// initialised.
    pub fn new(config: &TargetConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("duress/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::RequestFailed(format!("Failed to create HTTP client: {e}")))?;

        let client = Self {
            http,
            read_url: join(&config.base_url, &config.read_path),
            write_url: join(&config.base_url, &config.write_path),
        };
        debug!(read = %client.read_url, write = %client.write_url, "HTTP client ready");
        Ok(client)
    }

    pub fn read_url(&self) -> &str {
        &self.read_url
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    fn check(url: &str, response: ClientResult<reqwest::Response>) -> ClientResult<()> {
        let response = response?;
        let status = response.status();
        trace!(url, status = status.as_u16(), "HTTP response");
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

fn classify(error: reqwest::Error) -> ClientError {
    if error.is_connect() {
        ClientError::ConnectionFailed(error.to_string())
    } else {
        ClientError::RequestFailed(error.to_string())
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn read(&self) -> ClientResult<()> {
        let response = self.http.get(&self.read_url).send().await.map_err(classify);
        Self::check(&self.read_url, response)
    }

    async fn write(&self, payload: &str) -> ClientResult<()> {
        let response = self
            .http
            .post(&self.write_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(classify);
        Self::check(&self.write_url, response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("read_url", &self.read_url)
            .field("write_url", &self.write_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpClient {
        HttpClient::new(&TargetConfig {
            base_url: server.uri(),
            read_path: "/items".to_string(),
            write_path: "/items".to_string(),
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    #[rstest]
    #[case("http://host:8080", "/items", "http://host:8080/items")]
    #[case("http://host:8080/", "/items", "http://host:8080/items")]
    #[case("http://host:8080/api/", "items", "http://host:8080/api/items")]
    #[case("http://host:8080", "/", "http://host:8080/")]
    fn test_join(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(join(base, path), expected);
    }

    #[tokio::test]
    async fn test_read_issues_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.read().await.unwrap();
        client.read().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"id":1}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.write(r#"{"id":1}"#).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client.read().await.unwrap_err();
        assert_eq!(
            error,
            ClientError::UnexpectedStatus {
                status: 503,
                url: format!("{}/items", server.uri()),
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_target_fails() {
        let client = HttpClient::new(&TargetConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_ms: 2_000,
            ..Default::default()
        })
        .unwrap();

        let error = client.read().await.unwrap_err();
        assert!(matches!(
            error,
            ClientError::ConnectionFailed(_) | ClientError::RequestFailed(_)
        ));
    }
}
