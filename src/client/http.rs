//! A concrete [`Client`] implementation over HTTP
//!
//! All clients created by a process share one [`reqwest::Client`] (see [`connection_pool`]), so every
//! forwarded call reuses the same connection pool and the same timeouts.
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{event, Level};

use super::Client;
use crate::{
    cmd::{
        delete::DeleteResponse, get::GetResponse, health::BucketHealth, put::PutResponse,
        validate_key,
    },
    error::{Error, ErrorBody, Result},
};

/// Builds the pooled outbound client shared by every [`HttpClient`].
///
/// `request_timeout` bounds the whole call (connect + send + read). Hitting it surfaces as
/// [`Error::NodeUnavailable`]; nothing is retried.
pub fn connection_pool(
    request_timeout: Duration,
    connect_timeout: Duration,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| Error::Internal {
            reason: format!("unable to build http connection pool: {}", e),
        })
}

/// HttpClient handle
#[derive(Clone, Debug)]
pub struct HttpClient {
    base_url: Url,
    addr: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// # Errors
    /// [`Error::InvalidServerConfig`] if `addr` isn't an absolute http(s) url
    pub fn new(addr: &str, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(addr).map_err(|e| Error::InvalidServerConfig {
            reason: format!("invalid node url {}: {}", addr, e),
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::InvalidServerConfig {
                reason: format!("invalid node url {}: expected http(s)://host[:port]", addr),
            });
        }

        Ok(Self {
            base_url,
            addr: addr.to_string(),
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            // keys become a single percent-encoded segment, so a '/' inside a key stays part of the key
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn unavailable(&self, err: reqwest::Error) -> Error {
        event!(Level::WARN, "node {} unavailable: {}", self.addr, err);
        Error::NodeUnavailable {
            addr: self.addr.clone(),
            reason: err.to_string(),
        }
    }

    /// Sends a request and decodes a successful response as `T`.
    ///
    /// Error mapping:
    ///  1. transport failures (refused, reset, timeout) -> [`Error::NodeUnavailable`]
    ///  2. 404 -> [`Error::NotFound`]
    ///  3. any other error status -> [`Error::Remote`] carrying the status and the error kind verbatim
    ///  4. undecodable success payload -> [`Error::InvalidServerResponse`]
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        key: Option<&str>,
    ) -> Result<T> {
        let mut request = self.http.request(method, self.url(segments));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| self.unavailable(e))?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                if e.is_decode() {
                    Error::InvalidServerResponse {
                        reason: e.to_string(),
                    }
                } else {
                    self.unavailable(e)
                }
            });
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(key) = key {
                return Err(Error::NotFound {
                    key: key.to_string(),
                });
            }
        }

        let body = response.text().await.map_err(|e| self.unavailable(e))?;
        let (kind, reason) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error_body) => (Some(error_body.error), error_body.message),
            Err(_) => (None, body),
        };
        Err(Error::Remote {
            status: status.as_u16(),
            kind,
            reason,
        })
    }

    /// Same as [`Client::put`] but decodes the response as `T`. Useful against a directory, which
    /// decorates bucket responses with routing information.
    pub async fn put_as<T: DeserializeOwned>(&self, key: &str, value: &str) -> Result<T> {
        self.call(Method::PUT, &["put"], &[("key", key), ("value", value)], None)
            .await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        validate_key(key)?;
        self.call(Method::GET, &["get", key], &[], Some(key)).await
    }

    pub async fn delete_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        validate_key(key)?;
        self.call(Method::DELETE, &["delete", key], &[], Some(key))
            .await
    }

    pub async fn health_as<T: DeserializeOwned>(&self) -> Result<T> {
        self.call(Method::GET, &["health"], &[], None).await
    }
}

#[async_trait]
impl Client for HttpClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn put(&self, key: &str, value: &str) -> Result<PutResponse> {
        self.put_as(key, value).await
    }

    async fn get(&self, key: &str) -> Result<GetResponse> {
        self.get_as(key).await
    }

    async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        self.delete_as(key).await
    }

    async fn health(&self) -> Result<BucketHealth> {
        self.health_as().await
    }
}

#[cfg(test)]
mod tests {
    use super::{connection_pool, HttpClient};
    use crate::{client::Client, error::Error};
    use std::time::Duration;

    fn pool() -> reqwest::Client {
        connection_pool(Duration::from_millis(500), Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn rejects_invalid_urls() {
        for addr in ["bucket-0:8000", "not a url", "mailto:someone@example.com"] {
            let err = HttpClient::new(addr, pool()).err().unwrap();
            assert!(matches!(err, Error::InvalidServerConfig { .. }), "{}", addr);
        }
    }

    #[test]
    fn keys_are_single_segments() {
        let client = HttpClient::new("http://127.0.0.1:8000/", pool()).unwrap();
        assert_eq!(
            client.url(&["get", "a/b c"]).as_str(),
            "http://127.0.0.1:8000/get/a%2Fb%20c"
        );
        assert_eq!(client.url(&["health"]).as_str(), "http://127.0.0.1:8000/health");
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        // bind then drop a listener to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(&format!("http://{}", addr), pool()).unwrap();
        let err = client.get("alice").await.err().unwrap();
        assert!(err.is_node_unavailable(), "{}", err);
        let err = client.put("alice", "1").await.err().unwrap();
        assert!(err.is_node_unavailable(), "{}", err);
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_sending() {
        // nobody listens here, so anything that reaches the network is NodeUnavailable
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(&format!("http://{}", addr), pool()).unwrap();
        let err = client.get("").await.err().unwrap();
        assert!(matches!(err, Error::InvalidKey { .. }), "{}", err);
        let err = client.delete("").await.err().unwrap();
        assert!(matches!(err, Error::InvalidKey { .. }), "{}", err);
    }

    #[tokio::test]
    async fn timeout_is_unavailable() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut connections = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.push(stream);
            }
        });

        let client = HttpClient::new(&format!("http://{}", addr), pool()).unwrap();
        let started = std::time::Instant::now();
        let err = client.get("alice").await.err().unwrap();
        assert!(err.is_node_unavailable(), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(5));

        silent.abort();
    }
}
