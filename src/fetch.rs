use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::HarvestConfig;
use crate::traits::{FetchError, Fetcher};

/// Fetches one fixed URL over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, FetchError> {
        Self::new(config.url.clone(), &config.user_agent, config.timeout())
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn source(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;
        debug!(url = %self.url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the raw request it received.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/wiki/Index", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_user_agent() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<p>hello</p>\n",
        )
        .await;

        let fetcher = HttpFetcher::new(url.clone(), "harvester-test/1.0", Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.source(), url);
        let body = fetcher.fetch().await.unwrap();
        assert_eq!(body, "<p>hello</p>\n");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /wiki/index"));
        assert!(request.contains("user-agent: harvester-test/1.0"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let (url, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let fetcher = HttpFetcher::new(url.clone(), "test", Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();
        assert_eq!(err, FetchError::Status { status: 503, url });
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let fetcher = HttpFetcher::new(url, "test", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::Network(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let fetcher = HttpFetcher::from_config(&HarvestConfig::default()).unwrap();
        assert_eq!(fetcher.source(), crate::config::DEFAULT_URL);
    }
}
