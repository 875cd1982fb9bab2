//! HTTP implementation of [`LookupClient`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use super::config::{LookupConfig, LookupServiceKind};
use super::google_books::GoogleBooksService;
use super::open_library::OpenLibraryService;
use super::types::{ErrorKind, LookupOutcome, LookupQuery};
use super::{IdentifierPreference, LookupClient, LookupError, LookupService};
use crate::metrics;

/// Lookup client performing one HTTP round-trip per query.
pub struct HttpLookupClient {
    client: Client,
    service: Arc<dyn LookupService>,
    preference: IdentifierPreference,
}

impl HttpLookupClient {
    /// Create a client for the given service adapter.
    pub fn new(
        service: Arc<dyn LookupService>,
        preference: IdentifierPreference,
        user_agent: &str,
    ) -> Result<Self, LookupError> {
        let client = Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            service,
            preference,
        })
    }

    /// Create a client for the service selected in `config`.
    pub fn from_config(
        config: &LookupConfig,
        preference: IdentifierPreference,
    ) -> Result<Self, LookupError> {
        let service: Arc<dyn LookupService> = match config.service {
            LookupServiceKind::GoogleBooks => {
                Arc::new(GoogleBooksService::new(&config.google_books)?)
            }
            LookupServiceKind::OpenLibrary => {
                Arc::new(OpenLibraryService::new(&config.open_library)?)
            }
        };
        Self::new(service, preference, &config.user_agent)
    }

    async fn fetch(&self, url: Url, deadline: Duration) -> LookupOutcome {
        let response = match self.client.get(url).timeout(deadline).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("{} request failed: {}", self.service.name(), e);
                return LookupOutcome::Failed(classify_error(&e));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("{} rate limit exceeded", self.service.name());
            return LookupOutcome::Failed(ErrorKind::RateLimited);
        }
        if status.is_server_error() {
            debug!("{} server error: {}", self.service.name(), status);
            return LookupOutcome::Failed(ErrorKind::Transport);
        }
        if !status.is_success() {
            debug!("{} unexpected status: {}", self.service.name(), status);
            return LookupOutcome::Failed(ErrorKind::Unexpected);
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                debug!("{} failed reading body: {}", self.service.name(), e);
                return LookupOutcome::Failed(classify_error(&e));
            }
        };

        self.service.parse_response(&body, self.preference)
    }
}

#[async_trait]
impl LookupClient for HttpLookupClient {
    fn name(&self) -> &str {
        self.service.name()
    }

    async fn resolve(&self, query: &LookupQuery, deadline: Duration) -> LookupOutcome {
        let url = match self.service.build_request(query) {
            Ok(url) => url,
            Err(e) => {
                warn!(title = %query.title, "could not build lookup request: {}", e);
                return LookupOutcome::Failed(ErrorKind::Unexpected);
            }
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(deadline, self.fetch(url, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => LookupOutcome::Failed(ErrorKind::Timeout),
        };

        let service = self.service.name();
        metrics::LOOKUP_DURATION
            .with_label_values(&[service])
            .observe(started.elapsed().as_secs_f64());
        metrics::LOOKUPS_TOTAL
            .with_label_values(&[service, metric_label(&outcome)])
            .inc();

        outcome
    }
}

fn metric_label(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::Failed(kind) => kind.as_str(),
        other => other.label(),
    }
}

/// Map a reqwest error onto the failure taxonomy.
fn classify_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_decode() {
        ErrorKind::MalformedResponse
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ErrorKind::Transport
    } else {
        ErrorKind::Unexpected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{GoogleBooksConfig, OpenLibraryConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEADLINE: Duration = Duration::from_secs(2);

    fn google_client(base_url: &str) -> HttpLookupClient {
        let config = LookupConfig {
            google_books: GoogleBooksConfig {
                base_url: Some(base_url.to_string()),
                api_key: None,
            },
            ..LookupConfig::default()
        };
        HttpLookupClient::from_config(&config, IdentifierPreference::PreferIsbn13).unwrap()
    }

    fn dune() -> LookupQuery {
        LookupQuery::new("Dune", "Frank Herbert")
    }

    #[tokio::test]
    async fn test_resolve_found() {
        let server = MockServer::start().await;
        let body = r#"{"totalItems": 1, "items": [{"volumeInfo": {"industryIdentifiers": [
            {"type": "ISBN_10", "identifier": "0441172717"},
            {"type": "ISBN_13", "identifier": "9780441172719"}
        ]}}]}"#;

        Mock::given(method("GET"))
            .and(path("/volumes"))
            .and(query_param("q", "intitle:Dune inauthor:Frank Herbert"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(client.name(), "google_books");
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Found("9780441172719".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"totalItems": 0}"#))
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(client.resolve(&dune(), DEADLINE).await, LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_resolve_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::Transport)
        );
    }

    #[tokio::test]
    async fn test_resolve_client_error_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::Unexpected)
        );
    }

    #[tokio::test]
    async fn test_resolve_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::MalformedResponse)
        );
    }

    #[tokio::test]
    async fn test_resolve_honors_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"totalItems": 0}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = google_client(&server.uri());
        let started = Instant::now();
        let outcome = client.resolve(&dune(), Duration::from_millis(100)).await;
        assert_eq!(outcome, LookupOutcome::Failed(ErrorKind::Timeout));
        assert!(started.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test]
    async fn test_resolve_connection_refused() {
        // Nothing listens on the discard port
        let client = google_client("http://127.0.0.1:9");
        assert_eq!(
            client.resolve(&dune(), DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::Transport)
        );
    }

    #[tokio::test]
    async fn test_resolve_open_library() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "title:It AND author:Stephen King"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"docs": [{"isbn": ["0670813028", "9780670813025"]}]}"#),
            )
            .mount(&server)
            .await;

        let config = LookupConfig {
            service: LookupServiceKind::OpenLibrary,
            open_library: OpenLibraryConfig {
                base_url: Some(server.uri()),
            },
            ..LookupConfig::default()
        };
        let client =
            HttpLookupClient::from_config(&config, IdentifierPreference::PreferIsbn13).unwrap();
        assert_eq!(client.name(), "open_library");
        assert_eq!(
            client
                .resolve(&LookupQuery::new("It", "Stephen King"), DEADLINE)
                .await,
            LookupOutcome::Found("9780670813025".to_string())
        );
    }

    #[test]
    fn test_from_config_rejects_bad_base_url() {
        let config = LookupConfig {
            google_books: GoogleBooksConfig {
                base_url: Some("::not a url::".to_string()),
                api_key: None,
            },
            ..LookupConfig::default()
        };
        let result = HttpLookupClient::from_config(&config, IdentifierPreference::default());
        assert!(matches!(result, Err(LookupError::InvalidBaseUrl { .. })));
    }
}
