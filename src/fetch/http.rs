use super::ArchiveFetcher;
use crate::error::{FetchError, Result};
use crate::types::PackageReference;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Downloads archives from a gallery flat container
///
/// Archives are requested from `<base>/<id>/<version>/<id>.<version>.nupkg` using the
/// lower-case id and normalized version. A bearer token, when configured, is sent with
/// every request.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher for `base_url`
    ///
    /// `timeout` bounds a whole transfer including the body; `connect_timeout` bounds
    /// connection establishment.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("nupkg-restore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// URL the archive for `reference` is fetched from
    pub fn archive_url(&self, reference: &PackageReference) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            reference.id_lower(),
            reference.normalized_version(),
            reference.archive_file_name()
        )
    }

    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let io_error = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify(url, e))?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        Ok(written)
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(
        &self,
        reference: &PackageReference,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<u64, FetchError> {
        let url = self.archive_url(reference);
        debug!(%reference, %url, dest = %dest.display(), "downloading archive");

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.download(&url, dest) => result,
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        FetchError::Transfer {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(base: &str, token: Option<&str>, timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(
            base,
            token.map(str::to_string),
            timeout,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn archive_url_uses_flat_container_layout() {
        let fetcher = fetcher("https://gallery.test/v3-flatcontainer/", None, Duration::from_secs(1));
        let reference = PackageReference::new("Newtonsoft.Json", "13.0.1");
        assert_eq!(
            fetcher.archive_url(&reference),
            "https://gallery.test/v3-flatcontainer/newtonsoft.json/13.0.1/newtonsoft.json.13.0.1.nupkg"
        );
    }

    #[tokio::test]
    async fn streams_body_to_destination_with_bearer_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkg/1.0.0/pkg.1.0.0.nupkg"))
            .and(header("Authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive-bytes".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.part");
        let fetcher = fetcher(&mock_server.uri(), Some("s3cret"), Duration::from_secs(5));

        let written = fetcher
            .fetch(&PackageReference::new("Pkg", "1.0"), &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
    }

    #[tokio::test]
    async fn not_found_is_status_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&mock_server.uri(), None, Duration::from_secs(5));
        let err = fetcher
            .fetch(
                &PackageReference::new("Missing", "1.0"),
                &dir.path().join("missing.part"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&mock_server.uri(), None, Duration::from_millis(200));
        let err = fetcher
            .fetch(
                &PackageReference::new("Slow", "1.0"),
                &dir.path().join("slow.part"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&mock_server.uri(), None, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = fetcher
            .fetch(
                &PackageReference::new("Slow", "1.0"),
                &dir.path().join("slow.part"),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn connection_refused_is_connect_error() {
        // Bind and drop a listener to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&format!("http://127.0.0.1:{port}"), None, Duration::from_secs(5));
        let err = fetcher
            .fetch(
                &PackageReference::new("A", "1.0"),
                &dir.path().join("a.part"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Connect { .. }), "got {err:?}");
    }
}
