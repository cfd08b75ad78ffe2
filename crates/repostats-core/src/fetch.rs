//! Traffic report fetching.
//!
//! [`GitHubTrafficClient`] talks to the REST API; [`StatsFetcher`] drives any
//! [`TrafficSource`] over the four report kinds and writes the bodies to disk.
//! Bodies are only written once every request has succeeded, so a failed
//! fetch never leaves a partial report set behind.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ApiConfig, ApiToken, RepoSlug};
use crate::error::FetchError;
use crate::obs;
use crate::report::{FetchedReport, Granularity, ReportKind};

/// Media type requested from the REST API.
pub const ACCEPT_HEADER: &str = "application/vnd.github+json";

/// REST API version pinned in every request.
pub const API_VERSION: &str = "2022-11-28";

/// Longest error body excerpt kept in a [`FetchError::Status`].
const ERROR_BODY_LIMIT: usize = 512;

/// Anything that can produce the raw body of a traffic report.
#[async_trait]
pub trait TrafficSource: Send + Sync {
    async fn fetch(&self, kind: ReportKind) -> Result<Vec<u8>, FetchError>;
}

/// REST API client for the traffic endpoints of one repository.
pub struct GitHubTrafficClient {
    http: reqwest::Client,
    base_url: String,
    repository: RepoSlug,
    token: ApiToken,
    per: Option<Granularity>,
}

impl GitHubTrafficClient {
    pub fn new(api: &ApiConfig, repository: &RepoSlug, token: ApiToken) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repostats/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(GitHubTrafficClient {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            repository: repository.clone(),
            token,
            per: api.per,
        })
    }

    /// Full request URL for a report, including the `per` parameter where accepted.
    pub fn report_url(&self, kind: ReportKind) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/traffic/{}",
            self.base_url,
            self.repository.owner,
            self.repository.name,
            kind.sub_resource()
        );
        if let Some(per) = self.per.filter(|_| kind.supports_granularity()) {
            url.push_str("?per=");
            url.push_str(per.as_str());
        }
        url
    }

    fn transport_error(kind: ReportKind, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                report: kind.name(),
            }
        } else {
            FetchError::Transport {
                report: kind.name(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl TrafficSource for GitHubTrafficClient {
    async fn fetch(&self, kind: ReportKind) -> Result<Vec<u8>, FetchError> {
        let url = self.report_url(kind);
        debug!(report = %kind, url = %url, "Requesting traffic report");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .bearer_auth(self.token.expose())
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| Self::transport_error(kind, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut message = self.token.redact(body.trim());
            if message.len() > ERROR_BODY_LIMIT {
                let cut = (0..=ERROR_BODY_LIMIT)
                    .rev()
                    .find(|i| message.is_char_boundary(*i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(FetchError::Status {
                report: kind.name(),
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(kind, e))?;
        Ok(bytes.to_vec())
    }
}

/// Fetches all four reports from a source and writes them to a directory.
pub struct StatsFetcher<'a> {
    source: &'a dyn TrafficSource,
    parallel: bool,
}

impl<'a> StatsFetcher<'a> {
    pub fn new(source: &'a dyn TrafficSource) -> Self {
        StatsFetcher {
            source,
            parallel: false,
        }
    }

    /// Issue the four requests concurrently instead of one after another.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fetch every report and write each body verbatim to `out_dir`.
    ///
    /// Stops at the first failed request; nothing is written in that case.
    pub async fn fetch_all(&self, out_dir: &Path) -> Result<Vec<FetchedReport>, FetchError> {
        let bodies = if self.parallel {
            futures::future::try_join_all(ReportKind::ALL.iter().map(|kind| async move {
                let body = self.source.fetch(*kind).await?;
                Ok::<_, FetchError>((*kind, body))
            }))
            .await?
        } else {
            let mut bodies = Vec::with_capacity(ReportKind::ALL.len());
            for kind in ReportKind::ALL {
                let body = self.source.fetch(kind).await?;
                bodies.push((kind, body));
            }
            bodies
        };

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|source| FetchError::Write {
                path: out_dir.display().to_string(),
                source,
            })?;

        let mut reports = Vec::with_capacity(bodies.len());
        for (kind, body) in bodies {
            let path = out_dir.join(kind.file_name());
            tokio::fs::write(&path, &body)
                .await
                .map_err(|source| FetchError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            obs::emit_report_fetched(kind.name(), body.len() as u64);
            reports.push(FetchedReport {
                kind,
                path,
                bytes: body.len() as u64,
            });
        }

        info!(count = reports.len(), dir = %out_dir.display(), "Traffic reports written");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeResponse, StaticTrafficSource};

    fn client(per: Option<Granularity>) -> GitHubTrafficClient {
        let api = ApiConfig::new("https://api.github.com/").with_per(per);
        let slug: RepoSlug = "acme/widget".parse().unwrap();
        GitHubTrafficClient::new(&api, &slug, ApiToken::new("t").unwrap()).unwrap()
    }

    #[test]
    fn test_report_urls() {
        let client = client(None);
        assert_eq!(
            client.report_url(ReportKind::Views),
            "https://api.github.com/repos/acme/widget/traffic/views"
        );
        assert_eq!(
            client.report_url(ReportKind::Referrers),
            "https://api.github.com/repos/acme/widget/traffic/popular/referrers"
        );
        assert_eq!(
            client.report_url(ReportKind::Paths),
            "https://api.github.com/repos/acme/widget/traffic/popular/paths"
        );
    }

    #[test]
    fn test_per_only_applies_to_time_series() {
        let client = client(Some(Granularity::Week));
        assert!(client.report_url(ReportKind::Clones).ends_with("/clones?per=week"));
        assert!(client.report_url(ReportKind::Paths).ends_with("/popular/paths"));
    }

    #[tokio::test]
    async fn test_fetch_all_writes_bodies_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticTrafficSource::new()
            .with(ReportKind::Views, FakeResponse::body(b"{\"count\":3}\n".to_vec()))
            .with(ReportKind::Clones, FakeResponse::body(b"{}".to_vec()))
            .with(ReportKind::Referrers, FakeResponse::body(b"[]".to_vec()))
            .with(ReportKind::Paths, FakeResponse::body("[\"\u{e9}\"]".as_bytes().to_vec()));

        let reports = StatsFetcher::new(&source)
            .fetch_all(dir.path())
            .await
            .unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(
            std::fs::read(dir.path().join("views.json")).unwrap(),
            b"{\"count\":3}\n"
        );
        assert_eq!(
            std::fs::read(dir.path().join("paths.json")).unwrap(),
            "[\"\u{e9}\"]".as_bytes()
        );
        assert_eq!(reports[0].bytes, 12);
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let source = StaticTrafficSource::all_empty_json()
            .with(ReportKind::Referrers, FakeResponse::Status(500));

        let err = StatsFetcher::new(&source).fetch_all(&out).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_sequential_fetch_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticTrafficSource::all_empty_json()
            .with(ReportKind::Views, FakeResponse::Status(401));

        let err = StatsFetcher::new(&source)
            .fetch_all(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { report: "views", status: 401, .. }));
        assert_eq!(source.calls(), vec![ReportKind::Views]);
    }

    #[tokio::test]
    async fn test_parallel_fetch_writes_all_reports() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticTrafficSource::all_empty_json();

        let reports = StatsFetcher::new(&source)
            .parallel(true)
            .fetch_all(dir.path())
            .await
            .unwrap();

        assert_eq!(reports.len(), 4);
        for kind in ReportKind::ALL {
            assert_eq!(std::fs::read(dir.path().join(kind.file_name())).unwrap(), b"{}");
        }
    }

    #[tokio::test]
    async fn test_parallel_fetch_propagates_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let source =
            StaticTrafficSource::all_empty_json().with(ReportKind::Clones, FakeResponse::Timeout);

        let err = StatsFetcher::new(&source)
            .parallel(true)
            .fetch_all(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { report: "clones" }));
        assert!(!dir.path().join("views.json").exists());
    }
}
