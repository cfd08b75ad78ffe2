//! In-memory fakes for the fetch seam (testing only)
//!
//! Provides `StaticTrafficSource`, a `TrafficSource` that answers from a
//! fixed table and records which reports were requested.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::fetch::TrafficSource;
use crate::report::ReportKind;

/// Canned answer for one report kind.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// 2xx with this body.
    Body(Vec<u8>),

    /// Non-2xx status.
    Status(u16),

    /// Request timed out.
    Timeout,
}

impl FakeResponse {
    pub fn body(bytes: impl Into<Vec<u8>>) -> Self {
        FakeResponse::Body(bytes.into())
    }
}

/// Traffic source backed by a `HashMap<ReportKind, FakeResponse>`.
///
/// Kinds without an entry answer with HTTP 404.
#[derive(Debug, Default)]
pub struct StaticTrafficSource {
    responses: HashMap<ReportKind, FakeResponse>,
    calls: Mutex<Vec<ReportKind>>,
}

impl StaticTrafficSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report answers `{}`.
    pub fn all_empty_json() -> Self {
        ReportKind::ALL
            .iter()
            .fold(Self::new(), |source, kind| {
                source.with(*kind, FakeResponse::body(b"{}".to_vec()))
            })
    }

    pub fn with(mut self, kind: ReportKind, response: FakeResponse) -> Self {
        self.responses.insert(kind, response);
        self
    }

    /// Reports requested so far, in call order.
    pub fn calls(&self) -> Vec<ReportKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrafficSource for StaticTrafficSource {
    async fn fetch(&self, kind: ReportKind) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(kind);
        match self.responses.get(&kind) {
            Some(FakeResponse::Body(body)) => Ok(body.clone()),
            Some(FakeResponse::Status(status)) => Err(FetchError::Status {
                report: kind.name(),
                status: *status,
                message: String::new(),
            }),
            Some(FakeResponse::Timeout) => Err(FetchError::Timeout {
                report: kind.name(),
            }),
            None => Err(FetchError::Status {
                report: kind.name(),
                status: 404,
                message: "Not Found".to_string(),
            }),
        }
    }
}
