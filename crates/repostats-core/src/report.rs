//! Traffic report kinds and fetched report metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// The four traffic sub-resources exposed by the GitHub REST API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// GET /repos/{owner}/{repo}/traffic/views
    Views,

    /// GET /repos/{owner}/{repo}/traffic/clones
    Clones,

    /// GET /repos/{owner}/{repo}/traffic/popular/referrers
    Referrers,

    /// GET /repos/{owner}/{repo}/traffic/popular/paths
    Paths,
}

impl ReportKind {
    /// All report kinds, in fetch order.
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Views,
        ReportKind::Clones,
        ReportKind::Referrers,
        ReportKind::Paths,
    ];

    /// Get the report name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Views => "views",
            ReportKind::Clones => "clones",
            ReportKind::Referrers => "referrers",
            ReportKind::Paths => "paths",
        }
    }

    /// Path below `/traffic/` for this report.
    pub fn sub_resource(&self) -> &'static str {
        match self {
            ReportKind::Views => "views",
            ReportKind::Clones => "clones",
            ReportKind::Referrers => "popular/referrers",
            ReportKind::Paths => "popular/paths",
        }
    }

    /// File the response body is written to.
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportKind::Views => "views.json",
            ReportKind::Clones => "clones.json",
            ReportKind::Referrers => "referrers.json",
            ReportKind::Paths => "paths.json",
        }
    }

    /// Whether the endpoint accepts the `per` query parameter.
    pub fn supports_granularity(&self) -> bool {
        matches!(self, ReportKind::Views | ReportKind::Clones)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bucket size for the views and clones time series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
        }
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            other => Err(ConfigError::Invalid {
                field: "per",
                reason: format!("expected day or week, got {other:?}"),
            }),
        }
    }
}

/// A report body that has been written to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedReport {
    /// Which report this is.
    pub kind: ReportKind,

    /// Where the body was written.
    pub path: PathBuf,

    /// Size of the body in bytes.
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_report_sub_resources() {
        assert_eq!(ReportKind::Views.sub_resource(), "views");
        assert_eq!(ReportKind::Clones.sub_resource(), "clones");
        assert_eq!(ReportKind::Referrers.sub_resource(), "popular/referrers");
        assert_eq!(ReportKind::Paths.sub_resource(), "popular/paths");
    }

    #[test]
    fn test_report_file_names_are_distinct() {
        let names: HashSet<_> = ReportKind::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.ends_with(".json") && !n.contains('/')));
    }

    #[test]
    fn test_granularity_only_for_time_series() {
        assert!(ReportKind::Views.supports_granularity());
        assert!(ReportKind::Clones.supports_granularity());
        assert!(!ReportKind::Referrers.supports_granularity());
        assert!(!ReportKind::Paths.supports_granularity());
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("day".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!(" Week ".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("hour".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_report_kind_serde() {
        let json = serde_json::to_string(&ReportKind::Referrers).unwrap();
        assert_eq!(json, "\"referrers\"");
    }
}
