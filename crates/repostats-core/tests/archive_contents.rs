//! Integration tests for archive packaging.

use repostats_core::fakes::StaticTrafficSource;
use repostats_core::{ArchiveBuilder, PackagingError, RepoSlug, RunIdentity, StatsFetcher};
use std::io::Read;

fn identity() -> RunIdentity {
    let slug: RepoSlug = "acme/widget".parse().unwrap();
    RunIdentity::new(slug, "main", "42").unwrap()
}

/// Test: fetched reports are packaged as four flat entries
#[tokio::test]
async fn test_archive_holds_four_flat_entries() {
    let dir = tempfile::tempdir().unwrap();
    let reports_dir = dir.path().join("reports");
    let source = StaticTrafficSource::all_empty_json();
    let reports = StatsFetcher::new(&source).fetch_all(&reports_dir).await.unwrap();
    let inputs: Vec<_> = reports.iter().map(|r| r.path.clone()).collect();

    let archive = ArchiveBuilder::new(&identity())
        .unwrap()
        .build(&inputs, &dir.path().join("out"))
        .unwrap();

    assert_eq!(archive.name, "widget.main.42.zip");
    assert!(archive.path.ends_with("out/widget.main.42.zip"));
    assert_eq!(archive.digest.len(), 64);

    let file = std::fs::File::open(&archive.path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    assert_eq!(zip.len(), 4);

    let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["clones.json", "paths.json", "referrers.json", "views.json"]
    );

    for name in &names {
        let mut entry = zip.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "{}", "{name} content mismatch");
    }
}

/// Test: identical inputs produce identical archive bytes
#[test]
fn test_archive_bytes_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views.json");
    std::fs::write(&views, br#"{"count":1}"#).unwrap();

    let builder = ArchiveBuilder::new(&identity()).unwrap();
    let first = builder.build(&[views.clone()], &dir.path().join("a")).unwrap();
    let second = builder.build(&[views], &dir.path().join("b")).unwrap();

    assert_eq!(first.digest, second.digest);
    assert_eq!(
        std::fs::read(&first.path).unwrap(),
        std::fs::read(&second.path).unwrap()
    );
}

/// Test: an existing archive is never overwritten
#[test]
fn test_existing_archive_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views.json");
    std::fs::write(&views, b"{}").unwrap();
    let out = dir.path().join("out");

    let builder = ArchiveBuilder::new(&identity()).unwrap();
    builder.build(&[views.clone()], &out).unwrap();
    let err = builder.build(&[views], &out).unwrap_err();
    assert!(matches!(err, PackagingError::AlreadyExists(_)));
}

/// Test: a failed build leaves no partial file behind
#[test]
fn test_missing_input_leaves_output_dir_clean() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    let builder = ArchiveBuilder::new(&identity()).unwrap();
    let err = builder
        .build(&[dir.path().join("views.json")], &out)
        .unwrap_err();

    assert!(matches!(err, PackagingError::MissingInput(_)));
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}
