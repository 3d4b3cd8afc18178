//! End-to-end restores from a directory of pre-placed archives
//!
//! These tests run the real pipeline (`DirectoryFetcher` + `NupkgExtractor`) against
//! archives built on the fly, and check the resulting feed on disk.

mod common;

use common::{
    assert_entry_complete, assert_no_entry, assert_no_leftovers, nupkg_bytes, snapshot,
    test_config, write_nupkg,
};
use nupkg_restore::reference_set::parse_references;
use nupkg_restore::{
    Event, FailureReason, FeedStatus, ItemOutcome, PackageReference, Restorer, SourceLocation,
    feed,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn restores_pre_placed_packages_into_feed_layout() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    write_nupkg(&archives, "Contoso.Core", "1.0");
    write_nupkg(&archives, "Contoso.Extensions", "2.1.0");

    let config = test_config(root.path(), SourceLocation::Directory(archives.clone()));
    let restorer = Restorer::from_config(config.clone()).unwrap();

    let references =
        parse_references("Contoso.Core 1.0\nContoso.Extensions 2.1.0\n# not a package line\n");
    let report = restorer
        .run_all(references, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_success(), "report: {report:?}");
    assert_eq!(report.succeeded, 2);

    let core = assert_entry_complete(&config.feed_dir, "Contoso.Core", "1.0");
    assert!(core.ends_with("contoso.core/1.0.0"));
    assert!(core.join("lib/net8.0/Library.dll").is_file());
    assert!(!core.join("_rels").exists());
    assert_entry_complete(&config.feed_dir, "Contoso.Extensions", "2.1.0");

    assert!(
        archives.join("Contoso.Core.1.0.nupkg").is_file(),
        "pre-placed archives are left alone"
    );
    assert_no_leftovers(&config.download_dir, &config.feed_dir);
}

#[tokio::test]
async fn rerun_skips_and_keeps_feed_identical() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    write_nupkg(&archives, "A", "1.0");
    write_nupkg(&archives, "B", "2.0");
    let config = test_config(root.path(), SourceLocation::Directory(archives));
    let references = parse_references("A 1.0\nB 2.0\n");

    Restorer::from_config(config.clone())
        .unwrap()
        .run_all(references.clone(), &CancellationToken::new())
        .await
        .unwrap();
    let before = snapshot(&config.feed_dir);

    let report = Restorer::from_config(config.clone())
        .unwrap()
        .run_all(references, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.succeeded, 0);
    assert_eq!(snapshot(&config.feed_dir), before);
}

#[tokio::test]
async fn missing_archive_fails_without_affecting_siblings() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    write_nupkg(&archives, "Present", "1.0");
    let config = test_config(root.path(), SourceLocation::Directory(archives));
    let restorer = Restorer::from_config(config.clone()).unwrap();
    let mut events = restorer.subscribe();

    let report = restorer
        .run_all(
            parse_references("Present 1.0\nAbsent 1.0\n"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.is_success());
    match report.outcome(&PackageReference::new("Absent", "1.0")) {
        Some(ItemOutcome::Failed { reason, attempts }) => {
            assert_eq!(*attempts, config.retry.max_attempts);
            assert_eq!(reason.class(), "TransportError");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_entry_complete(&config.feed_dir, "Present", "1.0");
    assert_no_entry(&config.feed_dir, "Absent");
    assert_no_leftovers(&config.download_dir, &config.feed_dir);

    let mut attempt_failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::AttemptFailed { .. }) {
            attempt_failures += 1;
        }
    }
    assert_eq!(attempt_failures, config.retry.max_attempts);
}

#[tokio::test]
async fn archive_with_wrong_identity_is_a_signature_failure() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    std::fs::create_dir_all(&archives).unwrap();
    std::fs::write(
        archives.join("Wanted.1.0.nupkg"),
        nupkg_bytes("Impostor", "6.6.6", &[]),
    )
    .unwrap();
    let config = test_config(root.path(), SourceLocation::Directory(archives));

    let report = Restorer::from_config(config.clone())
        .unwrap()
        .run_all(parse_references("Wanted 1.0\n"), &CancellationToken::new())
        .await
        .unwrap();

    match report.outcome(&PackageReference::new("Wanted", "1.0")) {
        Some(ItemOutcome::Failed {
            reason: FailureReason::Signature { identity, issues },
            ..
        }) => {
            assert_eq!(identity, "Impostor 6.6.6");
            assert!(issues.iter().any(|i| i.code == "NU3008"));
        }
        other => panic!("expected signature failure, got {other:?}"),
    }
    assert_no_entry(&config.feed_dir, "Wanted");
    assert_no_leftovers(&config.download_dir, &config.feed_dir);
}

#[tokio::test]
async fn corrupt_feed_entry_is_replaced() {
    let root = tempfile::tempdir().unwrap();
    let archives = root.path().join("archives");
    write_nupkg(&archives, "Broken", "3.0");
    let config = test_config(root.path(), SourceLocation::Directory(archives));

    let reference = PackageReference::new("Broken", "3.0");
    let entry = feed::entry_dir(&config.feed_dir, &reference);
    std::fs::create_dir_all(&entry).unwrap();
    std::fs::write(entry.join(feed::archive_file_name(&reference)), b"truncated").unwrap();
    std::fs::write(entry.join(feed::nuspec_file_name(&reference)), b"<package/>").unwrap();
    std::fs::write(entry.join(feed::hash_file_name(&reference)), b"bm90IHRoZSBoYXNo").unwrap();
    assert!(matches!(
        feed::check_membership(&reference, &config.feed_dir).await.unwrap(),
        FeedStatus::PresentInvalid { .. }
    ));

    let report = Restorer::from_config(config.clone())
        .unwrap()
        .run_all(vec![reference.clone()], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome(&reference),
        Some(&ItemOutcome::Succeeded { attempts: 1 })
    );
    assert_entry_complete(&config.feed_dir, "Broken", "3.0");
}
