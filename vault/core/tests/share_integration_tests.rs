// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for public links and direct shares
//!
//! These tests verify:
//! 1. Public shares expose exactly their roots, addressed by virtual paths
//! 2. Escape attempts are indistinguishable from missing paths
//! 3. Direct shares notify recipients and disappear on revoke
//! 4. Share scope checks respect path-segment boundaries

use async_trait::async_trait;
use dashvault_core::application::share_service::{ShareService, StandardShareService};
use dashvault_core::application::virtual_path::{ContentView, Download, VirtualPathMapper};
use dashvault_core::domain::containment::resolve_real_path;
use dashvault_core::domain::errors::VfsError;
use dashvault_core::domain::events::AccessEvent;
use dashvault_core::domain::identity::{Identity, UserId};
use dashvault_core::domain::path_resolver::PathResolver;
use dashvault_core::domain::share::{NotificationError, NotificationSink, Severity, ShareScope};
use dashvault_core::infrastructure::archive::{ZipArchiveBrowser, ZipPackager};
use dashvault_core::infrastructure::event_bus::{DomainEvent, EventBus};
use dashvault_core::infrastructure::repositories::{
    InMemoryDirectShareRepository, InMemoryIdentityRepository, InMemoryPublicShareRepository,
};
use dashvault_core::infrastructure::storage::LocalStorageProvider;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const CAROL: UserId = UserId(3);

// Mock notification sink recording every delivery
#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<(UserId, String, Severity)>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, recipient: UserId, message: &str, severity: Severity) -> Result<(), NotificationError> {
        self.delivered.lock().push((recipient, message.to_string(), severity));
        Ok(())
    }
}

// Sink that always fails; share creation must not depend on delivery
struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn notify(&self, _recipient: UserId, _message: &str, _severity: Severity) -> Result<(), NotificationError> {
        Err(NotificationError("inbox unavailable".to_string()))
    }
}

struct Harness {
    _temp: TempDir,
    alice_home: PathBuf,
    shares: StandardShareService,
    sink: Arc<RecordingSink>,
    event_bus: Arc<EventBus>,
}

fn harness_with_sink(sink: Arc<dyn NotificationSink>) -> (TempDir, PathBuf, StandardShareService, Arc<EventBus>) {
    let temp = TempDir::new().unwrap();
    let base = resolve_real_path(temp.path()).unwrap();
    let home_base = base.join("home");
    let alice_home = home_base.join("alice");

    std::fs::create_dir_all(alice_home.join("reports/archive")).unwrap();
    std::fs::create_dir_all(alice_home.join("media")).unwrap();
    std::fs::create_dir_all(alice_home.join("docs")).unwrap();
    std::fs::create_dir_all(alice_home.join("docs-private")).unwrap();
    std::fs::create_dir_all(home_base.join("bob")).unwrap();
    std::fs::write(alice_home.join("reports/q1.csv"), "quarter,revenue\nq1,100\n").unwrap();
    std::fs::write(alice_home.join("reports/archive/old.csv"), "quarter,revenue\nq4,90\n").unwrap();
    std::fs::write(alice_home.join("media/movie.mp4"), b"\x00\x00\x00\x18ftypmp42").unwrap();
    std::fs::write(alice_home.join("docs/readme.txt"), "public").unwrap();
    std::fs::write(alice_home.join("docs-private/keys.txt"), "private").unwrap();

    let identities = InMemoryIdentityRepository::new();
    identities.insert(Identity::standard(1, "alice"));
    identities.insert(Identity::standard(2, "bob"));
    identities.insert(Identity::standard(3, "carol"));

    let resolver = Arc::new(PathResolver::new(Arc::new(identities), home_base));
    let storage = Arc::new(LocalStorageProvider::new());
    let mapper = Arc::new(VirtualPathMapper::new(
        resolver.clone(),
        storage.clone(),
        Arc::new(ZipArchiveBrowser::new(1024 * 1024)),
        Arc::new(ZipPackager::default()),
        1024 * 1024,
    ));
    let event_bus = Arc::new(EventBus::new(128));

    let shares = StandardShareService::new(
        resolver,
        mapper,
        storage,
        Arc::new(InMemoryPublicShareRepository::new()),
        Arc::new(InMemoryDirectShareRepository::new()),
        sink,
        event_bus.clone(),
    );
    (temp, alice_home, shares, event_bus)
}

fn harness() -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let (temp, alice_home, shares, event_bus) = harness_with_sink(sink.clone());
    Harness {
        _temp: temp,
        alice_home,
        shares,
        sink,
        event_bus,
    }
}

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_public_share_end_to_end() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "demo", &paths(&["/reports"])).await.unwrap();
    let token = share.token.to_string();

    // Anonymous details list the root item
    let details = h.shares.public_share_details(&token).await.unwrap();
    assert_eq!(details.name, "demo");
    let names: Vec<&str> = details.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["reports"]);

    // Nested file downloads
    let download = h.shares.open_public_share(&token, "/archive/old.csv").await.unwrap();
    match download {
        Download::File { name, real, .. } => {
            assert_eq!(name, "old.csv");
            assert_eq!(std::fs::read_to_string(real).unwrap(), "quarter,revenue\nq4,90\n");
        }
        other => panic!("expected a file download, got {:?}", other),
    }

    // Escape attempts fail exactly like a missing file
    let escape = h.shares.open_public_share(&token, "/../../etc/passwd").await.unwrap_err();
    let missing = h.shares.open_public_share(&token, "/archive/new.csv").await.unwrap_err();
    assert_eq!(escape.to_string(), missing.to_string());
    assert_eq!(escape.status_code(), 404);
    assert_eq!(missing.status_code(), 404);
}

#[tokio::test]
async fn test_public_share_escape_is_audited() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "demo", &paths(&["/reports"])).await.unwrap();
    let mut events = h.event_bus.subscribe();

    let _ = h.shares.open_public_share(share.token.as_str(), "/../../etc/passwd").await;

    match events.try_recv().unwrap() {
        DomainEvent::Access(AccessEvent::AccessRejected { user, attempted_path, .. }) => {
            assert_eq!(user, None);
            assert_eq!(attempted_path, "/../../etc/passwd");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_public_share_creation_is_all_or_nothing() {
    let h = harness();
    let err = h
        .shares
        .create_public_share(ALICE, "mixed", &paths(&["/reports", "/does-not-exist"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.shares.list_public_shares(ALICE).await.unwrap().is_empty());

    let err = h
        .shares
        .create_public_share(ALICE, "escape", &paths(&["/reports", "/../bob"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::OutOfBounds));
    assert!(h.shares.list_public_shares(ALICE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_only_owner_deletes_public_share() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "demo", &paths(&["/reports"])).await.unwrap();
    let token = share.token.to_string();

    let err = h.shares.delete_public_share(&token, BOB).await.unwrap_err();
    assert!(matches!(err, VfsError::Unauthorized(_)));

    h.shares.delete_public_share(&token, ALICE).await.unwrap();
    assert!(h.shares.public_share_details(&token).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_whole_share_download_is_an_archive() {
    let h = harness();
    let share = h
        .shares
        .create_public_share(ALICE, "bundle", &paths(&["/reports", "/docs/readme.txt"]))
        .await
        .unwrap();

    match h.shares.open_public_share(share.token.as_str(), "/").await.unwrap() {
        Download::Archive { name, data } => {
            assert_eq!(name, "bundle.zip");
            let archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
            let names: Vec<&str> = archive.file_names().collect();
            assert!(names.contains(&"readme.txt"));
            assert!(names.contains(&"reports/archive/old.csv"));
            assert!(!names.iter().any(|n| n.contains("docs-private")));
        }
        other => panic!("expected an archive, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_share_end_to_end() {
    let h = harness();
    let created = h
        .shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/media/movie.mp4"]), false)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    let share_id = created[0].id.to_string();

    // Bob was notified by name
    let delivered = h.sink.delivered.lock().clone();
    assert_eq!(
        delivered,
        vec![(BOB, "'movie.mp4' was shared with you by alice.".to_string(), Severity::Info)]
    );

    // Bob sees it and can download it
    let listed = h.shares.shared_with_me(BOB).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "movie.mp4");
    assert_eq!(listed[0].counterpart_name, "alice");

    let download = h.shares.open_direct_share(BOB, &share_id, "/movie.mp4").await.unwrap();
    assert!(matches!(download, Download::File { ref name, .. } if name == "movie.mp4"));

    // Nobody else can use the share id
    assert!(h.shares.open_direct_share(CAROL, &share_id, "/movie.mp4").await.unwrap_err().is_not_found());

    // Revoked by the sharer, then gone for the recipient
    let revoked = h.shares.revoke(&[share_id.clone()], ALICE).await.unwrap();
    assert_eq!(revoked, vec![created[0].id]);
    let err = h.shares.open_direct_share(BOB, &share_id, "/movie.mp4").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.shares.shared_with_me(BOB).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_file_direct_share_opens_at_root() {
    let h = harness();
    let created = h
        .shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/media/movie.mp4"]), false)
        .await
        .unwrap();
    let share_id = created[0].id.to_string();

    match h.shares.open_direct_share(BOB, &share_id, "/").await.unwrap() {
        Download::File { name, real, size } => {
            assert_eq!(name, "movie.mp4");
            assert_eq!(real, h.alice_home.join("media/movie.mp4"));
            assert_eq!(size, 12);
        }
        other => panic!("expected the file itself, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_share_content_is_readable_by_recipient_only() {
    let h = harness();
    let created = h
        .shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/reports"]), false)
        .await
        .unwrap();
    let share_id = created[0].id.to_string();

    let view = h.shares.read_direct_share(BOB, &share_id, "/reports/q1.csv").await.unwrap();
    assert_eq!(
        view,
        ContentView::Text {
            path: "/reports/q1.csv".to_string(),
            size: 23,
            content: "quarter,revenue\nq1,100\n".to_string(),
        }
    );

    let err = h.shares.read_direct_share(CAROL, &share_id, "/reports/q1.csv").await.unwrap_err();
    assert!(err.is_not_found());

    let mut events = h.event_bus.subscribe();
    let err = h.shares.read_direct_share(BOB, &share_id, "/../docs-private/keys.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        events.try_recv().unwrap(),
        DomainEvent::Access(AccessEvent::AccessRejected { user: Some(BOB), .. })
    ));
}

#[tokio::test]
async fn test_public_selection_skips_items_it_cannot_map() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "docs", &paths(&["/docs"])).await.unwrap();
    let token = share.token.to_string();
    let mut events = h.event_bus.subscribe();

    let data = h
        .shares
        .download_public_selection(&token, &paths(&["/docs/readme.txt", "/docs/nope.txt", "/../docs-private/keys.txt"]))
        .await
        .unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert_eq!(names, vec!["readme.txt"]);

    // The escape attempt is still audited
    match events.try_recv().unwrap() {
        DomainEvent::Access(AccessEvent::AccessRejected { attempted_path, .. }) => {
            assert_eq!(attempted_path, "/../docs-private/keys.txt");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(events.try_recv().is_err());

    let err = h
        .shares
        .download_public_selection(&token, &paths(&["/docs/nope.txt"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_direct_share_skips_self_and_duplicates() {
    let h = harness();
    let first = h
        .shares
        .create_direct_share(ALICE, &[ALICE, BOB], &paths(&["/docs"]), false)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].recipient, BOB);

    let again = h
        .shares
        .create_direct_share(ALICE, &[BOB, CAROL], &paths(&["/docs"]), false)
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].recipient, CAROL);
    assert_eq!(h.shares.shared_by_me(ALICE).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_direct_share_validates_all_paths_first() {
    let h = harness();
    let err = h
        .shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/docs", "/nope"]), false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.shares.shared_with_me(BOB).await.unwrap().is_empty());
    assert!(h.sink.delivered.lock().is_empty());
}

#[tokio::test]
async fn test_revoke_requires_a_party() {
    let h = harness();
    let created = h
        .shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/docs"]), false)
        .await
        .unwrap();
    let id = created[0].id.to_string();

    let err = h.shares.revoke(&[id.clone()], CAROL).await.unwrap_err();
    assert!(matches!(err, VfsError::Unauthorized(_)));

    // The recipient may revoke too
    assert_eq!(h.shares.revoke(&[id], BOB).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_notification_failure_does_not_block_sharing() {
    let (_temp, _home, shares, _bus) = harness_with_sink(Arc::new(FailingSink));
    let created = shares
        .create_direct_share(ALICE, &[BOB], &paths(&["/docs"]), false)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
}

#[tokio::test]
async fn test_path_within_share_respects_segment_boundaries() {
    let h = harness();
    let scope = ShareScope {
        owner: ALICE,
        roots: vec!["/docs".to_string()],
        escaped_sandbox: false,
    };

    let root = h.shares.is_path_within_share(&scope, "/docs").await.unwrap();
    assert_eq!(root, h.alice_home.join("docs"));
    let nested = h.shares.is_path_within_share(&scope, "/docs/readme.txt").await.unwrap();
    assert_eq!(nested, h.alice_home.join("docs/readme.txt"));

    for rejected in ["/docs-private", "/docs-private/keys.txt", "/docs/../docs-private/keys.txt", "/reports"] {
        let err = h.shares.is_path_within_share(&scope, rejected).await.unwrap_err();
        assert!(matches!(err, VfsError::OutOfBounds), "accepted {}", rejected);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_inside_share_cannot_reach_unshared_files() {
    let h = harness();
    std::os::unix::fs::symlink(h.alice_home.join("docs-private"), h.alice_home.join("docs/private")).unwrap();
    let share = h.shares.create_public_share(ALICE, "docs", &paths(&["/docs"])).await.unwrap();

    let err = h
        .shares
        .open_public_share(share.token.as_str(), "/private/keys.txt")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let scope = ShareScope {
        owner: ALICE,
        roots: vec!["/docs".to_string()],
        escaped_sandbox: false,
    };
    assert!(h.shares.is_path_within_share(&scope, "/docs/private/keys.txt").await.is_err());
}
