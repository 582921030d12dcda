// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for browsing inside zip archives
//!
//! These tests verify:
//! 1. Owners, public links and direct shares can list and read zip members
//! 2. Archive-internal parent references are rejected
//! 3. Only zip files can be browsed
//! 4. Archives outside a share's roots stay unreachable through the share

use async_trait::async_trait;
use dashvault_core::application::file_service::{FileService, StandardFileService};
use dashvault_core::application::share_service::{ShareService, StandardShareService};
use dashvault_core::application::virtual_path::{ContentView, VirtualEntry, VirtualPathMapper};
use dashvault_core::domain::archive::ArchiveView;
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
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);
const CAROL: UserId = UserId(3);

struct SilentSink;

#[async_trait]
impl NotificationSink for SilentSink {
    async fn notify(&self, _recipient: UserId, _message: &str, _severity: Severity) -> Result<(), NotificationError> {
        Ok(())
    }
}

struct Harness {
    _temp: TempDir,
    files: StandardFileService,
    shares: StandardShareService,
    mapper: Arc<VirtualPathMapper>,
    event_bus: Arc<EventBus>,
}

/// Members ending in `/` are written as directories.
fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, content) in members {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let base = resolve_real_path(temp.path()).unwrap();
    let home_base = base.join("home");
    let alice_home = home_base.join("alice");

    std::fs::create_dir_all(alice_home.join("projects/site")).unwrap();
    std::fs::create_dir_all(alice_home.join("private")).unwrap();
    std::fs::create_dir_all(home_base.join("bob")).unwrap();
    write_zip(
        &alice_home.join("bundle.zip"),
        &[
            ("readme.txt", "top level"),
            ("docs/", ""),
            ("docs/guide.txt", "guide"),
            ("docs/deep/notes.txt", "deep notes"),
        ],
    );
    write_zip(
        &alice_home.join("projects/site/assets.zip"),
        &[("css/site.css", "body {}"), ("index.html", "<html></html>")],
    );
    write_zip(&alice_home.join("private/secret.zip"), &[("keys.txt", "private")]);
    std::fs::write(alice_home.join("notes.txt"), "plain text").unwrap();
    std::fs::write(alice_home.join("projects/site/index.html"), "<html></html>").unwrap();

    let identities = InMemoryIdentityRepository::new();
    identities.insert(Identity::standard(1, "alice"));
    identities.insert(Identity::standard(2, "bob"));
    identities.insert(Identity::standard(3, "carol"));

    let resolver = Arc::new(PathResolver::new(Arc::new(identities), home_base));
    let storage = Arc::new(LocalStorageProvider::new());
    let browser = Arc::new(ZipArchiveBrowser::new(1024 * 1024));
    let direct_shares = Arc::new(InMemoryDirectShareRepository::new());
    let mapper = Arc::new(VirtualPathMapper::new(
        resolver.clone(),
        storage.clone(),
        browser.clone(),
        Arc::new(ZipPackager::default()),
        1024 * 1024,
    ));
    let event_bus = Arc::new(EventBus::new(128));

    let files = StandardFileService::new(
        resolver.clone(),
        storage.clone(),
        browser,
        direct_shares.clone(),
        1024 * 1024,
        Vec::new(),
    );
    let shares = StandardShareService::new(
        resolver,
        mapper.clone(),
        storage,
        Arc::new(InMemoryPublicShareRepository::new()),
        direct_shares,
        Arc::new(SilentSink),
        event_bus.clone(),
    );

    Harness {
        _temp: temp,
        files,
        shares,
        mapper,
        event_bus,
    }
}

fn listing(view: ArchiveView) -> (String, Vec<(String, String, bool)>) {
    match view {
        ArchiveView::Listing { path, entries } => (
            path,
            entries.into_iter().map(|e| (e.name, e.path, e.is_dir)).collect(),
        ),
        other => panic!("expected a listing, got {:?}", other),
    }
}

fn entry(name: &str, path: &str, is_dir: bool) -> (String, String, bool) {
    (name.to_string(), path.to_string(), is_dir)
}

#[tokio::test]
async fn test_owner_browses_archive_levels_and_members() {
    let h = harness();

    let (path, entries) = listing(h.files.browse_archive(ALICE, "/bundle.zip", "", false).await.unwrap());
    assert_eq!(path, "");
    assert_eq!(entries, vec![entry("docs", "docs", true), entry("readme.txt", "readme.txt", false)]);

    let (path, entries) = listing(h.files.browse_archive(ALICE, "/bundle.zip", "docs/", false).await.unwrap());
    assert_eq!(path, "docs");
    assert_eq!(
        entries,
        vec![entry("deep", "docs/deep", true), entry("guide.txt", "docs/guide.txt", false)]
    );

    let member = h.files.browse_archive(ALICE, "/bundle.zip", "docs/guide.txt", false).await.unwrap();
    assert_eq!(
        member,
        ArchiveView::File {
            path: "docs/guide.txt".to_string(),
            size: 5,
            content: "guide".to_string(),
        }
    );

    let err = h.files.browse_archive(ALICE, "/bundle.zip", "docs/missing.txt", false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_archive_parent_references_rejected() {
    let h = harness();

    for internal in ["../notes.txt", "docs/../../private/secret.zip", "docs/../readme.txt"] {
        let err = h.files.browse_archive(ALICE, "/bundle.zip", internal, false).await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidInput(_)), "{} gave {:?}", internal, err);
    }
}

#[tokio::test]
async fn test_only_zip_files_are_browsable() {
    let h = harness();

    let err = h.files.browse_archive(ALICE, "/notes.txt", "", false).await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidInput(ref msg) if msg == "Not a browsable archive"));

    let err = h.files.browse_archive(ALICE, "/projects", "", false).await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidInput(_)));
}

#[tokio::test]
async fn test_public_link_reads_into_archive() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "bundle", &["/bundle.zip".to_string()]).await.unwrap();
    let token = share.token.to_string();

    // Viewing the zip itself shows its top level
    match h.shares.read_public_share(&token, "/bundle.zip").await.unwrap() {
        ContentView::Archive { path, view } => {
            assert_eq!(path, "/bundle.zip");
            let (_, entries) = listing(view);
            assert_eq!(entries, vec![entry("docs", "docs", true), entry("readme.txt", "readme.txt", false)]);
        }
        other => panic!("expected an archive view, got {:?}", other),
    }

    let (path, entries) = listing(h.shares.browse_public_archive(&token, "/bundle.zip", "docs/deep/").await.unwrap());
    assert_eq!(path, "docs/deep");
    assert_eq!(entries, vec![entry("notes.txt", "docs/deep/notes.txt", false)]);

    let member = h.shares.browse_public_archive(&token, "/bundle.zip", "readme.txt").await.unwrap();
    assert!(matches!(member, ArchiveView::File { ref content, .. } if content == "top level"));

    let err = h.shares.browse_public_archive(&token, "/bundle.zip", "../readme.txt").await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidInput(_)));
}

#[tokio::test]
async fn test_archive_outside_share_root_unreachable() {
    let h = harness();
    let share = h.shares.create_public_share(ALICE, "projects", &["/projects".to_string()]).await.unwrap();
    let token = share.token.to_string();
    let mut events = h.event_bus.subscribe();

    for escape in ["/../private/secret.zip", "/projects/../private/secret.zip"] {
        let err = h.shares.browse_public_archive(&token, escape, "").await.unwrap_err();
        assert!(err.is_not_found());
        match events.try_recv().unwrap() {
            DomainEvent::Access(AccessEvent::AccessRejected { attempted_path, .. }) => {
                assert_eq!(attempted_path, escape);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    // Not shared at all, but indistinguishable from a missing file
    let err = h.shares.browse_public_archive(&token, "/bundle.zip", "").await.unwrap_err();
    assert!(err.is_not_found());
}

#[cfg(unix)]
#[tokio::test]
async fn test_archive_symlink_out_of_share_root_rejected() {
    let h = harness();
    let projects = h.mapper.roots(&scope(&["/projects"])).await.unwrap()[0].resolved.real.clone();
    std::os::unix::fs::symlink(projects.join("../private/secret.zip"), projects.join("site/linked.zip")).unwrap();

    let err = h
        .mapper
        .browse_archive(&scope(&["/projects"]), "/projects/site/linked.zip", "")
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::OutOfBounds));
}

fn scope(roots: &[&str]) -> ShareScope {
    ShareScope {
        owner: ALICE,
        roots: roots.iter().map(|r| r.to_string()).collect(),
        escaped_sandbox: false,
    }
}

#[tokio::test]
async fn test_mapper_browses_archive_under_share_root() {
    let h = harness();
    let share = scope(&["/projects"]);

    let (_, entries) = listing(h.mapper.browse_archive(&share, "/projects/site/assets.zip", "").await.unwrap());
    assert_eq!(entries, vec![entry("css", "css", true), entry("index.html", "index.html", false)]);

    // Relative to the single root as well
    let member = h.mapper.browse_archive(&share, "/site/assets.zip", "css/site.css").await.unwrap();
    assert!(matches!(member, ArchiveView::File { ref content, .. } if content == "body {}"));

    let err = h.mapper.browse_archive(&share, "/projects/site/index.html", "").await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidInput(_)));
}

#[tokio::test]
async fn test_direct_share_descends_into_nested_archive() {
    let h = harness();
    let created = h
        .shares
        .create_direct_share(ALICE, &[BOB], &["/projects".to_string()], false)
        .await
        .unwrap();
    let share_id = created[0].id.to_string();

    let names = |entries: Vec<VirtualEntry>| {
        entries.into_iter().map(|e| e.path).collect::<Vec<_>>()
    };
    assert_eq!(names(h.shares.browse_direct_share(BOB, &share_id, "/").await.unwrap()), vec!["/projects"]);
    assert_eq!(
        names(h.shares.browse_direct_share(BOB, &share_id, "/projects").await.unwrap()),
        vec!["/projects/site"]
    );
    assert_eq!(
        names(h.shares.browse_direct_share(BOB, &share_id, "/projects/site").await.unwrap()),
        vec!["/projects/site/assets.zip", "/projects/site/index.html"]
    );

    let (path, entries) = listing(
        h.shares
            .browse_direct_archive(BOB, &share_id, "/projects/site/assets.zip", "css")
            .await
            .unwrap(),
    );
    assert_eq!(path, "css");
    assert_eq!(entries, vec![entry("site.css", "css/site.css", false)]);

    let view = h.shares.read_direct_share(BOB, &share_id, "/projects/site/assets.zip").await.unwrap();
    assert!(matches!(view, ContentView::Archive { ref path, .. } if path == "/projects/site/assets.zip"));

    let err = h
        .shares
        .browse_direct_archive(BOB, &share_id, "/projects/site/assets.zip", "css/../../x")
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidInput(_)));

    let err = h
        .shares
        .browse_direct_archive(BOB, &share_id, "/projects/../private/secret.zip", "")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = h
        .shares
        .browse_direct_archive(CAROL, &share_id, "/projects/site/assets.zip", "")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
