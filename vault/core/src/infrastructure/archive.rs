// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Zip Archives
//!
//! [`ZipArchiveBrowser`] reads a zip file's central directory and decodes
//! single entries in memory; nothing is ever extracted to disk.
//! [`ZipPackager`] builds the on-the-fly downloads for shares.
//!
//! Member names are validated as archive-internal paths before use. Names
//! that are absolute or contain `..` or `\` are skipped, so they never
//! appear in listings and cannot be addressed.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `zip` crate adapter for the archive contracts

use crate::domain::archive::{ArchiveBrowser, ArchiveEntry, ArchiveError, ArchivePackager, ArchiveView, PackageSource};
use crate::domain::path_sanitizer::PathSanitizer;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A validated member of the archive's central directory.
struct Member {
    index: usize,
    path: String,
    is_dir: bool,
    size: u64,
}

pub struct ZipArchiveBrowser {
    max_entry_bytes: u64,
    sanitizer: PathSanitizer,
}

impl ZipArchiveBrowser {
    pub fn new(max_entry_bytes: u64) -> Self {
        Self {
            max_entry_bytes,
            sanitizer: PathSanitizer::new(),
        }
    }

    fn open(&self, archive: &Path) -> Result<ZipArchive<File>, ArchiveError> {
        let file = File::open(archive).map_err(|e| ArchiveError::Io(e.to_string()))?;
        ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt(e.to_string()))
    }

    fn members<R: Read + Seek>(&self, zip: &mut ZipArchive<R>) -> Result<Vec<Member>, ArchiveError> {
        let mut members = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip
                .by_index_raw(index)
                .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
            let raw_name = entry.name().to_string();
            match self.sanitizer.validate_archive_member(&raw_name) {
                Ok(path) => members.push(Member {
                    index,
                    path,
                    is_dir: entry.is_dir(),
                    size: entry.size(),
                }),
                Err(e) => {
                    tracing::warn!(member = %raw_name.escape_debug(), error = %e, "Skipping unsafe archive member");
                }
            }
        }
        Ok(members)
    }

    /// Immediate children of `prefix` (empty for the archive root),
    /// synthesizing directories that have no explicit member.
    fn list_level(members: &[Member], prefix: &str) -> Option<Vec<ArchiveEntry>> {
        let mut children: BTreeMap<String, ArchiveEntry> = BTreeMap::new();
        let mut prefix_exists = prefix.is_empty();

        for member in members {
            let rest = if prefix.is_empty() {
                member.path.as_str()
            } else if member.path == prefix {
                if member.is_dir {
                    prefix_exists = true;
                }
                continue;
            } else {
                match member.path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            prefix_exists = true;

            let (name, nested) = match rest.split_once('/') {
                Some((first, _)) => (first, true),
                None => (rest, false),
            };
            let is_dir = nested || member.is_dir;
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            };

            let entry = children.entry(name.to_string()).or_insert_with(|| ArchiveEntry {
                name: name.to_string(),
                path,
                is_dir,
                size: 0,
            });
            if is_dir {
                entry.is_dir = true;
                entry.size = 0;
            } else if !entry.is_dir {
                entry.size = member.size;
            }
        }

        if !prefix_exists {
            return None;
        }

        let mut entries: Vec<ArchiveEntry> = children.into_values().collect();
        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Some(entries)
    }

    fn read_member<R: Read + Seek>(
        &self,
        zip: &mut ZipArchive<R>,
        member: &Member,
    ) -> Result<ArchiveView, ArchiveError> {
        if member.size > self.max_entry_bytes {
            return Err(ArchiveError::EntryTooLarge {
                name: member.path.clone(),
                limit_bytes: self.max_entry_bytes,
                actual_bytes: member.size,
            });
        }

        let entry = zip
            .by_index(member.index)
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

        // Declared sizes can lie; never read past the cap
        let mut data = Vec::with_capacity(member.size as usize);
        entry
            .take(self.max_entry_bytes + 1)
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
        if data.len() as u64 > self.max_entry_bytes {
            return Err(ArchiveError::EntryTooLarge {
                name: member.path.clone(),
                limit_bytes: self.max_entry_bytes,
                actual_bytes: data.len() as u64,
            });
        }

        let content = String::from_utf8(data).map_err(|_| ArchiveError::Undecodable(member.path.clone()))?;
        Ok(ArchiveView::File {
            path: member.path.clone(),
            size: member.size,
            content,
        })
    }

    pub fn browse_reader<R: Read + Seek>(
        &self,
        reader: R,
        internal_path: &str,
    ) -> Result<ArchiveView, ArchiveError> {
        let mut zip = ZipArchive::new(reader).map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
        self.browse_zip(&mut zip, internal_path)
    }

    fn browse_zip<R: Read + Seek>(
        &self,
        zip: &mut ZipArchive<R>,
        internal_path: &str,
    ) -> Result<ArchiveView, ArchiveError> {
        let wants_listing = internal_path.is_empty() || internal_path.ends_with('/');
        let prefix = self
            .sanitizer
            .normalize_archive_path(internal_path)
            .map_err(|e| ArchiveError::InvalidPath(e.to_string()))?;
        let members = self.members(zip)?;

        if !wants_listing && !prefix.is_empty() {
            if let Some(member) = members.iter().find(|m| m.path == prefix && !m.is_dir) {
                return self.read_member(zip, member);
            }
        }

        match Self::list_level(&members, &prefix) {
            Some(entries) => Ok(ArchiveView::Listing { path: prefix, entries }),
            None => Err(ArchiveError::EntryNotFound(prefix)),
        }
    }
}

impl ArchiveBrowser for ZipArchiveBrowser {
    fn browse(&self, archive: &Path, internal_path: &str) -> Result<ArchiveView, ArchiveError> {
        let mut zip = self.open(archive)?;
        self.browse_zip(&mut zip, internal_path)
    }
}

/// Default cap on the uncompressed bytes packaged into one download.
pub const DEFAULT_MAX_PACKAGE_BYTES: u64 = 1024 * 1024 * 1024;

/// Builds share downloads. The result is held in memory, so the total
/// uncompressed size of the packaged files is capped.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    max_package_bytes: u64,
}

impl ZipPackager {
    pub fn new(max_package_bytes: u64) -> Self {
        Self { max_package_bytes }
    }

    /// Stream every source into `writer`. Directory trees are walked
    /// depth-first in name order; symlinks are not followed and not
    /// included. Fails with `PackageTooLarge` as soon as the files written
    /// so far exceed the cap.
    pub fn write_archive<W: Write + Seek>(
        &self,
        sources: &[PackageSource],
        writer: W,
    ) -> Result<W, ArchiveError> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut remaining = self.max_package_bytes;

        for source in sources {
            let meta = std::fs::symlink_metadata(&source.real).map_err(|e| ArchiveError::Io(e.to_string()))?;
            if meta.file_type().is_symlink() {
                tracing::debug!(path = %source.real.display(), "Skipping symlink share root");
                continue;
            }
            if meta.is_file() {
                self.add_file(&mut zip, &source.real, &source.archive_name, options, &mut remaining)?;
                continue;
            }

            let walker = WalkDir::new(&source.real)
                .follow_links(false)
                .sort_by(|a, b| a.file_name().cmp(b.file_name()));
            for entry in walker {
                let entry = entry.map_err(|e| ArchiveError::Io(e.to_string()))?;
                let relative = entry
                    .path()
                    .strip_prefix(&source.real)
                    .map_err(|e| ArchiveError::Io(e.to_string()))?;
                let name = if relative.as_os_str().is_empty() {
                    source.archive_name.clone()
                } else {
                    format!("{}/{}", source.archive_name, relative.to_string_lossy())
                };

                let file_type = entry.file_type();
                if file_type.is_dir() {
                    zip.add_directory(format!("{}/", name), options)
                        .map_err(|e| ArchiveError::Io(e.to_string()))?;
                } else if file_type.is_file() {
                    self.add_file(&mut zip, entry.path(), &name, options, &mut remaining)?;
                } else {
                    tracing::debug!(path = %entry.path().display(), "Skipping non-regular file in archive");
                }
            }
        }

        zip.finish().map_err(|e| ArchiveError::Io(e.to_string()))
    }

    fn add_file<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        path: &Path,
        name: &str,
        options: SimpleFileOptions,
        remaining: &mut u64,
    ) -> Result<(), ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::Io(e.to_string()))?;
        let size = file.metadata().map_err(|e| ArchiveError::Io(e.to_string()))?.len();
        if size > *remaining {
            tracing::warn!(path = %path.display(), limit = self.max_package_bytes, "Download exceeds package limit");
            return Err(ArchiveError::PackageTooLarge {
                limit_bytes: self.max_package_bytes,
            });
        }

        zip.start_file(name, options.large_file(size >= u64::from(u32::MAX)))
            .map_err(|e| ArchiveError::Io(e.to_string()))?;
        // A file that grew since stat() cannot push past the cap
        let copied = std::io::copy(&mut file.take(remaining.saturating_add(1)), zip).map_err(|e| ArchiveError::Io(e.to_string()))?;
        if copied > *remaining {
            return Err(ArchiveError::PackageTooLarge {
                limit_bytes: self.max_package_bytes,
            });
        }
        *remaining -= copied;
        Ok(())
    }
}

impl Default for ZipPackager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKAGE_BYTES)
    }
}

impl ArchivePackager for ZipPackager {
    fn package(&self, sources: &[PackageSource]) -> Result<Vec<u8>, ArchiveError> {
        let cursor = self.write_archive(sources, Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    fn names(view: &ArchiveView) -> Vec<(String, bool)> {
        match view {
            ArchiveView::Listing { entries, .. } => entries.iter().map(|e| (e.name.clone(), e.is_dir)).collect(),
            other => panic!("expected listing, got {:?}", other),
        }
    }

    #[test]
    fn test_lists_root_with_pseudo_directories() {
        let data = build_zip(&[("readme.txt", b"hi"), ("docs/a.txt", b"a"), ("docs/deep/b.txt", b"b")]);
        let browser = ZipArchiveBrowser::new(1024);

        let root = browser.browse_reader(Cursor::new(data.clone()), "/").unwrap();
        assert_eq!(names(&root), vec![("docs".into(), true), ("readme.txt".into(), false)]);

        let docs = browser.browse_reader(Cursor::new(data), "docs/").unwrap();
        assert_eq!(names(&docs), vec![("deep".into(), true), ("a.txt".into(), false)]);
    }

    #[test]
    fn test_reads_leaf_entry() {
        let data = build_zip(&[("docs/a.txt", b"alpha")]);
        let browser = ZipArchiveBrowser::new(1024);
        match browser.browse_reader(Cursor::new(data), "/docs/a.txt").unwrap() {
            ArchiveView::File { content, size, .. } => {
                assert_eq!(content, "alpha");
                assert_eq!(size, 5);
            }
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_entry_is_rejected() {
        let data = build_zip(&[("big.txt", &[b'x'; 100])]);
        let browser = ZipArchiveBrowser::new(10);
        let err = browser.browse_reader(Cursor::new(data), "big.txt").unwrap_err();
        assert!(matches!(err, ArchiveError::EntryTooLarge { actual_bytes: 100, .. }));
    }

    #[test]
    fn test_binary_entry_is_undecodable() {
        let data = build_zip(&[("blob.bin", &[0xff, 0xfe, 0x00, 0x80])]);
        let browser = ZipArchiveBrowser::new(1024);
        let err = browser.browse_reader(Cursor::new(data), "blob.bin").unwrap_err();
        assert!(matches!(err, ArchiveError::Undecodable(_)));
    }

    #[test]
    fn test_traversal_members_are_hidden_and_unaddressable() {
        let data = build_zip(&[("../evil.sh", b"rm -rf /"), ("ok.txt", b"ok")]);
        let browser = ZipArchiveBrowser::new(1024);

        let root = browser.browse_reader(Cursor::new(data.clone()), "").unwrap();
        assert_eq!(names(&root), vec![("ok.txt".into(), false)]);

        let err = browser.browse_reader(Cursor::new(data), "../evil.sh").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidPath(_)));
    }

    #[test]
    fn test_missing_entry_and_corrupt_archive() {
        let data = build_zip(&[("a.txt", b"a")]);
        let browser = ZipArchiveBrowser::new(1024);
        assert!(matches!(
            browser.browse_reader(Cursor::new(data), "nope/"),
            Err(ArchiveError::EntryNotFound(_))
        ));
        assert!(matches!(
            browser.browse_reader(Cursor::new(b"not a zip".to_vec()), ""),
            Err(ArchiveError::Corrupt(_))
        ));
    }

    #[test]
    fn test_explicit_empty_directory_is_listable() {
        let data = build_zip(&[("empty/", b"")]);
        let browser = ZipArchiveBrowser::new(1024);
        let view = browser.browse_reader(Cursor::new(data), "empty/").unwrap();
        assert_eq!(names(&view), Vec::<(String, bool)>::new());
    }

    #[test]
    fn test_packager_roots_entries_at_archive_name() {
        let temp = TempDir::new().unwrap();
        let reports = temp.path().join("reports");
        std::fs::create_dir_all(reports.join("archive")).unwrap();
        std::fs::write(reports.join("q1.csv"), "q1").unwrap();
        std::fs::write(reports.join("archive/old.csv"), "old").unwrap();
        std::fs::write(temp.path().join("note.txt"), "note").unwrap();

        let bytes = ZipPackager::default()
            .package(&[
                PackageSource { real: reports, archive_name: "reports".into() },
                PackageSource { real: temp.path().join("note.txt"), archive_name: "note.txt".into() },
            ])
            .unwrap();

        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["note.txt", "reports/", "reports/archive/", "reports/archive/old.csv", "reports/q1.csv"]
        );

        let mut content = String::new();
        zip.by_name("reports/archive/old.csv").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "old");
    }

    #[test]
    fn test_packager_enforces_total_size_cap() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("exports");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.bin"), vec![0u8; 60]).unwrap();
        std::fs::write(dir.join("b.bin"), vec![0u8; 60]).unwrap();
        let source = [PackageSource { real: dir, archive_name: "exports".into() }];

        let err = ZipPackager::new(100).package(&source).unwrap_err();
        assert!(matches!(err, ArchiveError::PackageTooLarge { limit_bytes: 100 }));

        assert!(ZipPackager::new(120).package(&source).is_ok());
    }
}
