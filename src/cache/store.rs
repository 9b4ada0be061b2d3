use chrono::{DateTime, Duration, Utc};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::age::format_age;
use super::fingerprint::Repository;
use super::scanner::RemoteTreeScanner;
use super::types::{RecordSummary, Snapshot, SweepReport, SCHEMA_VERSION};
use super::validity::is_usable_at;
use crate::utils::{CacheError, Result};

/// Suffix shared by every snapshot record in the cache directory
pub const RECORD_SUFFIX: &str = "_cache.json";

/// Characters that cannot appear in a file name on any supported platform
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Durable per-repository snapshot storage
///
/// One JSON record per repository id. The `try_*` methods report what went
/// wrong; the plain methods log it and degrade to a cache miss.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    cache_dir: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `cache_dir`, creating the directory if needed
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Record path for a repository id
    pub fn record_path(&self, repository_id: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", sanitize_id(repository_id), RECORD_SUFFIX))
    }

    /// Read the record for `repository_id`
    ///
    /// `Ok(None)` means no record exists. A record written for another id
    /// that maps to the same file name is also reported as absent.
    pub fn try_load(&self, repository_id: &str) -> Result<Option<Snapshot>> {
        let path = self.record_path(repository_id);
        let Some(snapshot) = read_record(&path)? else {
            return Ok(None);
        };

        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        if snapshot.repository_id != repository_id {
            warn!(
                repository_id,
                stored_id = %snapshot.repository_id,
                path = %path.display(),
                "Cache record belongs to a different repository"
            );
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    /// Load a snapshot, treating any failure as a miss
    pub fn load(&self, repository_id: &str) -> Option<Snapshot> {
        match self.try_load(repository_id) {
            Ok(Some(snapshot)) => {
                debug!(repository_id, "Cache record loaded");
                Some(snapshot)
            }
            Ok(None) => {
                debug!(repository_id, "No cache record");
                None
            }
            Err(e) if e.is_malformed() => {
                warn!(repository_id, error = %e, "Ignoring unusable cache record");
                None
            }
            Err(e) => {
                warn!(repository_id, error = %e, "Failed to read cache record");
                None
            }
        }
    }

    /// Persist `snapshot`, replacing any previous record for its id
    ///
    /// Written to a sibling temp file first and renamed into place, so a
    /// crash leaves either the old record or the new one.
    pub fn try_save(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.record_path(&snapshot.repository_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;

        let temp_path = path.with_extension("tmp");
        let written = File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &path));

        // Never leave a partial temp file behind
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Persist `snapshot`; a failure is logged and the next run re-scans
    pub fn save(&self, snapshot: &Snapshot) {
        match self.try_save(snapshot) {
            Ok(()) => info!(
                repository_id = %snapshot.repository_id,
                files = snapshot.total_files,
                directories = snapshot.total_directories,
                "Cache saved"
            ),
            Err(e) => warn!(
                repository_id = %snapshot.repository_id,
                error = %e,
                "Failed to save cache"
            ),
        }
    }

    /// Delete the record for `repository_id`; returns whether one existed
    pub fn try_invalidate(&self, repository_id: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(repository_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Forget a repository's snapshot now; absent records are not an error
    pub fn invalidate(&self, repository_id: &str) {
        match self.try_invalidate(repository_id) {
            Ok(true) => info!(repository_id, "Cache invalidated"),
            Ok(false) => debug!(repository_id, "No cache to invalidate"),
            Err(e) => warn!(repository_id, error = %e, "Failed to invalidate cache"),
        }
    }

    pub fn clear_expired(&self) -> SweepReport {
        self.clear_expired_at(Utc::now())
    }

    /// Delete every record confirmed expired at `now`
    ///
    /// Records that cannot be read or decoded are left alone; `load` already
    /// treats them as misses.
    pub fn clear_expired_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for path in self.record_files() {
            let snapshot = match read_record(&path) {
                Ok(Some(snapshot)) => snapshot,
                // Removed between listing and reading
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache record");
                    report.unreadable += 1;
                    continue;
                }
            };

            if !snapshot.is_expired_at(now) {
                report.retained += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Deleted expired cache");
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete expired cache");
                    report.retained += 1;
                }
            }
        }

        report
    }

    pub fn describe(&self, repository_id: &str) -> String {
        self.describe_at(repository_id, Utc::now())
    }

    /// Age and expiry of what is on disk; identity is not checked
    pub fn describe_at(&self, repository_id: &str, now: DateTime<Utc>) -> String {
        match self.load(repository_id) {
            None => "No cache available".to_string(),
            Some(snapshot) => describe_snapshot(&snapshot, now),
        }
    }

    /// Summaries of every decodable record, sorted by repository id
    pub fn list(&self) -> Vec<RecordSummary> {
        let mut summaries: Vec<RecordSummary> = self
            .record_files()
            .iter()
            .filter_map(|path| match read_record(path) {
                Ok(Some(snapshot)) => Some(RecordSummary::from(&snapshot)),
                Ok(None) => None,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable cache record");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| a.repository_id.cmp(&b.repository_id));
        summaries
    }

    pub fn load_or_scan<S>(
        &self,
        repository: &Repository,
        lifetime: Duration,
        scanner: &mut S,
    ) -> Result<Snapshot>
    where
        S: RemoteTreeScanner + ?Sized,
    {
        self.load_or_scan_at(repository, lifetime, scanner, Utc::now())
    }

    /// Serve a usable cached snapshot, or scan, save and return a fresh one
    pub fn load_or_scan_at<S>(
        &self,
        repository: &Repository,
        lifetime: Duration,
        scanner: &mut S,
        now: DateTime<Utc>,
    ) -> Result<Snapshot>
    where
        S: RemoteTreeScanner + ?Sized,
    {
        match self.load(&repository.id) {
            Some(snapshot) if is_usable_at(Some(&snapshot), repository, now) => {
                info!(repository_id = %repository.id, "Using cached listing");
                return Ok(snapshot);
            }
            Some(_) => info!(repository_id = %repository.id, "Cached listing is stale, rescanning"),
            None => {}
        }

        let snapshot = scanner.scan_remote_tree(repository, lifetime)?;
        self.save(&snapshot);
        Ok(snapshot)
    }

    /// Record files currently in the cache directory
    fn record_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %self.cache_dir.display(), error = %e, "Failed to list cache directory");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(RECORD_SUFFIX))
            })
            .collect();
        paths.sort();
        paths
    }
}

/// Status line for a snapshot as of `now`
pub fn describe_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> String {
    let status = if snapshot.is_expired_at(now) {
        "Expired"
    } else {
        "Valid"
    };
    format!("Last scanned: {} ({})", format_age(snapshot.age_at(now)), status)
}

/// Replace characters that are not valid in file names with `_`
pub fn sanitize_id(repository_id: &str) -> String {
    repository_id
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Decode a record file without any version or identity checks
fn read_record(path: &Path) -> Result<Option<Snapshot>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&json)
        .map(Some)
        .map_err(|source| CacheError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DirectoryEntry, SnapshotBuilder};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn repo(id: &str) -> Repository {
        Repository {
            id: id.to_string(),
            name: format!("Repo {}", id),
            address: "ftp.example.org".to_string(),
            port: 21,
            username: "anon".to_string(),
            password: "pw".to_string(),
        }
    }

    fn snapshot(id: &str, scanned_at: DateTime<Utc>) -> Snapshot {
        let mut builder = SnapshotBuilder::new(&repo(id), Duration::hours(1));
        builder
            .add_entry("/", DirectoryEntry::directory("@mod1", "/@mod1", scanned_at))
            .add_entry(
                "/@mod1",
                DirectoryEntry::file("mod.cpp", "/@mod1/mod.cpp", 512, scanned_at),
            );
        builder.finish_at(scanned_at)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        // Sub-second precision must survive
        let original = snapshot("r1", Utc::now());
        store.try_save(&original).unwrap();

        let loaded = store.try_load("r1").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(store.load("r1"), Some(original));
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        store.save(&snapshot("r1", t0()));
        let newer = snapshot("r1", t0() + Duration::minutes(30));
        store.save(&newer);

        assert_eq!(store.load("r1"), Some(newer));
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["r1_cache.json".to_string()]);
    }

    #[test]
    fn test_record_is_readable_json() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.save(&snapshot("r1", t0()));

        let text = fs::read_to_string(store.record_path("r1")).unwrap();
        assert!(text.contains("\"repositoryId\": \"r1\""));
        assert!(text.contains("\"directoryIndex\""));
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        assert!(store.try_load("nope").unwrap().is_none());
        assert!(store.load("nope").is_none());
    }

    #[test]
    fn test_load_truncated_record_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.save(&snapshot("r1", t0()));

        let path = store.record_path("r1");
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, &text[..text.len() / 2]).unwrap();

        let err = store.try_load("r1").unwrap_err();
        assert!(matches!(err, CacheError::Malformed { .. }));
        assert!(store.load("r1").is_none());
    }

    #[test]
    fn test_load_garbage_record_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        fs::write(store.record_path("r1"), b"\x00\xffnot json").unwrap();

        assert!(store.load("r1").is_none());
    }

    #[test]
    fn test_unsupported_schema_is_forced_miss() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        let mut future = snapshot("r1", t0());
        future.schema_version = SCHEMA_VERSION + 1;
        store.try_save(&future).unwrap();

        let err = store.try_load("r1").unwrap_err();
        assert!(matches!(
            err,
            CacheError::UnsupportedVersion { found, expected }
                if found == SCHEMA_VERSION + 1 && expected == SCHEMA_VERSION
        ));
        assert!(store.load("r1").is_none());
    }

    #[test]
    fn test_sanitized_id_collision_is_miss() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.save(&snapshot("a/b", t0()));

        assert_eq!(store.record_path("a/b"), store.record_path("a_b"));
        assert!(store.load("a/b").is_some());
        assert!(store.load("a_b").is_none());
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("ftp://host:21/mods"), "ftp___host_21_mods");
        assert_eq!(sanitize_id("a<b>c|d?e*f\"g\\h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_id("tab\there"), "tab_here");
        assert_eq!(sanitize_id("plain-id_1"), "plain-id_1");
    }

    #[test]
    fn test_invalidate() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.save(&snapshot("r1", t0()));

        assert!(store.try_invalidate("r1").unwrap());
        assert!(store.load("r1").is_none());
        assert!(!store.try_invalidate("r1").unwrap());

        // No-op on missing record
        store.invalidate("r1");
        store.invalidate("never-saved");
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_record_path_blocked_by_directory() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        // A non-empty directory where the record file should be
        let blocker = store.record_path("r1");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let err = store.try_save(&snapshot("r1", t0())).unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
        store.save(&snapshot("r1", t0()));
        assert_eq!(file_names(temp.path()), vec!["r1_cache.json".to_string()]);

        let err = store.try_load("r1").unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(store.load("r1").is_none());
        assert_eq!(store.describe_at("r1", t0()), "No cache available");

        assert!(matches!(store.try_invalidate("r1"), Err(CacheError::Io(_))));
        store.invalidate("r1");
        assert!(blocker.is_dir());
    }

    #[test]
    fn test_save_into_unusable_cache_dir() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        let store = SnapshotStore::new(cache_dir.clone()).unwrap();

        // Cache directory replaced by a plain file
        fs::remove_dir(&cache_dir).unwrap();
        fs::write(&cache_dir, "not a directory").unwrap();

        let err = store.try_save(&snapshot("r1", t0())).unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
        store.save(&snapshot("r1", t0()));

        assert!(store.load("r1").is_none());
        assert_eq!(store.clear_expired_at(t0()), SweepReport::default());
        assert_eq!(fs::read_to_string(&cache_dir).unwrap(), "not a directory");
    }

    #[test]
    fn test_clear_expired() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        let now = t0() + Duration::hours(3);

        // Expired: scanned 3h and 2h before now with a 1h lifetime
        store.save(&snapshot("old1", t0()));
        store.save(&snapshot("old2", t0() + Duration::hours(1)));
        // Expires exactly at `now`
        store.save(&snapshot("edge", t0() + Duration::hours(2)));
        // Fresh
        store.save(&snapshot("fresh1", now - Duration::minutes(10)));
        store.save(&snapshot("fresh2", now));
        // Corrupt; stays regardless of age
        fs::write(store.record_path("broken"), "{\"repositoryId\": \"broken\", ").unwrap();
        // Not a record
        fs::write(temp.path().join("notes.txt"), "keep me").unwrap();

        let report = store.clear_expired_at(now);
        assert_eq!(
            report,
            SweepReport {
                deleted: 3,
                retained: 2,
                unreadable: 1,
            }
        );

        assert!(!store.record_path("old1").exists());
        assert!(!store.record_path("old2").exists());
        assert!(!store.record_path("edge").exists());
        assert!(store.record_path("fresh1").exists());
        assert!(store.record_path("fresh2").exists());
        assert!(store.record_path("broken").exists());
        assert!(temp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_clear_expired_on_missing_dir() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("cache")).unwrap();
        fs::remove_dir(temp.path().join("cache")).unwrap();

        assert_eq!(store.clear_expired(), SweepReport::default());
    }

    #[test]
    fn test_describe() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        assert_eq!(store.describe_at("r1", t0()), "No cache available");

        store.save(&snapshot("r1", t0()));
        assert_eq!(store.describe_at("r1", t0()), "Last scanned: just now (Valid)");
        assert_eq!(
            store.describe_at("r1", t0() + Duration::minutes(45)),
            "Last scanned: 45 minutes ago (Valid)"
        );
        assert_eq!(
            store.describe_at("r1", t0() + Duration::hours(5)),
            "Last scanned: 5 hours ago (Expired)"
        );
        assert_eq!(
            store.describe_at("r1", t0() + Duration::days(2)),
            "Last scanned: 2 days ago (Expired)"
        );
    }

    #[test]
    fn test_describe_ignores_identity() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        let mut foreign = snapshot("r1", t0());
        foreign.identity_fingerprint = "something else".to_string();
        store.save(&foreign);

        assert_eq!(store.describe_at("r1", t0()), "Last scanned: just now (Valid)");
    }

    #[test]
    fn test_list_skips_unreadable() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.save(&snapshot("b", t0()));
        store.save(&snapshot("a", t0()));
        fs::write(store.record_path("c"), "[]").unwrap();

        let ids: Vec<String> = store.list().into_iter().map(|s| s.repository_id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_load_or_scan_uses_cache_until_expiry() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        let repository = repo("r1");
        let scans = std::cell::Cell::new(0);
        let scan_time = std::cell::Cell::new(t0());

        let mut scanner = |r: &Repository, lifetime: Duration| -> Result<Snapshot> {
            scans.set(scans.get() + 1);
            let mut builder = SnapshotBuilder::new(r, lifetime);
            builder.add_directory("/");
            Ok(builder.finish_at(scan_time.get()))
        };

        let first = store
            .load_or_scan_at(&repository, Duration::hours(1), &mut scanner, t0())
            .unwrap();
        assert_eq!(scans.get(), 1);

        let second = store
            .load_or_scan_at(&repository, Duration::hours(1), &mut scanner, t0() + Duration::minutes(30))
            .unwrap();
        assert_eq!(scans.get(), 1);
        assert_eq!(first, second);

        let later = t0() + Duration::hours(2);
        scan_time.set(later);
        let third = store
            .load_or_scan_at(&repository, Duration::hours(1), &mut scanner, later)
            .unwrap();
        assert_eq!(scans.get(), 2);
        assert_eq!(third.last_scanned, later);
        assert_eq!(store.load("r1"), Some(third));
    }

    #[test]
    fn test_load_or_scan_propagates_scan_error() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();

        let mut scanner = |_: &Repository, _: Duration| -> Result<Snapshot> {
            Err(CacheError::Scan("connection refused".to_string()))
        };

        let err = store
            .load_or_scan_at(&repo("r1"), Duration::hours(1), &mut scanner, t0())
            .unwrap_err();
        assert!(matches!(err, CacheError::Scan(_)));
        assert!(store.load("r1").is_none());
    }
}
