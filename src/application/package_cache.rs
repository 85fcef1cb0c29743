use crate::models::config::RegistryConfig;
use crate::models::package::PackageId;
use crate::paths::RepkgPaths;
use crate::ports::{ArchiveExtractor, ArchiveFetcher, FileSystemOperations};
use crate::services::FlightTable;
use crate::RepkgError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful `ensure_cached` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
    pub cache_dir: PathBuf,
    /// False when the entry already existed and no network traffic happened.
    pub fetched: bool,
}

/// The cache orchestrator. Given a fully resolved identifier it guarantees
/// the package contents exist on disk exactly once: an existing entry is
/// returned untouched, a missing one is downloaded and extracted under a
/// per-identifier single-flight so concurrent callers never duplicate work.
///
/// Each attempt runs in its own staging directory and the canonical path is
/// only ever written by renaming a fully extracted tree into place, so a
/// failed or abandoned attempt leaves no partial entry visible.
pub struct PackageCache<FETCH, EXTRACT, FS>
where
    FETCH: ArchiveFetcher + 'static,
    EXTRACT: ArchiveExtractor + 'static,
    FS: FileSystemOperations + 'static,
{
    fetcher: Arc<FETCH>,
    extractor: Arc<EXTRACT>,
    file_system: Arc<FS>,
    paths: RepkgPaths,
    registry: RegistryConfig,
    flights: FlightTable<CacheOutcome, RepkgError>,
}

impl<FETCH, EXTRACT, FS> PackageCache<FETCH, EXTRACT, FS>
where
    FETCH: ArchiveFetcher + 'static,
    EXTRACT: ArchiveExtractor + 'static,
    FS: FileSystemOperations + 'static,
{
    pub fn new(
        fetcher: FETCH,
        extractor: EXTRACT,
        file_system: FS,
        paths: RepkgPaths,
        registry: RegistryConfig,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            file_system: Arc::new(file_system),
            paths,
            registry,
            flights: FlightTable::new(),
        }
    }

    pub fn paths(&self) -> &RepkgPaths {
        &self.paths
    }

    pub async fn ensure_cached(&self, id: &PackageId) -> Result<CacheOutcome, RepkgError> {
        let entry_dir = self.paths.entry_dir(id);
        if self.file_system.exists(&entry_dir).await {
            debug!(package = %id, "cache hit");
            return Ok(CacheOutcome {
                cache_dir: entry_dir,
                fetched: false,
            });
        }

        let attempt = Self::fetch_and_extract(
            self.fetcher.clone(),
            self.extractor.clone(),
            self.file_system.clone(),
            self.paths.clone(),
            self.registry.clone(),
            id.clone(),
        );
        self.flights.run(&id.canonical_key(), attempt).await
    }

    async fn fetch_and_extract(
        fetcher: Arc<FETCH>,
        extractor: Arc<EXTRACT>,
        file_system: Arc<FS>,
        paths: RepkgPaths,
        registry: RegistryConfig,
        id: PackageId,
    ) -> Result<CacheOutcome, RepkgError> {
        let entry_dir = paths.entry_dir(&id);

        // A caller can lose the race for flight leadership against one that
        // already completed; the entry is then simply there.
        if file_system.exists(&entry_dir).await {
            return Ok(CacheOutcome {
                cache_dir: entry_dir,
                fetched: false,
            });
        }

        file_system.create_dir_all(&paths.scope_dir(&id)).await?;

        let staging_dir = paths.new_staging_dir();
        file_system.create_dir_all(&staging_dir).await?;

        let result = Self::run_attempt(
            fetcher.as_ref(),
            extractor.as_ref(),
            &registry,
            &id,
            &staging_dir,
            &entry_dir,
        )
        .await;

        // The staging directory is exclusive to this attempt; drop it whether
        // the attempt succeeded or failed.
        if file_system.exists(&staging_dir).await {
            if let Err(cleanup) = file_system.remove_dir_all(&staging_dir).await {
                warn!(staging = %staging_dir.display(), error = %cleanup, "cannot remove staging directory");
            }
        }

        match result {
            Ok(cache_dir) => {
                info!(package = %id, dir = %cache_dir.display(), "package cached");
                Ok(CacheOutcome {
                    cache_dir,
                    fetched: true,
                })
            }
            Err(err) => {
                warn!(package = %id, error = %err, "caching attempt failed");
                Err(err)
            }
        }
    }

    async fn run_attempt(
        fetcher: &FETCH,
        extractor: &EXTRACT,
        registry: &RegistryConfig,
        id: &PackageId,
        staging_dir: &Path,
        entry_dir: &Path,
    ) -> Result<PathBuf, RepkgError> {
        let url = registry.tarball_url(id);
        let artifact = staging_dir.join(id.tarball_name());

        debug!(package = %id, url = %url, "downloading tarball");
        fetcher.fetch(&url, &artifact).await?;

        debug!(package = %id, "extracting tarball");
        extractor.extract(&artifact, staging_dir, entry_dir).await
    }

    /// Removes leftovers of attempts abandoned by a previous process (e.g.
    /// when the shutdown drain ran out). Meant to be called once at startup.
    pub async fn sweep_staging(&self) -> Result<(), RepkgError> {
        let staging_root = self.paths.staging_root();
        if !self.file_system.exists(&staging_root).await {
            return Ok(());
        }

        for leftover in self.file_system.read_dir(&staging_root).await? {
            warn!(path = %leftover.display(), "removing abandoned staging directory");
            self.file_system.remove_dir_all(&leftover).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{TarballExtractor, TokioFileSystem};
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fixture_tarball() -> Vec<u8> {
        let mut data = Vec::new();
        {
            let enc = GzEncoder::new(&mut data, Compression::default());
            let mut tar = tar::Builder::new(enc);

            let content = "module.exports = 42;\n";
            let mut header = tar::Header::new_gnu();
            header.set_path("package/index.js").unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, content.as_bytes()).unwrap();

            tar.finish().unwrap();
        }
        data
    }

    /// Fetcher that writes a canned payload instead of hitting the network.
    struct StubFetcher {
        payload: Option<Vec<u8>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn serving(payload: Vec<u8>) -> Self {
            Self {
                payload: Some(payload),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                payload: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ArchiveFetcher for StubFetcher {
        async fn fetch(&self, url: &str, dest: &std::path::Path) -> Result<(), RepkgError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.payload {
                Some(bytes) => {
                    tokio::fs::write(dest, bytes).await.unwrap();
                    Ok(())
                }
                None => Err(RepkgError::FetchStatus {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    fn cache_with(
        root: &std::path::Path,
        fetcher: StubFetcher,
    ) -> PackageCache<StubFetcher, TarballExtractor, TokioFileSystem> {
        PackageCache::new(
            fetcher,
            TarballExtractor,
            TokioFileSystem,
            RepkgPaths::new(root),
            RegistryConfig::default(),
        )
    }

    fn id() -> PackageId {
        PackageId::new("@foo", "bar", "1.2.3").unwrap()
    }

    async fn staging_is_empty(cache: &PackageCache<StubFetcher, TarballExtractor, TokioFileSystem>) -> bool {
        let staging_root = cache.paths().staging_root();
        match tokio::fs::read_dir(&staging_root).await {
            Ok(mut entries) => entries.next_entry().await.unwrap().is_none(),
            Err(_) => true,
        }
    }

    #[tokio::test]
    async fn test_first_call_fetches_and_caches() {
        let root = tempfile::tempdir().unwrap();
        let cache = cache_with(root.path(), StubFetcher::serving(fixture_tarball()));

        let outcome = cache.ensure_cached(&id()).await.unwrap();
        assert!(outcome.fetched);
        assert_eq!(outcome.cache_dir, root.path().join("@foo/bar@1.2.3"));
        assert!(outcome.cache_dir.join("index.js").exists());
        assert!(staging_is_empty(&cache).await);
    }

    #[tokio::test]
    async fn test_cached_entry_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        let cache = cache_with(root.path(), StubFetcher::serving(fixture_tarball()));

        cache.ensure_cached(&id()).await.unwrap();
        let again = cache.ensure_cached(&id()).await.unwrap();

        assert!(!again.fetched);
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preexisting_directory_needs_no_fetch() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("@foo/bar@1.2.3")).unwrap();
        let cache = cache_with(root.path(), StubFetcher::serving(fixture_tarball()));

        let outcome = cache.ensure_cached(&id()).await.unwrap();
        assert!(!outcome.fetched);
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_entry() {
        let root = tempfile::tempdir().unwrap();
        let cache = cache_with(root.path(), StubFetcher::failing());

        let err = cache.ensure_cached(&id()).await.unwrap_err();
        assert!(matches!(err, RepkgError::FetchStatus { status: 404, .. }));
        assert!(!root.path().join("@foo/bar@1.2.3").exists());
        assert!(staging_is_empty(&cache).await);
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_no_entry() {
        let root = tempfile::tempdir().unwrap();
        let cache = cache_with(root.path(), StubFetcher::serving(b"junk".to_vec()));

        let err = cache.ensure_cached(&id()).await.unwrap_err();
        assert!(matches!(err, RepkgError::Extract(_)));
        assert!(!root.path().join("@foo/bar@1.2.3").exists());
        assert!(staging_is_empty(&cache).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_fetch_once() {
        let root = tempfile::tempdir().unwrap();
        let fetcher =
            StubFetcher::serving(fixture_tarball()).with_delay(Duration::from_millis(100));
        let cache = Arc::new(cache_with(root.path(), fetcher));

        let calls = (0..8).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_cached(&id()).await })
        });

        let results = join_all(calls).await;
        let expected = root.path().join("@foo/bar@1.2.3");
        for result in results {
            assert_eq!(result.unwrap().unwrap().cache_dir, expected);
        }
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_can_be_retried() {
        let root = tempfile::tempdir().unwrap();
        let failing = cache_with(root.path(), StubFetcher::failing());
        failing.ensure_cached(&id()).await.unwrap_err();

        let working = cache_with(root.path(), StubFetcher::serving(fixture_tarball()));
        let outcome = working.ensure_cached(&id()).await.unwrap();
        assert!(outcome.fetched);
        assert!(outcome.cache_dir.join("index.js").exists());
    }

    #[tokio::test]
    async fn test_sweep_staging_removes_leftovers() {
        let root = tempfile::tempdir().unwrap();
        let cache = cache_with(root.path(), StubFetcher::serving(fixture_tarball()));

        let abandoned = cache.paths().staging_root().join("dead-attempt");
        std::fs::create_dir_all(&abandoned).unwrap();
        std::fs::write(abandoned.join("bar-0.0.1.tgz"), b"partial").unwrap();

        cache.sweep_staging().await.unwrap();
        assert!(staging_is_empty(&cache).await);
    }
}
