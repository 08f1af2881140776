//! End-to-end runs against in-memory registries

use async_trait::async_trait;
use registry_sync::artifact::ArtifactKind;
use registry_sync::cache::LocalCache;
use registry_sync::cli::{RunOutcome, Runner};
use registry_sync::config::{OutputFormat, RepositoryFilters, Side, SyncConfig};
use registry_sync::digest::DigestUtils;
use registry_sync::registry::{AssetData, AssetQuery, Checksum, ComponentData, RegistryClient, RepositoryData};
use registry_sync::{Catalog, Coordinator, Logger, RemoteHash, Result, SharedState, SyncError, SyncReport};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

const REPOSITORY: &str = "raw-files";

#[derive(Default)]
struct MemoryRegistry {
    host: String,
    repository_type: String,
    components: Vec<ComponentData>,
    contents: HashMap<String, Vec<u8>>,
    failing_downloads: Vec<String>,
    reported_hash: Option<String>,
    downloads: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, PathBuf)>>,
}

impl MemoryRegistry {
    fn new(host: &str, repository_type: &str) -> Self {
        Self {
            host: host.to_string(),
            repository_type: repository_type.to_string(),
            ..Self::default()
        }
    }

    fn url(&self, name: &str) -> String {
        format!("https://{}/repository/{}/files/{}", self.host, REPOSITORY, name)
    }

    /// Add a raw file; its content hash is the SHA-256 of `content`
    fn with_file(mut self, name: &str, content: &[u8]) -> Self {
        let url = self.url(name);
        self.contents.insert(url.clone(), content.to_vec());
        self.components.push(ComponentData {
            id: Some(format!("c-{}", name)),
            repository: Some(REPOSITORY.to_string()),
            format: Some("raw".to_string()),
            group: Some("/files".to_string()),
            name: Some(format!("files/{}", name)),
            assets: vec![AssetData {
                id: Some(format!("a-{}", name)),
                path: Some(format!("files/{}", name)),
                download_url: Some(url),
                repository: Some(REPOSITORY.to_string()),
                format: Some("raw".to_string()),
                checksum: Some(Checksum {
                    sha256: Some(DigestUtils::compute_sha256(content)),
                    ..Checksum::default()
                }),
            }],
            ..ComponentData::default()
        });
        self
    }

    fn failing(mut self, name: &str) -> Self {
        self.failing_downloads.push(self.url(name));
        self
    }

    fn reporting_hash(mut self, hash: &str) -> Self {
        self.reported_hash = Some(hash.to_string());
        self
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn list_repositories(&self) -> Result<Vec<RepositoryData>> {
        Ok(vec![RepositoryData {
            name: REPOSITORY.to_string(),
            format: "raw".to_string(),
            repository_type: self.repository_type.clone(),
            url: None,
        }])
    }

    async fn list_components(&self, repository: &str) -> Result<Vec<ComponentData>> {
        Ok(self
            .components
            .iter()
            .filter(|c| c.repository.as_deref() == Some(repository))
            .cloned()
            .collect())
    }

    /// The destination echoes the searched hash unless told otherwise
    async fn search_assets(&self, query: &AssetQuery) -> Result<Vec<AssetData>> {
        let sha256 = self.reported_hash.clone().or_else(|| query.hash.clone());
        Ok(vec![AssetData {
            repository: Some(query.repository.clone()),
            format: Some(query.format.clone()),
            checksum: Some(Checksum {
                sha256,
                ..Checksum::default()
            }),
            ..AssetData::default()
        }])
    }

    async fn fetch_size(&self, download_url: &str) -> Result<u64> {
        Ok(self.contents.get(download_url).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn is_writable(&self) -> Result<bool> {
        Ok(true)
    }

    async fn download_asset(&self, download_url: &str, destination: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(download_url.to_string());
        if self.failing_downloads.iter().any(|url| url == download_url) {
            return Err(SyncError::Transfer(format!("{} unavailable", download_url)));
        }
        let content = self
            .contents
            .get(download_url)
            .ok_or_else(|| SyncError::Registry(format!("{} not found", download_url)))?;
        std::fs::write(destination, content).map_err(|e| SyncError::io(destination, e))
    }

    async fn upload_component(&self, repository: &str, kind: &ArtifactKind, file: &Path) -> Result<()> {
        assert!(matches!(kind, ArtifactKind::Raw { directory } if directory == "/files"));
        if !file.is_file() {
            return Err(SyncError::Transfer(format!("{} missing", file.display())));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((repository.to_string(), file.to_path_buf()));
        Ok(())
    }

    async fn download_docker_image(&self, _image: &str, _tag: &str) -> Result<()> {
        Ok(())
    }

    async fn upload_docker_image(&self, _image: &str, _tag: &str) -> Result<()> {
        Ok(())
    }
}

fn plenty_of_space(_location: &Path) -> Result<u64> {
    Ok(u64::MAX)
}

fn no_space(_location: &Path) -> Result<u64> {
    Ok(0)
}

fn config(location: &Path) -> SyncConfig {
    SyncConfig {
        item_location: location.to_path_buf(),
        parallelization: 2,
        filters: RepositoryFilters::default(),
        output: OutputFormat::Text,
        ..SyncConfig::default()
    }
}

async fn sync(
    config: SyncConfig,
    source: &Arc<MemoryRegistry>,
    destination: &Arc<MemoryRegistry>,
) -> Result<RunOutcome> {
    Runner::new(config)
        .with_space_probe(plenty_of_space)
        .execute(source.clone(), destination.clone())
        .await
}

/// Coordinator with its sync set computed
async fn planned(
    location: &Path,
    source: &Arc<MemoryRegistry>,
    destination: &Arc<MemoryRegistry>,
) -> Coordinator {
    let cache = LocalCache::new(location);
    let source: Arc<dyn RegistryClient> = source.clone();
    let destination: Arc<dyn RegistryClient> = destination.clone();
    let mut coordinator = Coordinator::new(
        Catalog::new(Side::Source, source, cache.clone()),
        Catalog::new(Side::Destination, destination, cache.clone()),
        cache,
        2,
        Logger::new_quiet(),
    );
    coordinator.compute_shared_registries().await.unwrap();
    coordinator.compute_sync_set().await.unwrap();
    coordinator
}

fn cache_file(location: &Path, name: &str, content: &[u8]) {
    let dir = location.join(REPOSITORY).join("files");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

/// Download and upload lists split the missing artifacts between them, and
/// the counts follow from the lists
fn assert_partition(coordinator: &Coordinator, downloads: &[&str], uploads: &[&str]) {
    let names = |artifacts: &[registry_sync::Artifact]| {
        let mut names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
        names.sort();
        names
    };
    let download_names = names(coordinator.download_list());
    let upload_names = names(coordinator.upload_list());

    assert_eq!(download_names, downloads);
    assert_eq!(upload_names, uploads);
    assert!(download_names.iter().all(|name| !upload_names.contains(name)));
    assert_eq!(coordinator.download_count(), downloads.len());
    assert_eq!(coordinator.upload_count(), downloads.len() + uploads.len());
}

fn report(outcome: RunOutcome) -> SyncReport {
    match outcome {
        RunOutcome::Synced(report) => report,
        RunOutcome::Planned(plan) => panic!("expected a sync, got a plan: {:?}", plan),
    }
}

#[tokio::test]
async fn test_missing_artifact_is_downloaded_then_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("x.bin", b"x contents")
            .with_file("y.bin", b"y contents"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted").with_file("y.bin", b"y contents"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 1);
    assert!(report.is_clean());
    assert_eq!(source.downloads(), vec![source.url("x.bin")]);

    let uploads = destination.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, REPOSITORY);
    assert_eq!(uploads[0].1, dir.path().join(REPOSITORY).join("files/x.bin"));
    assert_eq!(std::fs::read(&uploads[0].1).unwrap(), b"x contents");
}

#[tokio::test]
async fn test_cached_artifact_skips_download() {
    let dir = tempfile::tempdir().unwrap();
    let cached = dir.path().join(REPOSITORY).join("files");
    std::fs::create_dir_all(&cached).unwrap();
    std::fs::write(cached.join("z.bin"), b"z contents").unwrap();

    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("z.bin", b"z contents"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());

    assert!(source.downloads().is_empty());
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.uploaded, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_stale_cache_copy_is_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let cached = dir.path().join(REPOSITORY).join("files");
    std::fs::create_dir_all(&cached).unwrap();
    std::fs::write(cached.join("z.bin"), b"old contents").unwrap();

    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("z.bin", b"z contents"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());

    assert_eq!(source.downloads().len(), 1);
    assert_eq!(report.downloaded, 1);
    assert_eq!(std::fs::read(cached.join("z.bin")).unwrap(), b"z contents");
}

#[tokio::test]
async fn test_hash_mismatch_is_recorded_as_corrupted() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("z.bin", b"z contents"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted").reporting_hash("h4"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());

    assert_eq!(report.uploaded, 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.corrupted.len(), 1);

    let record = &report.corrupted[0];
    assert_eq!(record.artifact.name, "z.bin");
    assert_eq!(
        record.source_hash.as_deref(),
        Some(DigestUtils::compute_sha256(b"z contents").as_str())
    );
    assert_eq!(record.destination_hash, RemoteHash::Found("h4".to_string()));
}

#[tokio::test]
async fn test_unavailable_artifact_fails_without_stalling_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("ok.bin", b"fine")
            .with_file("gone.bin", b"never served")
            .failing("gone.bin"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].download_url, source.url("gone.bin"));

    let attempts = source
        .downloads()
        .into_iter()
        .filter(|url| url == &source.url("gone.bin"))
        .count();
    assert_eq!(attempts, 4);
}

#[tokio::test]
async fn test_repository_type_does_not_affect_sharing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("x.bin", b"x"));
    let destination = Arc::new(MemoryRegistry::new("destination", "proxy"));

    let report = report(sync(config(dir.path()), &source, &destination).await.unwrap());
    assert_eq!(report.uploaded, 1);
}

#[tokio::test]
async fn test_filtered_out_repository_syncs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("x.bin", b"x"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let mut config = config(dir.path());
    config.filters = RepositoryFilters::default().with_formats(vec!["npm".to_string()]);

    let report = report(sync(config, &source, &destination).await.unwrap());
    assert_eq!(report.uploaded, 0);
    assert!(source.downloads().is_empty());
}

#[tokio::test]
async fn test_dry_run_only_plans() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("x.bin", b"12345")
            .with_file("y.bin", b"678"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted").with_file("y.bin", b"678"));

    let mut config = config(dir.path());
    config.dry_run = true;

    match sync(config, &source, &destination).await.unwrap() {
        RunOutcome::Planned(plan) => {
            assert_eq!(plan.repositories, vec![REPOSITORY.to_string()]);
            assert_eq!(plan.download, vec![format!("{}: x.bin", REPOSITORY)]);
            assert!(plan.upload.is_empty());
            assert_eq!(plan.skipped, 1);
            assert_eq!(plan.required_bytes, 5);
        }
        RunOutcome::Synced(_) => panic!("dry run transferred artifacts"),
    }
    assert!(source.downloads().is_empty());
    assert!(destination.uploads().is_empty());
}

#[tokio::test]
async fn test_insufficient_disk_space_aborts_before_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("x.bin", b"x contents"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let result = Runner::new(config(dir.path()))
        .with_space_probe(no_space)
        .execute(source.clone(), destination.clone())
        .await;

    assert!(matches!(
        result,
        Err(SyncError::InsufficientDiskSpace { required: 10, available: 0 })
    ));
    assert!(source.downloads().is_empty());
}

#[tokio::test]
async fn test_counts_when_nothing_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("x.bin", b"x")
            .with_file("y.bin", b"y"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let coordinator = planned(dir.path(), &source, &destination).await;
    assert_partition(&coordinator, &["x.bin", "y.bin"], &[]);
}

#[tokio::test]
async fn test_counts_when_everything_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    cache_file(dir.path(), "x.bin", b"x");
    cache_file(dir.path(), "y.bin", b"y");
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("x.bin", b"x")
            .with_file("y.bin", b"y"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let coordinator = planned(dir.path(), &source, &destination).await;
    assert_partition(&coordinator, &[], &["x.bin", "y.bin"]);
}

#[tokio::test]
async fn test_counts_with_a_partial_cache() {
    let dir = tempfile::tempdir().unwrap();
    cache_file(dir.path(), "x.bin", b"x");
    cache_file(dir.path(), "z.bin", b"stale");
    let source = Arc::new(
        MemoryRegistry::new("source", "hosted")
            .with_file("x.bin", b"x")
            .with_file("y.bin", b"y")
            .with_file("z.bin", b"z")
            .with_file("w.bin", b"w"),
    );
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted").with_file("w.bin", b"w"));

    let coordinator = planned(dir.path(), &source, &destination).await;
    assert_partition(&coordinator, &["y.bin", "z.bin"], &["x.bin"]);
    assert_eq!(coordinator.skipped().len(), 1);
}

#[tokio::test]
async fn test_counts_when_destination_is_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted").with_file("x.bin", b"x"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted").with_file("x.bin", b"x"));

    let coordinator = planned(dir.path(), &source, &destination).await;
    assert_partition(&coordinator, &[], &[]);
    assert_eq!(coordinator.required_space(), 0);
}

#[tokio::test]
async fn test_stopped_workers_still_produce_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryRegistry::new("source", "hosted"));
    let destination = Arc::new(MemoryRegistry::new("destination", "hosted"));

    let coordinator = Arc::new(planned(dir.path(), &source, &destination).await);
    let state = Arc::new(SharedState::new(coordinator.clone(), 0, 0));
    state.increment_downloaded().await;

    let report = coordinator.run_sync(state).await;
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.worker_errors.len(), 2);
    assert!(report.worker_errors.iter().all(|e| e.contains("target of 0")));
    assert!(report.worker_failure().is_some());
}
