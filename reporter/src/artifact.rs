use crate::types::ArtifactRef;
use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Uploads a file produced by a test and returns a reference to it.
///
/// Implementations report failures by returning `None`; the file is then
/// left out of the result.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn upload(&self, file: &Path, run_id: &str) -> Option<ArtifactRef>;
}

/// Resolver for setups without artifact storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

#[async_trait]
impl ArtifactResolver for NoArtifacts {
    async fn upload(&self, file: &Path, _run_id: &str) -> Option<ArtifactRef> {
        debug!("Artifact storage disabled, skipping {}", file.display());
        None
    }
}

/// Uploads started ahead of the request that carries them.
#[derive(Debug, Default)]
pub struct PendingArtifacts {
    uploads: Vec<JoinHandle<Option<ArtifactRef>>>,
}

impl PendingArtifacts {
    /// Spawns one upload per file; they run concurrently with each other.
    pub fn start(resolver: Arc<dyn ArtifactResolver>, files: &[PathBuf], run_id: &str) -> Self {
        let uploads = files
            .iter()
            .cloned()
            .map(|file| {
                let resolver = Arc::clone(&resolver);
                let run_id = run_id.to_string();
                tokio::spawn(async move { resolver.upload(&file, &run_id).await })
            })
            .collect();
        Self { uploads }
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    /// Waits for every upload, keeping the ones that produced a reference.
    pub async fn collect(self) -> Vec<ArtifactRef> {
        join_all(self.uploads)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!("Artifact upload task failed: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowResolver;

    #[async_trait]
    impl ArtifactResolver for SlowResolver {
        async fn upload(&self, file: &Path, run_id: &str) -> Option<ArtifactRef> {
            let name = file.file_name()?.to_string_lossy().into_owned();
            if name.starts_with("missing") {
                return None;
            }
            if name.starts_with("panic") {
                panic!("upload crashed");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some(ArtifactRef::new(format!("https://s3/{}/{}", run_id, name)))
        }
    }

    #[test]
    fn test_no_artifacts() {
        let artifact = tokio_test::block_on(NoArtifacts.upload(Path::new("a.png"), "r1"));
        assert!(artifact.is_none());
    }

    #[tokio::test]
    async fn test_uploads_run_concurrently() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("shot{}.png", i))).collect();
        let started = std::time::Instant::now();

        let pending = PendingArtifacts::start(Arc::new(SlowResolver), &files, "run-1");
        let artifacts = pending.collect().await;

        assert_eq!(artifacts.len(), 5);
        assert_eq!(artifacts[0].as_str(), "https://s3/run-1/shot0.png");
        assert!(started.elapsed() < Duration::from_millis(240));
    }

    #[tokio::test]
    async fn test_failed_uploads_are_omitted() {
        let files = vec![
            PathBuf::from("missing.log"),
            PathBuf::from("panic.txt"),
            PathBuf::from("trace.zip"),
        ];

        let artifacts = PendingArtifacts::start(Arc::new(SlowResolver), &files, "r")
            .collect()
            .await;

        assert_eq!(artifacts, vec![ArtifactRef::new("https://s3/r/trace.zip")]);
    }

    #[tokio::test]
    async fn test_empty() {
        let pending = PendingArtifacts::start(Arc::new(NoArtifacts), &[], "r");
        assert!(pending.is_empty());
        assert!(pending.collect().await.is_empty());
    }
}
