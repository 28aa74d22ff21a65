use async_trait::async_trait;

use crate::error::HostError;
use crate::types::{
    ArtifactRef, BuildRun, CommitInfo, FileCommit, NewRelease, PublishedRelease, ReleaseAsset,
    RepoFile,
};

/// The capabilities the release promoter needs from the hosting platform.
///
/// Everything with state outside this process (CI history, the release
/// list, the "latest" alias, the repository contents) is reached through
/// this trait so the promotion workflow can run against an in-memory fake.
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Runs of `workflow` on `branch`, most recent first.
    async fn list_builds(&self, workflow: &str, branch: &str) -> Result<Vec<BuildRun>, HostError>;

    /// Returns [`HostError::NotFound`] when no run has this id.
    async fn get_build(&self, build_id: u64) -> Result<BuildRun, HostError>;

    async fn list_artifacts(&self, build_id: u64) -> Result<Vec<ArtifactRef>, HostError>;

    /// Raw bytes of the zipped artifact.
    async fn download_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, HostError>;

    async fn create_release(&self, release: &NewRelease) -> Result<PublishedRelease, HostError>;

    async fn upload_asset(
        &self,
        release: &PublishedRelease,
        asset: &ReleaseAsset,
    ) -> Result<(), HostError>;

    /// Takes the release out of draft. With `make_latest` the "latest"
    /// alias moves to it.
    async fn publish_release(
        &self,
        release: &PublishedRelease,
        make_latest: bool,
    ) -> Result<PublishedRelease, HostError>;

    async fn get_file(&self, path: &str, branch: &str) -> Result<RepoFile, HostError>;

    async fn commit_file(&self, commit: &FileCommit) -> Result<CommitInfo, HostError>;
}
