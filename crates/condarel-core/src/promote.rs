//! Turning a finished CI build into a published release.

use condarel_host::{
    ArtifactRef, BuildRun, FileCommit, HostError, NewRelease, PublishedRelease, ReleaseHost,
};
use bytes::Bytes;
use log::{debug, info, warn};
use thiserror::Error;

use crate::artifact::{ArtifactError, ArtifactFile, read_named_file, read_single_file};
use crate::build_config::{BuildConfigError, BumpPlan, plan_bump};
use crate::header::{HeaderError, InstallerHeader, patch_installer};
use crate::notes::{platform_label, release_assets, release_notes};
use crate::version::{ReleaseVersion, VersionParseError, resolve_versions};

pub const INSTALLER_ARTIFACT: &str = "installer";
pub const ENVIRONMENT_ARTIFACT: &str = "environment-yaml";
pub const ENVIRONMENT_FILE: &str = "environment.yaml";

const DEFAULT_WORKFLOW: &str = "build-and-test.yml";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_BUILD_CONFIG: &str = "construct.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteOptions {
    /// CI run to promote. Defaults to the latest successful run on `branch`.
    pub build_id: Option<u64>,
    /// Version to release. Defaults to the built version rounded to a full
    /// release.
    pub version: Option<ReleaseVersion>,
    pub workflow: String,
    pub branch: String,
    pub build_config_path: String,
    /// Overrides the installer's `# NAME:` metadata in asset names.
    pub product_name: Option<String>,
}

impl Default for PromoteOptions {
    fn default() -> Self {
        Self {
            build_id: None,
            version: None,
            workflow: DEFAULT_WORKFLOW.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            build_config_path: DEFAULT_BUILD_CONFIG.to_string(),
            product_name: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("Failed to look up build: {0}")]
    BuildLookup(#[source] HostError),

    #[error("Run {build_id} has not succeeded, its status is {conclusion}")]
    BuildNotSuccessful { build_id: u64, conclusion: String },

    #[error("Failed to download build artifacts: {0}")]
    ArtifactDownload(#[from] ArtifactFailure),

    #[error("Failed to patch installer version: {0}")]
    VersionNotInHeader(#[from] HeaderError),

    #[error("Invalid release version: {0}")]
    InvalidVersion(#[from] VersionParseError),

    #[error("Failed to create release: {0}")]
    ReleaseCreate(#[source] HostError),

    #[error("Failed to upload {asset}: {source}")]
    Upload {
        asset: String,
        #[source]
        source: HostError,
    },

    #[error("Failed to publish release: {0}")]
    AliasUpdate(#[source] HostError),

    #[error("Failed to bump build configuration version: {0}")]
    Commit(#[from] CommitFailure),
}

impl PromoteError {
    /// Whether a draft release may have been left behind for manual cleanup.
    #[must_use]
    pub fn leaves_draft(&self) -> bool {
        matches!(self, Self::Upload { .. } | Self::AliasUpdate(_))
    }
}

#[derive(Debug, Error)]
pub enum ArtifactFailure {
    #[error("build {build_id} has no {artifact} artifact")]
    Missing { build_id: u64, artifact: &'static str },
    #[error("the {artifact} artifact of build {build_id} has expired")]
    Expired { build_id: u64, artifact: &'static str },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Archive(#[from] ArtifactError),
    #[error("{0} is not valid UTF-8")]
    NotUtf8(&'static str),
}

#[derive(Debug, Error)]
pub enum CommitFailure {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Config(#[from] BuildConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpOutcome {
    Committed { url: String },
    Skipped { current: ReleaseVersion },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    pub build_id: u64,
    pub commit_sha: String,
    pub version: ReleaseVersion,
    pub next_version: ReleaseVersion,
    pub release_url: String,
    pub made_latest: bool,
    pub bump: BumpOutcome,
}

pub struct Promoter<'a, H: ReleaseHost + ?Sized> {
    host: &'a H,
    options: PromoteOptions,
}

impl<'a, H: ReleaseHost + ?Sized> Promoter<'a, H> {
    pub fn new(host: &'a H, options: PromoteOptions) -> Self {
        Self { host, options }
    }

    /// Run the whole promotion. Steps run in order and the first failure
    /// stops the run; nothing already created on the host is rolled back.
    ///
    /// # Errors
    /// Returns the [`PromoteError`] of the step that failed.
    pub async fn run(&self) -> Result<PromotionReport, PromoteError> {
        let build = self.resolve_build().await?;
        let (installer, environment_yaml) = self.fetch_artifacts(build.id).await?;
        info!("Found installer: {}", installer.name);

        let header = InstallerHeader::parse(&installer.data)?;
        debug!(
            "Found installer metadata: {:?}",
            header.metadata().collect::<Vec<_>>()
        );
        let built: ReleaseVersion = header.version()?.parse()?;
        let (version, next_version) = resolve_versions(self.options.version.as_ref(), &built)?;
        info!("Releasing {version}, next version will be {next_version}");

        let name = match (&self.options.product_name, header.name()) {
            (Some(name), _) => name.clone(),
            (None, Some(name)) => name.to_string(),
            (None, None) => {
                return Err(HeaderError::MissingMetadata { key: "NAME" }.into());
            }
        };
        let platform = platform_label(header.get("PLAT"));
        let patched = Bytes::from(patch_installer(&installer.data, &version.to_string())?);

        let made_latest = !version.is_prerelease();
        let release = self
            .publish(&build, &name, platform, &version, &patched, &environment_yaml)
            .await?;

        let bump = self.bump_build_config(&next_version).await?;

        Ok(PromotionReport {
            build_id: build.id,
            commit_sha: build.head_sha,
            version,
            next_version,
            release_url: release.html_url,
            made_latest,
            bump,
        })
    }

    async fn resolve_build(&self) -> Result<BuildRun, PromoteError> {
        let build = match self.options.build_id {
            Some(build_id) => match self.host.get_build(build_id).await {
                Ok(build) => build,
                Err(error) if error.is_not_found() => {
                    return Err(PromoteError::BuildNotFound(format!("run {build_id}")));
                }
                Err(error) => return Err(PromoteError::BuildLookup(error)),
            },
            None => {
                let workflow = &self.options.workflow;
                let branch = &self.options.branch;
                let runs = self
                    .host
                    .list_builds(workflow, branch)
                    .await
                    .map_err(PromoteError::BuildLookup)?;
                let build = runs
                    .into_iter()
                    .filter(BuildRun::succeeded)
                    .max_by_key(|run| run.created_at)
                    .ok_or_else(|| {
                        PromoteError::BuildNotFound(format!(
                            "no successful {workflow} run on {branch}"
                        ))
                    })?;
                info!("Run ID was not provided, using: {}", build.id);
                build
            }
        };

        if !build.succeeded() {
            return Err(PromoteError::BuildNotSuccessful {
                build_id: build.id,
                conclusion: build.conclusion_label().to_string(),
            });
        }

        Ok(build)
    }

    async fn fetch_artifacts(
        &self,
        build_id: u64,
    ) -> Result<(ArtifactFile, String), ArtifactFailure> {
        let artifacts = self.host.list_artifacts(build_id).await?;
        let environment_ref = find_artifact(&artifacts, build_id, ENVIRONMENT_ARTIFACT)?;
        let installer_ref = find_artifact(&artifacts, build_id, INSTALLER_ARTIFACT)?;

        let archive = self.host.download_artifact(environment_ref).await?;
        let environment_yaml = read_named_file(ENVIRONMENT_ARTIFACT, &archive, ENVIRONMENT_FILE)?;
        let environment_yaml = String::from_utf8(environment_yaml)
            .map_err(|_| ArtifactFailure::NotUtf8(ENVIRONMENT_FILE))?;

        let archive = self.host.download_artifact(installer_ref).await?;
        let installer = read_single_file(INSTALLER_ARTIFACT, &archive)?;

        Ok((installer, environment_yaml))
    }

    async fn publish(
        &self,
        build: &BuildRun,
        name: &str,
        platform: &str,
        version: &ReleaseVersion,
        installer: &Bytes,
        environment_yaml: &str,
    ) -> Result<PublishedRelease, PromoteError> {
        // Draft until every asset is uploaded.
        let request = NewRelease {
            tag_name: version.to_string(),
            target_commitish: build.head_sha.clone(),
            name: version.to_string(),
            body: release_notes(name, version, environment_yaml),
            draft: true,
            prerelease: version.is_prerelease(),
        };
        let draft = self
            .host
            .create_release(&request)
            .await
            .map_err(PromoteError::ReleaseCreate)?;
        info!("Created draft release at: {}", draft.html_url);

        for asset in release_assets(name, version, platform, installer, environment_yaml) {
            if let Err(source) = self.host.upload_asset(&draft, &asset).await {
                warn!(
                    "Upload of {} failed, draft release left at {}",
                    asset.name, draft.html_url
                );
                return Err(PromoteError::Upload {
                    asset: asset.name,
                    source,
                });
            }
            debug!("Uploaded {} ({} bytes)", asset.name, asset.data.len());
        }

        let make_latest = !version.is_prerelease();
        let published = self
            .host
            .publish_release(&draft, make_latest)
            .await
            .map_err(PromoteError::AliasUpdate)?;
        info!("Published release at: {}", published.html_url);
        Ok(published)
    }

    async fn bump_build_config(
        &self,
        next_version: &ReleaseVersion,
    ) -> Result<BumpOutcome, CommitFailure> {
        let path = &self.options.build_config_path;
        let branch = &self.options.branch;
        let file = self.host.get_file(path, branch).await?;

        match plan_bump(&file.content, next_version)? {
            BumpPlan::Skip { current } => {
                info!(
                    "Skipping {path} version bump as {next_version} is not newer than {current}"
                );
                Ok(BumpOutcome::Skipped { current })
            }
            BumpPlan::Update { content, .. } => {
                let commit = self
                    .host
                    .commit_file(&FileCommit {
                        path: path.clone(),
                        branch: branch.clone(),
                        message: format!("Bump version to {next_version}"),
                        content,
                        previous_sha: file.sha,
                    })
                    .await?;
                info!(
                    "Pushed commit to bump version to {next_version} as {}",
                    commit.html_url
                );
                Ok(BumpOutcome::Committed {
                    url: commit.html_url,
                })
            }
        }
    }
}

fn find_artifact<'r>(
    artifacts: &'r [ArtifactRef],
    build_id: u64,
    artifact: &'static str,
) -> Result<&'r ArtifactRef, ArtifactFailure> {
    let found = artifacts
        .iter()
        .find(|candidate| candidate.name == artifact)
        .ok_or(ArtifactFailure::Missing { build_id, artifact })?;
    if found.expired {
        return Err(ArtifactFailure::Expired { build_id, artifact });
    }
    Ok(found)
}
