use std::time::Duration;

use async_trait::async_trait;
use condarel_host::{
    ArtifactRef, BuildRun, CommitInfo, FileCommit, HostError, NewRelease, PublishedRelease,
    ReleaseAsset, ReleaseHost, RepoFile,
};
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::api::{
    Artifacts, ContentsResponse, ContentsUpdate, ContentsUpdateResponse, ReleaseUpdate,
    WorkflowRuns, decode_content, encode_content, expand_upload_url, response_snippet,
};

pub const DEFAULT_API_ROOT: &str = "https://api.github.com";

const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";
const ZIP_CONTENT_TYPE: &str = "application/zip";
const RUNS_PER_PAGE: &str = "50";
const BODY_SNIPPET_CHARS: usize = 160;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_root: String,
    pub owner: String,
    pub repo: String,
    pub token: String,
    /// Longest wait for the next chunk of a response. Transfers that keep
    /// making progress are never cut off.
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl GitHubConfig {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Releases, Actions and contents API client for one repository.
pub struct GitHubHost {
    client: reqwest::Client,
    repo_root: String,
    token: String,
}

impl GitHubHost {
    /// Build a client for the configured repository.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: GitHubConfig) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .read_timeout(config.idle_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(format!("condarel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| HostError::request_from("build HTTP client", error))?;

        let repo_root = format!(
            "{}/repos/{}/{}",
            config.api_root.trim_end_matches('/'),
            config.owner,
            config.repo
        );

        Ok(Self {
            client,
            repo_root,
            token: config.token,
        })
    }

    #[must_use]
    pub fn repo_root(&self) -> &str {
        &self.repo_root
    }

    fn repo_url(&self, path: &str) -> Result<Url, HostError> {
        Url::parse(&format!("{}/{path}", self.repo_root))
            .map_err(|error| HostError::request_from("build request URL", error))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(ACCEPT, ACCEPT_GITHUB_V3)
            .header(AUTHORIZATION, format!("token {}", self.token))
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, HostError> {
        let response = request
            .send()
            .await
            .map_err(|error| HostError::request_from(operation, error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, BODY_SNIPPET_CHARS))
            .unwrap_or_default();
        Err(HostError::HttpStatus {
            operation,
            status: status.as_u16(),
            body_snippet,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, HostError> {
        self.send(operation, request)
            .await?
            .json()
            .await
            .map_err(|error| HostError::parse_from(operation, error))
    }
}

fn not_found_as(error: HostError, what: impl FnOnce() -> String) -> HostError {
    match error {
        HostError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            HostError::not_found(what())
        }
        other => other,
    }
}

#[async_trait]
impl ReleaseHost for GitHubHost {
    async fn list_builds(&self, workflow: &str, branch: &str) -> Result<Vec<BuildRun>, HostError> {
        let mut url = self.repo_url(&format!("actions/workflows/{workflow}/runs"))?;
        url.query_pairs_mut()
            .append_pair("branch", branch)
            .append_pair("status", "success")
            .append_pair("per_page", RUNS_PER_PAGE);

        let runs: WorkflowRuns = self
            .send_json("list workflow runs", self.request(Method::GET, url))
            .await
            .map_err(|error| not_found_as(error, || format!("workflow {workflow}")))?;
        debug!(
            "Found {} successful runs of {workflow} on {branch}",
            runs.workflow_runs.len()
        );
        Ok(runs.workflow_runs)
    }

    async fn get_build(&self, build_id: u64) -> Result<BuildRun, HostError> {
        let url = self.repo_url(&format!("actions/runs/{build_id}"))?;
        self.send_json("get workflow run", self.request(Method::GET, url))
            .await
            .map_err(|error| not_found_as(error, || format!("workflow run {build_id}")))
    }

    async fn list_artifacts(&self, build_id: u64) -> Result<Vec<ArtifactRef>, HostError> {
        let url = self.repo_url(&format!("actions/runs/{build_id}/artifacts"))?;
        let artifacts: Artifacts = self
            .send_json("list artifacts", self.request(Method::GET, url))
            .await?;
        Ok(artifacts.artifacts)
    }

    async fn download_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, HostError> {
        const OPERATION: &str = "download artifact";

        let url = Url::parse(&artifact.archive_download_url)
            .map_err(|error| HostError::invalid_response(OPERATION, error.to_string()))?;
        let response = self.send(OPERATION, self.request(Method::GET, url)).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(ZIP_CONTENT_TYPE) {
            return Err(HostError::invalid_response(
                OPERATION,
                format!("expected {ZIP_CONTENT_TYPE} for {}, got '{content_type}'", artifact.name),
            ));
        }

        let mut data = Vec::with_capacity(usize::try_from(artifact.size_in_bytes).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| HostError::request_from(OPERATION, error))?;
            data.extend_from_slice(&chunk);
        }

        info!("Downloaded {} artifact: {} bytes", artifact.name, data.len());
        Ok(data)
    }

    async fn create_release(&self, release: &NewRelease) -> Result<PublishedRelease, HostError> {
        let url = self.repo_url("releases")?;
        self.send_json(
            "create release",
            self.request(Method::POST, url).json(release),
        )
        .await
    }

    async fn upload_asset(
        &self,
        release: &PublishedRelease,
        asset: &ReleaseAsset,
    ) -> Result<(), HostError> {
        let url = expand_upload_url(&release.upload_url, &asset.name)?;
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, asset.content_type)
            .body(asset.data.clone());
        self.send("upload asset", request).await?;
        Ok(())
    }

    async fn publish_release(
        &self,
        release: &PublishedRelease,
        make_latest: bool,
    ) -> Result<PublishedRelease, HostError> {
        let url = Url::parse(&release.url)
            .map_err(|error| HostError::invalid_response("publish release", error.to_string()))?;
        let update = ReleaseUpdate {
            draft: false,
            make_latest: if make_latest { "true" } else { "false" },
        };
        self.send_json(
            "publish release",
            self.request(Method::PATCH, url).json(&update),
        )
        .await
    }

    async fn get_file(&self, path: &str, branch: &str) -> Result<RepoFile, HostError> {
        let mut url = self.repo_url(&format!("contents/{path}"))?;
        url.query_pairs_mut().append_pair("ref", branch);

        let file: ContentsResponse = self
            .send_json("read file", self.request(Method::GET, url))
            .await
            .map_err(|error| not_found_as(error, || format!("{path} on {branch}")))?;

        if let Some(encoding) = file.encoding.as_deref()
            && encoding != "base64"
        {
            return Err(HostError::invalid_response(
                "read file",
                format!("unsupported content encoding '{encoding}' for {path}"),
            ));
        }

        Ok(RepoFile {
            path: file.path,
            sha: file.sha,
            content: decode_content(&file.content)?,
        })
    }

    async fn commit_file(&self, commit: &FileCommit) -> Result<CommitInfo, HostError> {
        let url = self.repo_url(&format!("contents/{}", commit.path))?;
        let update = ContentsUpdate {
            message: &commit.message,
            content: encode_content(&commit.content),
            sha: &commit.previous_sha,
            branch: &commit.branch,
        };
        let response: ContentsUpdateResponse = self
            .send_json("commit file", self.request(Method::PUT, url).json(&update))
            .await?;
        Ok(CommitInfo {
            sha: response.commit.sha,
            html_url: response.commit.html_url,
        })
    }
}
