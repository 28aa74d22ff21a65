use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SUCCESS_CONCLUSION: &str = "success";

/// A single CI workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRun {
    pub id: u64,
    pub head_sha: String,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl BuildRun {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some(SUCCESS_CONCLUSION)
    }

    /// Conclusion as reported by CI, or `"pending"` for runs still in flight.
    #[must_use]
    pub fn conclusion_label(&self) -> &str {
        self.conclusion.as_deref().unwrap_or("pending")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: u64,
    pub name: String,
    pub archive_download_url: String,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedRelease {
    pub id: u64,
    /// API URL used to edit the release.
    pub url: String,
    pub html_url: String,
    /// RFC 6570 template, e.g. `https://uploads.github.com/.../assets{?name,label}`.
    pub upload_url: String,
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// A file to attach to a release. Cloning shares `data` rather than copying
/// it, so one installer buffer can back several assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub content_type: &'static str,
    pub data: Bytes,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, content_type: &'static str, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            data: data.into(),
        }
    }
}

/// A file read from a branch of the hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    /// Blob sha, required to update the file.
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommit {
    pub path: String,
    pub branch: String,
    pub message: String,
    pub content: String,
    pub previous_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub html_url: String,
}
