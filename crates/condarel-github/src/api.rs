use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use condarel_host::{ArtifactRef, BuildRun, HostError};
use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub(crate) struct WorkflowRuns {
    pub workflow_runs: Vec<BuildRun>,
}

#[derive(Deserialize)]
pub(crate) struct Artifacts {
    pub artifacts: Vec<ArtifactRef>,
}

#[derive(Deserialize)]
pub(crate) struct ContentsResponse {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ContentsUpdate<'a> {
    pub message: &'a str,
    pub content: String,
    pub sha: &'a str,
    pub branch: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct ContentsUpdateResponse {
    pub commit: CommitPayload,
}

#[derive(Deserialize)]
pub(crate) struct CommitPayload {
    pub sha: String,
    pub html_url: String,
}

#[derive(Serialize)]
pub(crate) struct ReleaseUpdate {
    pub draft: bool,
    /// GitHub takes the string values `"true"`, `"false"` and `"legacy"`.
    pub make_latest: &'static str,
}

/// Expand a release `upload_url` template such as
/// `https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}`.
///
/// # Errors
/// Returns an error if the template does not hold a valid URL.
pub fn expand_upload_url(template: &str, name: &str) -> Result<Url, HostError> {
    let base = template
        .split_once('{')
        .map_or(template, |(base, _)| base);
    let mut url = Url::parse(base)
        .map_err(|error| HostError::invalid_response("upload asset", error.to_string()))?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url)
}

/// Decode the base64 `content` field of the contents API, which GitHub
/// wraps at 60 columns.
///
/// # Errors
/// Returns an error if the content is not base64 encoded UTF-8.
pub fn decode_content(encoded: &str) -> Result<String, HostError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|error| HostError::parse_from("read file", error))?;
    String::from_utf8(bytes).map_err(|error| HostError::parse_from("read file", error))
}

#[must_use]
pub fn encode_content(content: &str) -> String {
    STANDARD.encode(content)
}

pub(crate) fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
