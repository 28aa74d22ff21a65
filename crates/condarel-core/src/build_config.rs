//! The `version:` line of the constructor build configuration.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::version::{ReleaseVersion, VersionParseError};

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^version: *(\d+\.\d\S*) *\n").expect("version line pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildConfigError {
    #[error("No `version:` line found in the build configuration")]
    VersionNotFound,
    #[error("Build configuration holds an invalid version: {0}")]
    InvalidVersion(#[from] VersionParseError),
    #[error("Expected exactly one `version:` line in the build configuration, found {0}")]
    AmbiguousVersion(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpPlan {
    /// The configuration is already at or beyond the requested version.
    Skip { current: ReleaseVersion },
    Update {
        current: ReleaseVersion,
        content: String,
    },
}

/// The version currently recorded in the build configuration.
///
/// # Errors
/// Returns an error if no version line exists or it cannot be parsed.
pub fn current_version(content: &str) -> Result<ReleaseVersion, BuildConfigError> {
    let caps = VERSION_LINE
        .captures(content)
        .ok_or(BuildConfigError::VersionNotFound)?;
    let raw = caps.get(1).map_or("", |m| m.as_str());
    Ok(raw.trim().parse()?)
}

/// Decide whether the configuration should move to `next`, and produce the
/// rewritten text if so.
///
/// # Errors
/// Returns an error if the version line is missing, unparsable, or not
/// unique.
pub fn plan_bump(content: &str, next: &ReleaseVersion) -> Result<BumpPlan, BuildConfigError> {
    let current = current_version(content)?;
    if *next <= current {
        return Ok(BumpPlan::Skip { current });
    }

    let matches = VERSION_LINE.find_iter(content).count();
    if matches != 1 {
        return Err(BuildConfigError::AmbiguousVersion(matches));
    }

    let replacement = format!("version: {next}\n");
    let content = VERSION_LINE
        .replace(content, NoExpand(&replacement))
        .into_owned();
    Ok(BumpPlan::Update { current, content })
}
