//! Release logic for constructor-built installers.
//!
//! Everything here is independent of a concrete hosting platform:
//! - Distribution version parsing, ordering and bump rules.
//! - Installer header inspection and payload-preserving version rewrites.
//! - Extraction of zipped CI artifacts.
//! - Build configuration version bumps.
//! - The promotion workflow, driven through [`condarel_host::ReleaseHost`].

mod artifact;
mod build_config;
mod header;
mod notes;
mod promote;
mod version;

pub use artifact::{ArtifactError, ArtifactFile, read_named_file, read_single_file};
pub use build_config::{BuildConfigError, BumpPlan, current_version, plan_bump};
pub use header::{
    END_HEADER_MAGIC, HeaderError, InstallerHeader, VersionSpan, patch_installer, splice,
};
pub use notes::{
    INSTALLER_CONTENT_TYPE, YAML_CONTENT_TYPE, platform_label, release_assets, release_notes,
};
pub use promote::{
    ArtifactFailure, BumpOutcome, CommitFailure, ENVIRONMENT_ARTIFACT, ENVIRONMENT_FILE,
    INSTALLER_ARTIFACT, PromoteError, PromoteOptions, Promoter, PromotionReport,
};
pub use version::{PreKind, PreRelease, ReleaseVersion, VersionParseError, resolve_versions};
