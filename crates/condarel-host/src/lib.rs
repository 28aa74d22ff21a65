mod error;
mod traits;
mod types;

pub use error::{HostError, HostStage};
pub use traits::ReleaseHost;
pub use types::{
    ArtifactRef, BuildRun, CommitInfo, FileCommit, NewRelease, PublishedRelease, ReleaseAsset,
    RepoFile,
};
