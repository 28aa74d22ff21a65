//! GitHub implementation of [`condarel_host::ReleaseHost`].

mod api;
mod client;

pub use api::{decode_content, encode_content, expand_upload_url};
pub use client::{DEFAULT_API_ROOT, GitHubConfig, GitHubHost};
