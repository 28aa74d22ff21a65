use condarel_core::PromoteError;
use condarel_host::HostError;
use condarel_shell::ActivationError;
use thiserror::Error;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to write activation script: {0}")]
    Activation(#[from] ActivationError),

    #[error("Failed to write to stdout: {0}")]
    Stdout(#[source] std::io::Error),

    #[error("Failed to set up GitHub client: {0}")]
    Client(#[from] HostError),

    #[error("Release failed: {0}")]
    Release(#[from] PromoteError),
}
