//! Renders the POSIX shell file that an installed tree sources to activate
//! its environment.

mod activation;

pub use activation::{
    ActivationError, ActivationScript, DEFAULT_ROOT_VAR, EnvHook, TrustStore, shell_quote,
};
