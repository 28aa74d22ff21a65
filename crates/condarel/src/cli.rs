use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use condarel_core::ReleaseVersion;
use condarel_shell::{DEFAULT_ROOT_VAR, EnvHook};

#[derive(Parser, Debug)]
#[command(name = "condarel", version, about, long_about = None)]
pub struct Cli {
    /// Log debug messages
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Also write log output to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// JSON release settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the activation script for an installed tree
    Activate(ActivateArgs),
    /// Promote a CI build to a published release
    Release(ReleaseArgs),
}

#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// Installation root
    #[arg(long, value_name = "PATH")]
    pub root: PathBuf,

    /// Destination file, stdout when omitted
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Variable exported with the installation root
    #[arg(long, default_value = DEFAULT_ROOT_VAR)]
    pub root_var: String,

    #[arg(long, value_enum, default_value_t = HookArg::Conda)]
    pub hook: HookArg,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// GitHub token with release and contents permissions
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_parser = parse_token)]
    pub token: String,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub repo: Option<String>,

    /// Branch whose builds are considered and whose build configuration is bumped
    #[arg(long)]
    pub branch: Option<String>,

    /// Workflow run to promote, the latest successful one when omitted
    #[arg(long)]
    pub run_id: Option<u64>,

    /// Version to release, the built version rounded to a full release when omitted
    #[arg(long, value_parser = parse_release_version)]
    pub version: Option<ReleaseVersion>,

    /// Product name used in asset names instead of the installer's own
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookArg {
    Conda,
    Micromamba,
}

impl From<HookArg> for EnvHook {
    fn from(value: HookArg) -> Self {
        match value {
            HookArg::Conda => Self::Conda,
            HookArg::Micromamba => Self::Micromamba,
        }
    }
}

fn parse_token(value: &str) -> Result<String, String> {
    let token = value.trim();
    if token.is_empty() {
        return Err("the token must not be empty".to_string());
    }
    Ok(token.to_string())
}

fn parse_release_version(value: &str) -> Result<ReleaseVersion, String> {
    if value.starts_with(['v', 'V']) {
        return Err(format!("'{value}' must not start with 'v'"));
    }
    value.parse().map_err(|error| format!("{error}"))
}
