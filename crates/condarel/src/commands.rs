use std::io::Write as _;

use condarel_core::{BumpOutcome, PromoteOptions, Promoter};
use condarel_github::GitHubHost;
use condarel_shell::ActivationScript;
use log::{debug, info};

use crate::cli::{ActivateArgs, Cli, Command, ReleaseArgs};
use crate::error::CliError;
use crate::settings::ReleaseSettings;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Activate(args) => activate(&args),
        Command::Release(args) => {
            let settings = ReleaseSettings::load(cli.config.as_deref())?;
            release(args, settings).await
        }
    }
}

fn activation_script(args: &ActivateArgs) -> ActivationScript {
    ActivationScript::new(&args.root)
        .with_root_var(&args.root_var)
        .with_hook(args.hook.into())
}

fn activate(args: &ActivateArgs) -> Result<(), CliError> {
    let script = activation_script(args);
    match &args.output {
        Some(path) => script.write_to(path)?,
        None => std::io::stdout()
            .lock()
            .write_all(script.render().as_bytes())
            .map_err(CliError::Stdout)?,
    }
    Ok(())
}

fn apply_overrides(settings: &mut ReleaseSettings, args: &mut ReleaseArgs) {
    if let Some(owner) = args.owner.take() {
        settings.owner = owner;
    }
    if let Some(repo) = args.repo.take() {
        settings.repo = repo;
    }
    if let Some(branch) = args.branch.take() {
        settings.branch = branch;
    }
}

async fn release(mut args: ReleaseArgs, mut settings: ReleaseSettings) -> Result<(), CliError> {
    apply_overrides(&mut settings, &mut args);
    debug!("Release settings: {settings:?}");

    let host = GitHubHost::new(settings.github_config(args.token))?;
    let options = PromoteOptions {
        build_id: args.run_id,
        version: args.version,
        workflow: settings.workflow,
        branch: settings.branch,
        build_config_path: settings.build_config_path,
        product_name: args.name,
    };

    info!("Promoting a build of {}/{}", settings.owner, settings.repo);
    let report = Promoter::new(&host, options).run().await?;

    info!(
        "Released {} from run {} ({}): {}",
        report.version, report.build_id, report.commit_sha, report.release_url
    );
    if !report.made_latest {
        info!("{} is a pre-release, the latest release is unchanged", report.version);
    }
    match report.bump {
        BumpOutcome::Committed { url } => {
            info!("Development version is now {}: {url}", report.next_version);
        }
        BumpOutcome::Skipped { current } => {
            info!(
                "Build configuration already at {current}, not bumping to {}",
                report.next_version
            );
        }
    }
    Ok(())
}
