use bytes::Bytes;
use condarel_host::ReleaseAsset;

use crate::version::ReleaseVersion;

pub const INSTALLER_CONTENT_TYPE: &str = "application/x-sh";
pub const YAML_CONTENT_TYPE: &str = "application/x-yaml";

const DEFAULT_PLATFORM: &str = "Linux-x86_64";

/// Map a conda subdir (the installer's `# PLAT:` value) to the platform
/// label used in installer file names.
#[must_use]
pub fn platform_label(plat: Option<&str>) -> &'static str {
    match plat {
        Some("linux-aarch64") => "Linux-aarch64",
        Some("linux-ppc64le") => "Linux-ppc64le",
        Some("osx-64") => "MacOSX-x86_64",
        Some("osx-arm64") => "MacOSX-arm64",
        _ => DEFAULT_PLATFORM,
    }
}

#[must_use]
pub fn release_notes(name: &str, version: &ReleaseVersion, environment_yaml: &str) -> String {
    [
        format!("# {name} {version}"),
        String::new(),
        "## Changes".to_string(),
        "* TODO".to_string(),
        String::new(),
        "## Package list".to_string(),
        "```yaml".to_string(),
        environment_yaml.trim_end().to_string(),
        "```".to_string(),
    ]
    .join("\n")
}

/// Assets attached to a release: each file once under a versioned name and
/// once under a stable name that download links can point at. Both installer
/// assets share the `installer` buffer.
#[must_use]
pub fn release_assets(
    name: &str,
    version: &ReleaseVersion,
    platform: &str,
    installer: &Bytes,
    environment_yaml: &str,
) -> Vec<ReleaseAsset> {
    let environment = Bytes::copy_from_slice(environment_yaml.as_bytes());
    vec![
        ReleaseAsset::new(
            format!("{name}-{version}-{platform}.sh"),
            INSTALLER_CONTENT_TYPE,
            installer.clone(),
        ),
        ReleaseAsset::new(
            format!("{name}-{platform}.sh"),
            INSTALLER_CONTENT_TYPE,
            installer.clone(),
        ),
        ReleaseAsset::new(
            format!("{name}-{version}-environment.yaml"),
            YAML_CONTENT_TYPE,
            environment.clone(),
        ),
        ReleaseAsset::new(
            format!("{name}-environment.yaml"),
            YAML_CONTENT_TYPE,
            environment,
        ),
    ]
}
