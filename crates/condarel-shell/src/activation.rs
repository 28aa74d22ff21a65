use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

pub const DEFAULT_ROOT_VAR: &str = "DIRACOS";

const POPULATED_FN: &str = "dir_is_populated";

const DEFAULT_TRANSFER_OPTIONS: [(&str, &str); 5] = [
    ("XRD_RUNFORKHANDLER", "1"),
    ("XRD_REQUESTTIMEOUT", "120"),
    ("XRD_CONNECTIONWINDOW", "15"),
    ("XRD_CONNECTIONRETRY", "3"),
    ("DAVIX_USE_LIBCURL", "1"),
];

const DEFAULT_TRUST_STORES: [(&str, &str, &str); 3] = [
    (
        "X509_CERT_DIR",
        "/etc/grid-security/certificates",
        "etc/grid-security/certificates",
    ),
    (
        "X509_VOMS_DIR",
        "/etc/grid-security/vomsdir",
        "etc/grid-security/vomsdir",
    ),
    ("X509_VOMSES", "/etc/vomses", "etc/grid-security/vomses"),
];

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Refusing to overwrite directory {0}")]
    IsDirectory(PathBuf),

    #[error("Failed to {context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ActivationError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How the bundled package manager hooks itself into the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvHook {
    #[default]
    Conda,
    Micromamba,
}

impl EnvHook {
    fn lines(self, root_var: &str) -> [String; 2] {
        match self {
            Self::Conda => [
                format!(". \"${root_var}/etc/profile.d/conda.sh\""),
                format!("conda activate \"${root_var}\""),
            ],
            Self::Micromamba => [
                format!("eval \"$(\"${root_var}/bin/micromamba\" shell hook -s posix)\""),
                format!("micromamba activate \"${root_var}\""),
            ],
        }
    }
}

/// A certificate or VOMS location resolved at activation time.
///
/// A populated value already in the environment wins, then a populated
/// `system_default`, then `fallback` (relative to the installation root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    pub var: String,
    pub system_default: PathBuf,
    pub fallback: PathBuf,
}

impl TrustStore {
    pub fn new(
        var: impl Into<String>,
        system_default: impl Into<PathBuf>,
        fallback: impl Into<PathBuf>,
    ) -> Self {
        Self {
            var: var.into(),
            system_default: system_default.into(),
            fallback: fallback.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivationScript {
    root: PathBuf,
    root_var: String,
    hook: EnvHook,
    transfer_options: Vec<(String, String)>,
    trust_stores: Vec<TrustStore>,
}

impl ActivationScript {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            root_var: DEFAULT_ROOT_VAR.to_string(),
            hook: EnvHook::default(),
            transfer_options: DEFAULT_TRANSFER_OPTIONS
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
            trust_stores: DEFAULT_TRUST_STORES
                .iter()
                .map(|(var, system_default, fallback)| {
                    TrustStore::new(*var, *system_default, *fallback)
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn with_root_var(mut self, root_var: impl Into<String>) -> Self {
        self.root_var = root_var.into();
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: EnvHook) -> Self {
        self.hook = hook;
        self
    }

    /// Set a transfer-library variable, replacing any earlier value.
    #[must_use]
    pub fn with_transfer_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.transfer_options.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.transfer_options.push((name, value)),
        }
        self
    }

    /// Add a trust store, or replace the one resolving the same variable.
    #[must_use]
    pub fn with_trust_store(mut self, store: TrustStore) -> Self {
        match self.trust_stores.iter_mut().find(|s| s.var == store.var) {
            Some(existing) => *existing = store,
            None => self.trust_stores.push(store),
        }
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut script = String::new();
        let root_var = &self.root_var;

        let _ = writeln!(script, "# Source this file to activate {}", self.root.display());
        let _ = writeln!(script, "export {root_var}={}", shell_quote(&self.root));
        script.push('\n');

        for line in self.hook.lines(root_var) {
            let _ = writeln!(script, "{line}");
        }
        script.push('\n');

        script.push_str("export PYTHONWARNINGS=ignore\n\n");

        for (name, value) in &self.transfer_options {
            let _ = writeln!(script, "export {name}={}", shell_quote(value));
        }
        script.push('\n');

        script.push_str(&self.render_trust_stores());
        script
    }

    /// The `dir_is_populated` helper followed by one resolution block per
    /// trust store. Fallbacks are absolute, so the output runs on its own.
    #[must_use]
    pub fn render_trust_stores(&self) -> String {
        let mut script = String::new();

        let _ = writeln!(script, "{POPULATED_FN}() {{");
        script.push_str("    [ -d \"$1\" ] && [ -n \"$(ls -A \"$1\" 2>/dev/null)\" ]\n");
        script.push_str("}\n");

        for store in &self.trust_stores {
            let var = &store.var;
            let fallback = self.root.join(&store.fallback);
            script.push('\n');
            let _ = writeln!(script, "if ! {POPULATED_FN} \"${{{var}:-}}\"; then");
            let _ = writeln!(
                script,
                "    if {POPULATED_FN} {}; then",
                shell_quote(&store.system_default)
            );
            let _ = writeln!(
                script,
                "        export {var}={}",
                shell_quote(&store.system_default)
            );
            script.push_str("    else\n");
            let _ = writeln!(script, "        export {var}={}", shell_quote(&fallback));
            script.push_str("    fi\n");
            script.push_str("fi\n");
        }

        script
    }

    /// Write the rendered script to `path`, creating missing parents.
    ///
    /// # Errors
    /// Fails if `path` is an existing directory or cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), ActivationError> {
        if path.is_dir() {
            return Err(ActivationError::IsDirectory(path.to_path_buf()));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|error| ActivationError::io("create directory", parent, error))?;
        }

        fs::write(path, self.render())
            .map_err(|error| ActivationError::io("write", path, error))?;

        info!("Wrote activation script for {} to {}", self.root.display(), path.display());
        Ok(())
    }
}

/// Single-quote a value for POSIX shells.
#[must_use]
pub fn shell_quote(value: impl AsRef<std::ffi::OsStr>) -> String {
    let value = value.as_ref().to_string_lossy();
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("/opt/dirac"), "'/opt/dirac'");
        assert_eq!(shell_quote("/opt/it's"), r"'/opt/it'\''s'");
    }

    #[test]
    fn default_script_exports_root_and_conda_hook() {
        let script = ActivationScript::new("/opt/diracos").render();

        assert!(script.contains("export DIRACOS='/opt/diracos'\n"));
        assert!(script.contains("\n. \"$DIRACOS/etc/profile.d/conda.sh\"\n"));
        assert!(!script.contains("source "));
        assert!(script.contains("conda activate \"$DIRACOS\"\n"));
        assert!(script.contains("export PYTHONWARNINGS=ignore\n"));
        assert!(script.contains("export XRD_REQUESTTIMEOUT='120'\n"));
        assert!(script.contains("export DAVIX_USE_LIBCURL='1'\n"));
    }

    #[test]
    fn micromamba_hook_uses_custom_root_var() {
        let script = ActivationScript::new("/srv/env")
            .with_root_var("MYENV")
            .with_hook(EnvHook::Micromamba)
            .render();

        assert!(script.contains("export MYENV='/srv/env'\n"));
        assert!(script.contains("eval \"$(\"$MYENV/bin/micromamba\" shell hook -s posix)\"\n"));
        assert!(script.contains("micromamba activate \"$MYENV\"\n"));
        assert!(!script.contains("conda.sh"));
    }

    #[test]
    fn transfer_option_overrides_in_place() {
        let script = ActivationScript::new("/opt/diracos")
            .with_transfer_option("XRD_CONNECTIONRETRY", "5")
            .with_transfer_option("XRD_LOGLEVEL", "Dump")
            .render();

        assert!(script.contains("export XRD_CONNECTIONRETRY='5'\n"));
        assert!(!script.contains("XRD_CONNECTIONRETRY='3'"));
        assert!(script.contains("export XRD_LOGLEVEL='Dump'\n"));
    }

    #[test]
    fn trust_stores_fall_back_under_root() {
        let section = ActivationScript::new("/opt/diracos").render_trust_stores();

        assert!(section.starts_with("dir_is_populated() {\n"));
        assert!(section.contains("if ! dir_is_populated \"${X509_CERT_DIR:-}\"; then\n"));
        assert!(section.contains("export X509_VOMS_DIR='/etc/grid-security/vomsdir'\n"));
        assert!(section.contains("export X509_VOMSES='/opt/diracos/etc/grid-security/vomses'\n"));
    }

    #[test]
    fn with_trust_store_replaces_same_variable() {
        let script = ActivationScript::new("/opt/diracos").with_trust_store(TrustStore::new(
            "X509_CERT_DIR",
            "/custom/certs",
            "certs",
        ));
        let section = script.render_trust_stores();

        assert_eq!(section.matches("X509_CERT_DIR:-").count(), 1);
        assert!(section.contains("export X509_CERT_DIR='/custom/certs'\n"));
        assert!(section.contains("export X509_CERT_DIR='/opt/diracos/certs'\n"));
    }
}
