//! Environment service
//!
//! Prepares the runtime environment the program runs in. The result is an
//! explicit, fully resolved variable set that the launcher hands to the
//! child process; nothing is written to the launcher's own environment.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{LaunchError, Result};
use crate::process;

/// Loads the modules given as positional parameters, then dumps the
/// resulting environment NUL-separated on stdout after `ENV_MARKER`.
/// Module chatter goes to stderr; anything login profiles print to stdout
/// lands before the marker and is discarded.
const MODULE_LOAD_SCRIPT: &str =
    r#"module load "$@" 1>&2 && printf '\0%s\0' deepsat-env && env -0"#;

const ENV_MARKER: &str = "\0deepsat-env\0";

/// Service trait for runtime environment preparation
#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    /// Resolves the environment the program will run with
    ///
    /// Fails with `LaunchError::EnvironmentSetup` when a required module or
    /// runtime is unavailable.
    async fn prepare(&self) -> Result<ResolvedEnvironment>;
}

/// A complete set of environment variables for the child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    vars: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parses `env -0` output
    ///
    /// Entries without `=` are skipped.
    pub fn parse_env0(output: &str) -> Self {
        Self::from_vars(
            output
                .split('\0')
                .filter_map(|entry| entry.split_once('='))
                .filter(|(key, _)| !key.is_empty()),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn vars(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Locates an executable on this environment's `PATH`
    ///
    /// Names containing a `/` are checked as given.
    pub fn which(&self, executable: &str) -> Option<PathBuf> {
        if executable.contains('/') {
            let path = PathBuf::from(executable);
            return is_executable(&path).then_some(path);
        }

        let path_var = self.get("PATH")?;
        std::env::split_paths(path_var)
            .map(|dir| dir.join(executable))
            .find(|candidate| is_executable(candidate))
    }

    /// Modules reported as loaded through `LOADEDMODULES`
    pub fn loaded_modules(&self) -> Vec<&str> {
        self.get("LOADEDMODULES")
            .map(|v| v.split(':').filter(|m| !m.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Whether `module` (with or without a version suffix) is loaded
    pub fn has_module(&self, module: &str) -> bool {
        self.loaded_modules().iter().any(|loaded| {
            *loaded == module
                || loaded
                    .strip_prefix(module)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Environment from loading environment modules through a login shell
pub struct ModuleEnvironment {
    modules: Vec<String>,
    shell: String,
}

impl ModuleEnvironment {
    pub fn new(modules: Vec<String>, shell: impl Into<String>) -> Self {
        Self {
            modules,
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl EnvironmentProvider for ModuleEnvironment {
    async fn prepare(&self) -> Result<ResolvedEnvironment> {
        if self.modules.is_empty() {
            debug!("No modules requested, inheriting launcher environment");
            return InheritedEnvironment::new().prepare().await;
        }

        info!("Loading modules: {}", self.modules.join(" "));

        let output = process::capture(
            Command::new(&self.shell)
                .arg("-lc")
                .arg(MODULE_LOAD_SCRIPT)
                .arg(&self.shell)
                .args(&self.modules),
        )
        .await
        .map_err(|e| {
            LaunchError::EnvironmentSetup(format!("failed to execute {}: {}", self.shell, e))
        })?;

        if !output.success() {
            return Err(LaunchError::EnvironmentSetup(format!(
                "module load {} failed with code {}: {}",
                self.modules.join(" "),
                output.code(),
                output.stderr.trim()
            )));
        }

        let env = ResolvedEnvironment::parse_env0(env_dump(&output.stdout));

        // Some module systems exit 0 even when a module is unknown
        if env.get("LOADEDMODULES").is_some() {
            if let Some(missing) = self.modules.iter().find(|m| !env.has_module(m)) {
                return Err(LaunchError::EnvironmentSetup(format!(
                    "module '{}' is not available: {}",
                    missing,
                    output.stderr.trim()
                )));
            }
        }

        debug!("Resolved environment with {} variables", env.vars.len());
        Ok(env)
    }
}

/// The `env -0` part of the module shell's stdout
fn env_dump(stdout: &str) -> &str {
    stdout
        .split_once(ENV_MARKER)
        .map_or(stdout, |(_, dump)| dump)
}

/// The launcher's own environment, optionally with a different `PATH`
#[derive(Debug, Clone, Default)]
pub struct InheritedEnvironment {
    path_override: Option<String>,
}

impl InheritedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `PATH` in the resolved environment
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path_override: Some(path.into()),
        }
    }
}

#[async_trait]
impl EnvironmentProvider for InheritedEnvironment {
    async fn prepare(&self) -> Result<ResolvedEnvironment> {
        let mut env = ResolvedEnvironment::from_vars(std::env::vars());
        if let Some(path) = &self.path_override {
            env.set("PATH", path.clone());
        }
        Ok(env)
    }
}
