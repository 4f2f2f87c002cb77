//! Runner configuration
//!
//! Defines how a launch reaches the cluster: which scheduler to use, which
//! environment modules to load, which program to invoke, and where the
//! scheduler tools live.

use std::path::PathBuf;
use std::str::FromStr;

use deepsat_core::domain::job::JobSpec;

/// Runner configuration
///
/// These are site settings rather than job parameters; they rarely change
/// between launches.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Scheduler used to allocate resources and run the program
    pub scheduler: SchedulerKind,

    /// Environment modules loaded before invocation, in order
    pub modules: Vec<String>,

    /// Program invoked with the job arguments
    pub program: Program,

    /// Directory holding salloc/srun/scancel/sbatch/seff (None = use PATH)
    pub slurm_bin_dir: Option<PathBuf>,

    /// Shell used to evaluate `module load`
    pub module_shell: String,

    /// Emit resource-usage statistics after the run
    pub report_usage: bool,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new(scheduler: SchedulerKind) -> Self {
        Self {
            scheduler,
            modules: vec!["python-env/3.5.3-ml".to_string()],
            program: Program::default(),
            slurm_bin_dir: None,
            module_shell: "bash".to_string(),
            report_usage: true,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - DEEPSAT_SCHEDULER (slurm | local, default: slurm)
    /// - DEEPSAT_MODULES (comma separated, empty string for none)
    /// - DEEPSAT_PROGRAM (whitespace separated, default: "python preprocess.py")
    /// - DEEPSAT_SLURM_BIN_DIR
    /// - DEEPSAT_MODULE_SHELL (default: bash)
    /// - DEEPSAT_REPORT_USAGE (true | false, default: true)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scheduler = match lookup("DEEPSAT_SCHEDULER") {
            Some(value) => value.parse()?,
            None => SchedulerKind::Slurm,
        };

        let mut config = Self::new(scheduler);

        if let Some(modules) = lookup("DEEPSAT_MODULES") {
            config.modules = parse_module_list(&modules);
        }

        if let Some(program) = lookup("DEEPSAT_PROGRAM") {
            config.program = program.parse()?;
        }

        config.slurm_bin_dir = lookup("DEEPSAT_SLURM_BIN_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if let Some(shell) = lookup("DEEPSAT_MODULE_SHELL") {
            config.module_shell = shell;
        }

        if let Some(report) = lookup("DEEPSAT_REPORT_USAGE") {
            config.report_usage = report
                .parse::<bool>()
                .map_err(|_| anyhow::anyhow!("DEEPSAT_REPORT_USAGE must be true or false"))?;
        }

        Ok(config)
    }

    /// Adds an environment module to load
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.program.executable.is_empty() {
            anyhow::bail!("program executable cannot be empty");
        }

        if self.modules.iter().any(|m| m.trim().is_empty()) {
            anyhow::bail!("module names cannot be empty");
        }

        if self.module_shell.trim().is_empty() {
            anyhow::bail!("module_shell cannot be empty");
        }

        Ok(())
    }

    /// Path of a Slurm command, honoring `slurm_bin_dir`
    pub fn slurm_command(&self, name: &str) -> PathBuf {
        match &self.slurm_bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(SchedulerKind::Slurm)
    }
}

/// Splits a comma separated module list, dropping blanks
pub fn parse_module_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which scheduler backs the launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Slurm cluster via salloc/srun
    Slurm,
    /// The local host; the launcher enforces the time limit itself
    Local,
}

impl FromStr for SchedulerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slurm" => Ok(SchedulerKind::Slurm),
            "local" => Ok(SchedulerKind::Local),
            other => anyhow::bail!("unknown scheduler '{}' (expected slurm or local)", other),
        }
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerKind::Slurm => write!(f, "slurm"),
            SchedulerKind::Local => write!(f, "local"),
        }
    }
}

/// The external program and its fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub executable: String,
    pub args: Vec<String>,
}

impl Program {
    pub fn new(executable: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
        }
    }

    /// Full argv for a job: executable, leading args, then the job arguments
    pub fn argv(&self, job: &JobSpec) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len() + 10);
        argv.push(self.executable.clone());
        argv.extend(self.args.iter().cloned());
        argv.extend(job.to_args());
        argv
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new("python", vec!["preprocess.py".to_string()])
    }
}

/// Parses a program from a whitespace separated command line
///
/// There is no quoting, so an executable or script path containing spaces
/// cannot be expressed this way; build such a program with `Program::new`.
impl FromStr for Program {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace().map(str::to_string);
        let executable = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("program cannot be empty"))?;
        Ok(Self::new(executable, words.collect()))
    }
}
