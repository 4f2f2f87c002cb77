//! Job launcher
//!
//! Runs one preprocessing job as a linear sequence:
//! 1. validate the job and resource request
//! 2. allocate resources from the scheduler
//! 3. prepare the runtime environment
//! 4. invoke the program inside the allocation
//! 5. release the allocation and report usage
//!
//! Nothing is retried. The program's exit status is the launch result.

use chrono::Utc;
use deepsat_core::domain::invocation::{InvocationRecord, LaunchOutcome};
use deepsat_core::domain::job::JobSpec;
use deepsat_core::domain::resources::ResourceRequest;
use deepsat_core::shell;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{Program, RunnerConfig, SchedulerKind};
use crate::error::{InvocationError, LaunchError, Result};
use crate::scheduler::{self, Allocation, Scheduler};
use crate::service::{
    EnvironmentProvider, ModuleEnvironment, NoopReporter, SeffReporter, SummaryReporter,
    UsageReporter,
};

/// How the invoked process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Exited(i32),
    Signaled,
    TimedOut,
}

/// Launches preprocessing jobs through injected collaborators
pub struct Launcher {
    scheduler: Arc<dyn Scheduler>,
    environment: Arc<dyn EnvironmentProvider>,
    reporter: Arc<dyn UsageReporter>,
    program: Program,
}

impl Launcher {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        environment: Arc<dyn EnvironmentProvider>,
        reporter: Arc<dyn UsageReporter>,
        program: Program,
    ) -> Self {
        Self {
            scheduler,
            environment,
            reporter,
            program,
        }
    }

    /// Builds a launcher wired for the configured scheduler
    pub fn from_config(config: &RunnerConfig) -> Self {
        let scheduler = scheduler::create_scheduler(config);
        let environment = Arc::new(ModuleEnvironment::new(
            config.modules.clone(),
            config.module_shell.clone(),
        ));

        let reporter: Arc<dyn UsageReporter> = match (config.report_usage, config.scheduler) {
            (false, _) => Arc::new(NoopReporter::default()),
            (true, SchedulerKind::Slurm) => {
                Arc::new(SeffReporter::new(config.slurm_command("seff")))
            }
            (true, SchedulerKind::Local) => Arc::new(SummaryReporter::default()),
        };

        Self::new(scheduler, environment, reporter, config.program.clone())
    }

    /// Launches one job and waits for it to finish
    ///
    /// Configuration errors are raised before the scheduler is contacted.
    /// Returns `Ok` only when the program exits with status 0.
    pub async fn launch(
        &self,
        job: &JobSpec,
        resources: &ResourceRequest,
    ) -> Result<LaunchOutcome> {
        job.validate()?;
        resources.validate()?;

        info!(
            "Launching {} via {} scheduler",
            resources.job_name,
            self.scheduler.name()
        );

        let allocation = self.scheduler.allocate(resources).await?;

        let result = self.run_in_allocation(&allocation, job).await;

        if let Err(e) = self.scheduler.release(&allocation).await {
            warn!("Failed to release allocation {}: {}", allocation.id, e);
        }

        let (record, exit) = result?;

        if let Err(e) = self.reporter.report(&allocation, &record).await {
            warn!("Usage report for {} failed: {:#}", allocation.id, e);
        }

        match exit {
            ProcessExit::Exited(0) => {
                info!("Job {} completed successfully", allocation.id);
                Ok(LaunchOutcome {
                    allocation_id: allocation.id,
                    record,
                })
            }
            ProcessExit::Exited(code) => {
                error!("Job {} failed with exit code {}", allocation.id, code);
                Err(InvocationError::ExitStatus(code).into())
            }
            ProcessExit::Signaled => {
                error!("Job {} was terminated by a signal", allocation.id);
                Err(InvocationError::Signaled.into())
            }
            ProcessExit::TimedOut => {
                let limit = allocation.deadline.unwrap_or_default();
                error!("Job {} exceeded its time limit", allocation.id);
                Err(InvocationError::TimedOut(limit).into())
            }
        }
    }

    /// Prepares the environment and runs the program in the allocation
    async fn run_in_allocation(
        &self,
        allocation: &Allocation,
        job: &JobSpec,
    ) -> Result<(InvocationRecord, ProcessExit)> {
        let env = self.environment.prepare().await?;

        let resolved = env.which(&self.program.executable).ok_or_else(|| {
            LaunchError::EnvironmentSetup(format!(
                "'{}' not found on PATH of the prepared environment",
                self.program.executable
            ))
        })?;
        debug!("Resolved {} to {}", self.program.executable, resolved.display());

        let mut argv = self.program.argv(job);
        argv[0] = resolved.to_string_lossy().into_owned();
        let argv = self.scheduler.wrap(allocation, argv);

        info!("Invoking: {}", shell::join(&argv));

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| LaunchError::Scheduling("scheduler produced an empty command".into()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .env_clear()
            .envs(env.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let started_at = Utc::now();
        let mut child = command.spawn().map_err(|source| InvocationError::Spawn {
            program: program.clone(),
            source,
        })?;

        let exit = match allocation.deadline {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => exit_from(status.map_err(InvocationError::Wait)?),
                Err(_) => {
                    warn!("Time limit of {:?} reached, killing process", limit);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed out process: {}", e);
                    }
                    ProcessExit::TimedOut
                }
            },
            None => exit_from(child.wait().await.map_err(InvocationError::Wait)?),
        };

        let record = InvocationRecord {
            started_at,
            finished_at: Utc::now(),
            exit_code: match exit {
                ProcessExit::Exited(code) => Some(code),
                _ => None,
            },
        };

        Ok((record, exit))
    }
}

fn exit_from(status: std::process::ExitStatus) -> ProcessExit {
    match status.code() {
        Some(code) => ProcessExit::Exited(code),
        None => ProcessExit::Signaled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::LocalScheduler;
    use crate::service::{InheritedEnvironment, ResolvedEnvironment};
    use async_trait::async_trait;
    use deepsat_core::ConfigError;
    use deepsat_core::domain::resources::TimeLimit;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Local scheduler that records every call
    #[derive(Default)]
    struct RecordingScheduler {
        inner: LocalScheduler,
        allocations: AtomicUsize,
        releases: AtomicUsize,
        wrapped: Mutex<Vec<Vec<String>>>,
        deny: bool,
    }

    #[async_trait]
    impl Scheduler for RecordingScheduler {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn allocate(&self, request: &ResourceRequest) -> Result<Allocation> {
            self.allocations.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(LaunchError::Scheduling("partition gpu is down".into()));
            }
            self.inner.allocate(request).await
        }

        fn wrap(&self, allocation: &Allocation, argv: Vec<String>) -> Vec<String> {
            self.wrapped.lock().unwrap().push(argv.clone());
            self.inner.wrap(allocation, argv)
        }

        async fn release(&self, allocation: &Allocation) -> Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release(allocation).await
        }
    }

    struct FailingEnvironment;

    #[async_trait]
    impl EnvironmentProvider for FailingEnvironment {
        async fn prepare(&self) -> Result<ResolvedEnvironment> {
            Err(LaunchError::EnvironmentSetup(
                "module python-env/3.5.3-ml not found".into(),
            ))
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl UsageReporter for CountingReporter {
        async fn report(&self, _: &Allocation, _: &InvocationRecord) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("seff: command not found");
            }
            Ok(())
        }
    }

    /// `sh -c <script>` with the job arguments as positional parameters
    fn shell_program(script: &str) -> Program {
        Program::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "preprocess".to_string()],
        )
    }

    fn launcher(
        scheduler: Arc<RecordingScheduler>,
        reporter: Arc<CountingReporter>,
        program: Program,
    ) -> Launcher {
        Launcher::new(
            scheduler,
            Arc::new(InheritedEnvironment::new()),
            reporter,
            program,
        )
    }

    #[tokio::test]
    async fn test_successful_launch_invokes_program_once_with_all_arguments() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let reporter = Arc::new(CountingReporter::default());
        let launcher = launcher(scheduler.clone(), reporter.clone(), shell_program("exit 0"));

        let outcome = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap();

        assert!(outcome.allocation_id.starts_with("local-"));
        assert_eq!(outcome.record.exit_code, Some(0));

        let wrapped = scheduler.wrapped.lock().unwrap();
        assert_eq!(wrapped.len(), 1);
        let command_line = wrapped[0].join(" ");
        for flag in [
            "--src_file_name hyperspectral_src",
            "--tgt_file_name hyperspectral_tgt",
            "--metadata_file_name metadata",
            "--normalize_method l2norm_along_channel",
            "--forest_data_path /proj/deepsat/hyperspectral/forestdata.hdr",
        ] {
            assert!(command_line.contains(flag), "missing '{}'", flag);
        }

        assert_eq!(scheduler.allocations.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.releases.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_program_receives_arguments_unmodified() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let job = JobSpec {
            src_file_name: "mosaic src".to_string(),
            ..JobSpec::default()
        };
        // $2 is the source value, $10 the forest data path
        let launcher = launcher(
            scheduler,
            Arc::new(CountingReporter::default()),
            shell_program(
                r#"[ "$2" = "mosaic src" ] && [ "${10}" = "/proj/deepsat/hyperspectral/forestdata.hdr" ]"#,
            ),
        );

        assert!(launcher.launch(&job, &ResourceRequest::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_propagates_as_invocation_error() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let reporter = Arc::new(CountingReporter::default());
        let launcher = launcher(scheduler.clone(), reporter.clone(), shell_program("exit 3"));

        let err = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LaunchError::Invocation(InvocationError::ExitStatus(3))
        ));
        assert_eq!(err.exit_code(), 3);
        // Usage is still reported for failed runs
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_src_file_name_fails_before_scheduler_call() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let launcher = launcher(
            scheduler.clone(),
            Arc::new(CountingReporter::default()),
            shell_program("exit 0"),
        );
        let job = JobSpec {
            src_file_name: String::new(),
            ..JobSpec::default()
        };

        let err = launcher
            .launch(&job, &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LaunchError::Config(ConfigError::EmptyField("src_file_name"))
        ));
        assert_eq!(scheduler.allocations.load(Ordering::SeqCst), 0);
        assert!(scheduler.wrapped.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduling_error_skips_invocation() {
        let scheduler = Arc::new(RecordingScheduler {
            deny: true,
            ..RecordingScheduler::default()
        });
        let reporter = Arc::new(CountingReporter::default());
        let launcher = launcher(scheduler.clone(), reporter.clone(), shell_program("exit 0"));

        let err = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Scheduling(_)));
        assert!(scheduler.wrapped.lock().unwrap().is_empty());
        assert_eq!(scheduler.releases.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_environment_error_releases_allocation() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let launcher = Launcher::new(
            scheduler.clone(),
            Arc::new(FailingEnvironment),
            Arc::new(CountingReporter::default()),
            shell_program("exit 0"),
        );

        let err = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::EnvironmentSetup(_)));
        assert!(scheduler.wrapped.lock().unwrap().is_empty());
        assert_eq!(scheduler.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_program_missing_from_path_is_environment_error() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let launcher = Launcher::new(
            scheduler.clone(),
            Arc::new(InheritedEnvironment::with_path("/nonexistent/deepsat/bin")),
            Arc::new(CountingReporter::default()),
            Program::default(),
        );

        let err = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::EnvironmentSetup(ref msg) if msg.contains("python")));
    }

    #[tokio::test]
    async fn test_reporter_failure_does_not_change_result() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let reporter = Arc::new(CountingReporter {
            fail: true,
            ..CountingReporter::default()
        });
        let launcher = launcher(scheduler, reporter.clone(), shell_program("exit 0"));

        assert!(
            launcher
                .launch(&JobSpec::default(), &ResourceRequest::default())
                .await
                .is_ok()
        );
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_time_limit_kills_program() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let launcher = launcher(
            scheduler,
            Arc::new(CountingReporter::default()),
            shell_program("sleep 30"),
        );
        let resources = ResourceRequest {
            time_limit: TimeLimit::from_hms(0, 0, 1),
            ..ResourceRequest::default()
        };

        let err = launcher
            .launch(&JobSpec::default(), &resources)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LaunchError::Invocation(InvocationError::TimedOut(_))
        ));
        assert_eq!(err.exit_code(), 124);
    }

    #[tokio::test]
    async fn test_killed_program_is_reported_as_signaled() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let reporter = Arc::new(CountingReporter::default());
        let launcher = launcher(scheduler.clone(), reporter.clone(), shell_program("kill -9 $$"));

        let err = launcher
            .launch(&JobSpec::default(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LaunchError::Invocation(InvocationError::Signaled)
        ));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(scheduler.releases.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_uses_configured_scheduler() {
        let config = RunnerConfig::new(SchedulerKind::Local);
        let launcher = Launcher::from_config(&config);
        assert_eq!(launcher.scheduler.name(), "local");
        assert_eq!(launcher.program, Program::default());
    }
}
