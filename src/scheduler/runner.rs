// src/scheduler/runner.rs
use crate::config::SchedulerConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("scheduler command is empty")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs whatever scheduled tasks are due and returns their captured output.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_due(&self) -> Result<String, TaskError>;
}

/// Runs an external command (e.g. `php artisan schedule:run`) and captures
/// its stdout.
#[derive(Debug, Clone)]
pub struct CommandTaskRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandTaskRunner {
    pub fn new(command: &[String], working_dir: Option<PathBuf>) -> Result<Self, TaskError> {
        let (program, args) = command.split_first().ok_or(TaskError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir,
        })
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, TaskError> {
        Self::new(&config.command, config.working_dir.as_ref().map(PathBuf::from))
    }
}

#[async_trait]
impl TaskRunner for CommandTaskRunner {
    async fn run_due(&self) -> Result<String, TaskError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!(program = %self.program, args = ?self.args, "Running due scheduled tasks");
        let output = command.output().await.map_err(|source| TaskError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "scheduler stderr");
        }
        // A failing run still reports what it printed.
        if !output.status.success() {
            warn!(status = %output.status, "scheduler command exited unsuccessfully");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner(command: &[&str]) -> CommandTaskRunner {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        CommandTaskRunner::new(&command, None).unwrap()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let output = runner(&["sh", "-c", "echo 'No scheduled commands are ready to run.'"])
            .run_due()
            .await
            .unwrap();
        assert_eq!(output, "No scheduled commands are ready to run.\n");
    }

    #[tokio::test]
    async fn non_zero_exit_still_returns_output() {
        let output = runner(&["sh", "-c", "echo partial; echo boom >&2; exit 3"])
            .run_due()
            .await
            .unwrap();
        assert_eq!(output, "partial\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = runner(&["/nonexistent/scheduler-binary"])
            .run_due()
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Spawn { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandTaskRunner::new(&[], None),
            Err(TaskError::EmptyCommand)
        ));
    }
}
