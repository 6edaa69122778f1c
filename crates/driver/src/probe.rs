use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::debug;
use pyexec_shared_types::ProbeConf;
use tokio::process::Command;

/// Arguments for one probe run.
#[derive(Debug, Clone, Copy)]
pub struct ProbeInvocation<'a> {
    pub project_dir: &'a Path,
    pub python_path: &'a str,
    pub project_name: &'a str,
    pub file: &'a Path,
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Completed { status: ExitStatus, stdout: String },
    TimedOut,
}

/// The external tool that reports the environment one Python file needs.
#[derive(Debug, Clone)]
pub struct Probe {
    conf: ProbeConf,
}

impl Probe {
    pub fn new(conf: ProbeConf) -> Probe {
        Probe { conf }
    }

    pub fn mount_point(&self) -> &str {
        &self.conf.mount_point
    }

    fn command(&self, invocation: &ProbeInvocation<'_>, budget: Option<Duration>) -> Command {
        let mut command = match (&self.conf.timeout_wrapper, budget) {
            (Some(wrapper), Some(budget)) => {
                // whole seconds, rounded up so a short remainder is not zero
                let secs = budget.as_secs() + u64::from(budget.subsec_nanos() > 0);
                let mut command = Command::new(wrapper);
                command.arg(secs.to_string()).arg(&self.conf.command);
                command
            }
            _ => Command::new(&self.conf.command),
        };
        command.args(&self.conf.prefix_args);
        command
            .arg("run")
            .arg("--projectdir")
            .arg(invocation.project_dir);
        command
            .arg("--environment")
            .arg(format!("PYTHONPATH={}", invocation.python_path));
        command
            .arg("--exclude")
            .arg(invocation.project_name.to_lowercase());
        command.arg(invocation.file);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command.kill_on_drop(true);
        command
    }

    /// Runs the probe for one file. An `Err` means the process could not be
    /// started or waited on; the child is killed once `budget` runs out.
    pub async fn run(
        &self,
        invocation: &ProbeInvocation<'_>,
        budget: Option<Duration>,
    ) -> std::io::Result<ProbeOutcome> {
        let mut command = self.command(invocation, budget);
        let child = command.spawn()?;
        let output = match budget {
            Some(budget) => match tokio::time::timeout(budget, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => return Ok(ProbeOutcome::TimedOut),
            },
            None => child.wait_with_output().await?,
        };

        if output.status.code() == Some(self.conf.timeout_exit_code) {
            return Ok(ProbeOutcome::TimedOut);
        }
        if !output.stderr.is_empty() {
            debug!(
                "Probe stderr for {:?}: {}",
                invocation.file,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(ProbeOutcome::Completed {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
