use std::{
    process::{Child, ExitStatus},
    time::Duration,
};

use anyhow::{self, bail, Context};
use tracing::warn;

use super::{create_process, ProcessOutput};

/// A child process, killed on drop.
#[derive(Debug)]
pub struct LimitedProcess {
    child: Child,
    cleaned_up: bool,
}

impl LimitedProcess {
    /// Always fails: cgroups only exist on Linux.
    pub fn launch(
        _command: &str,
        _args: &[String],
        _output: ProcessOutput,
        _max_memory: i64,
        _cpus: &str,
    ) -> anyhow::Result<LimitedProcess> {
        bail!("cgroups only available on linux")
    }

    /// Launch `command` without any limit.
    pub fn launch_without_container(
        command: &str,
        args: &[String],
        output: ProcessOutput,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(command, args, output).context("could not create process")?;
        Ok(LimitedProcess {
            child,
            cleaned_up: false,
        })
    }

    /// Always false.
    pub fn is_contained(&self) -> bool {
        false
    }

    /// Exit status, if the process has exited.
    pub fn try_wait(&mut self) -> anyhow::Result<Option<ExitStatus>> {
        let status = self.child.try_wait().context("could not poll process")?;
        if status.is_some() {
            self.cleaned_up = true;
        }
        Ok(status)
    }

    /// Kill the process.
    pub fn try_kill(&mut self, _max_duration: Duration) -> anyhow::Result<()> {
        self.child.kill().context("could not kill process")?;
        let _ = self.child.wait();
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(Duration::from_secs(1)) {
                warn!("could not kill process {} on drop: {e:#}", self.child.id());
            }
        }
    }
}
