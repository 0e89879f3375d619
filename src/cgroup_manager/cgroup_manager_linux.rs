use std::{
    process::{Child, ExitStatus},
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use anyhow::{self, Context};
use cgroups_rs::Cgroup;
use tracing::warn;

use super::{create_process, ProcessOutput};

/// Maximum number of tasks in the cgroup of a run. The JVM needs a few dozen threads.
const MAX_PIDS: i64 = 512;

fn get_current_user_id() -> anyhow::Result<String> {
    let output = std::process::Command::new("id")
        .arg("-u")
        .output()
        .context("Could not launch 'id -u'")?;
    let untrimed_id = std::str::from_utf8(&output.stdout).context("id is not a valid string")?;
    Ok(untrimed_id.trim().to_string())
}

fn get_cgroup_path(user_id: &str, group_name: &str) -> String {
    format!("user.slice/user-{user_id}.slice/user@{user_id}.service/{group_name}")
}

/// Create a cgroup at `path`.
///
/// * `max_memory` - Maximum available memory in Bytes. Non-positive means no restriction.
/// * `max_pids` - Maximum number of PIDS inside the cgroup at any time. Non-positive means no restriction.
/// * `cpus` - which cpus the members can run one ("1-5,7", "1,3,4", ...). Empty string means no restriction.
fn create_cgroup(path: &str, max_memory: i64, max_pids: i64, cpus: &str) -> anyhow::Result<Cgroup> {
    let mut builder = cgroups_rs::cgroup_builder::CgroupBuilder::new(path);
    if max_memory > 0 {
        builder = builder.memory().memory_hard_limit(max_memory).done();
    }
    if max_pids > 0 {
        builder = builder
            .pid()
            .maximum_number_of_processes(cgroups_rs::MaxValue::Value(max_pids))
            .done();
    }
    if !cpus.is_empty() {
        builder = builder.cpu().cpus(cpus.to_string()).done();
    }
    builder
        .build(cgroups_rs::hierarchies::auto())
        .context("could not create cgroup")
}

fn wait_for_process_cleanup(cgroup: &Cgroup, pid: u64, max_duration: Duration) -> anyhow::Result<()> {
    let deadline = Instant::now() + max_duration;
    while cgroup.tasks().iter().any(|cpid| cpid.pid == pid) {
        if Instant::now() > deadline {
            anyhow::bail!("process {pid} still alive after {max_duration:?}");
        }
        std::thread::sleep(std::cmp::min(Duration::from_millis(10), max_duration / 10));
    }
    Ok(())
}

/// A child process, killed (with its whole cgroup) on drop.
#[derive(Debug)]
pub struct LimitedProcess {
    child: Child,
    cgroup: Option<Cgroup>,
    cleaned_up: bool,
}

impl LimitedProcess {
    /// Launch `command` in a fresh cgroup.
    ///
    /// * `max_memory` - memory hard limit in bytes, non-positive for none.
    /// * `cpus` - cpuset (`"0,1"`), empty for none.
    ///
    /// # Errors
    /// When the cgroup cannot be created (cgroups v2 unavailable, no delegation...) or the
    /// process cannot be spawned or moved into it.
    pub fn launch(
        command: &str,
        args: &[String],
        output: ProcessOutput,
        max_memory: i64,
        cpus: &str,
    ) -> anyhow::Result<LimitedProcess> {
        static COUNTER: AtomicU32 = AtomicU32::new(1);
        let user_id = get_current_user_id().context("could not get user id")?;
        let group_name = format!(
            "SWEEP_LAB_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = get_cgroup_path(&user_id, &group_name);
        let group = create_cgroup(&path, max_memory, MAX_PIDS, cpus)?;

        let mut child = match create_process(command, args, output) {
            Ok(child) => child,
            Err(e) => {
                let _ = group.delete();
                return Err(e.context("could not create process in cgroup"));
            }
        };
        let pid = child.id() as u64;
        if let Err(e) = group.add_task_by_tgid(cgroups_rs::CgroupPid { pid }) {
            let kill = child.kill();
            let _ = child.wait();
            let _ = group.delete();
            return Err(anyhow::Error::new(e).context(match kill {
                Ok(()) => "could not add process to cgroup".to_string(),
                Err(err) => format!(
                    "could not add process to cgroup, and process could not be killed either ({err})"
                ),
            }));
        }

        Ok(LimitedProcess {
            child,
            cgroup: Some(group),
            cleaned_up: false,
        })
    }

    /// Launch `command` without any limit.
    ///
    /// # Errors
    /// When the process cannot be spawned.
    pub fn launch_without_container(
        command: &str,
        args: &[String],
        output: ProcessOutput,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(command, args, output).context("could not create process")?;
        Ok(LimitedProcess {
            child,
            cgroup: None,
            cleaned_up: false,
        })
    }

    /// True when the process runs inside a cgroup.
    pub fn is_contained(&self) -> bool {
        self.cgroup.is_some()
    }

    /// Exit status, if the process has exited.
    ///
    /// # Errors
    /// When the status cannot be queried.
    pub fn try_wait(&mut self) -> anyhow::Result<Option<ExitStatus>> {
        let status = self.child.try_wait().context("could not poll process")?;
        if status.is_some() {
            self.release();
        }
        Ok(status)
    }

    /// Kill the process (and everything in its cgroup), waiting up to `max_duration`.
    ///
    /// # Errors
    /// When the kill fails or the cgroup still holds the process after `max_duration`.
    pub fn try_kill(&mut self, max_duration: Duration) -> anyhow::Result<()> {
        match &self.cgroup {
            Some(cgroup) => {
                cgroup.kill().context("could not kill process")?;
                wait_for_process_cleanup(cgroup, self.child.id() as u64, max_duration)
                    .context("process cleanup timed out")?;
            }
            None => self.child.kill().context("could not kill process")?,
        }
        let _ = self.child.wait();
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.cleaned_up = true;
        if let Some(cgroup) = self.cgroup.take() {
            if let Err(e) = cgroup.delete() {
                warn!("Failed to remove cgroup. If this happens a lot, it may slow down the computer. {e}");
            }
        }
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(Duration::from_millis(100)) {
                warn!("could not kill process {} on drop: {e:#}", self.child.id());
            }
        }
    }
}
