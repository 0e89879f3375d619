//! Child processes under resource limits.
//!
//! On Linux a [`LimitedProcess`] lives in its own cgroup (v2) with a memory hard limit, a pid
//! limit and a CPU set. Elsewhere only [`LimitedProcess::launch_without_container`] works.

#[cfg(target_os = "linux")]
mod cgroup_manager_linux;

#[cfg(target_os = "linux")]
pub use cgroup_manager_linux::*;

#[cfg(not(target_os = "linux"))]
mod cgroup_manager_stub;

#[cfg(not(target_os = "linux"))]
pub use cgroup_manager_stub::*;

use std::{
    fs::File,
    process::{Child, Stdio},
};

use anyhow::Context;

/// Where the output of a process goes.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Receives stdout.
    pub stdout: File,
    /// Receives stderr.
    pub stderr: File,
}

fn create_process(command: &str, args: &[String], output: ProcessOutput) -> anyhow::Result<Child> {
    std::process::Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(output.stdout)
        .stderr(output.stderr)
        .spawn()
        .with_context(|| format!("command '{command}' not found"))
}
