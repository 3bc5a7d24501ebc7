//! External build-tool invocation
//!
//! Every configure script, make, cmake or meson call goes through the
//! [`ToolInvoker`] trait so the engine never cares which tool it is
//! driving, and tests can substitute a recording implementation.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} terminated by signal")]
    Terminated { program: String },
}

/// One external tool invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-ish rendering for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run to completion and return the exit code. Output streams to the
    /// parent's stdio; capture policy is not the engine's concern.
    async fn invoke(&self, invocation: &Invocation) -> Result<i32, InvokeError>;
}

/// Real implementation over [`tokio::process`].
pub struct ProcessInvoker;

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<i32, InvokeError> {
        debug!("running: {} (cwd {})", invocation.command_line(), invocation.cwd.display());
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null());
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        let status = command.status().await.map_err(|source| InvokeError::Spawn {
            program: invocation.program.display().to_string(),
            source,
        })?;
        status.code().ok_or_else(|| InvokeError::Terminated {
            program: invocation.program.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_includes_args() {
        let inv = Invocation::new("make", "/tmp")
            .arg("-C")
            .arg("build")
            .arg("-j8");
        assert_eq!(inv.command_line(), "make -C build -j8");
    }

    #[tokio::test]
    async fn invoker_reports_exit_code() {
        let inv = Invocation::new("sh", std::env::temp_dir())
            .arg("-c")
            .arg("exit 3");
        let code = ProcessInvoker.invoke(&inv).await.unwrap();
        assert_eq!(code, 3);
    }
}
