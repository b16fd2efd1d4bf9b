use std::{collections::HashMap, path::PathBuf, process::Stdio, time::Duration};

use tokio::{process::Command, time::timeout};
use tracing::debug;

use crate::{
    config::{Invocation, Settings},
    error::SweepError,
};

/// Runs one benchmark invocation and returns what it printed on stdout
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, SweepError>;
}

/// Runs the driver executable as a child process, one per invocation
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl ProcessDriver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            env: HashMap::new(),
            timeout: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            program: settings.driver.clone(),
            prefix_args: settings.driver_args.clone().unwrap_or_default(),
            env: settings.env.clone().unwrap_or_default(),
            timeout: settings.timeout(),
        }
    }

    /// `-n<sketch> -m <metric> -s <size>`, after any configured prefix
    pub fn args(&self, invocation: &Invocation) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend([
            format!("-n{}", invocation.sketch),
            "-m".to_owned(),
            invocation.metric.clone(),
            "-s".to_owned(),
            invocation.memory_size.clone(),
        ]);
        args
    }

    pub fn command_line(&self, invocation: &Invocation) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args(invocation));
        parts.join(" ")
    }
}

#[async_trait::async_trait]
impl Driver for ProcessDriver {
    async fn invoke(&self, invocation: &Invocation) -> Result<String, SweepError> {
        debug!("Running {}", self.command_line(invocation));
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(invocation))
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| SweepError::Launch {
            invocation: invocation.clone(),
            source,
        })?;

        // Dropping the future on timeout kills and reaps the child
        let output = match self.timeout {
            Some(after) => timeout(after, child.wait_with_output())
                .await
                .map_err(|_| SweepError::Timeout {
                    invocation: invocation.clone(),
                    after,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| SweepError::Wait {
            invocation: invocation.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.is_empty() {
            debug!("Driver stderr for {invocation}: {}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(SweepError::Exit {
                invocation: invocation.clone(),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_name_is_glued_to_its_flag() {
        let driver = ProcessDriver::new("./driver");
        let invocation = Invocation::new("CM", "ARE", "64KB");
        assert_eq!(
            driver.args(&invocation),
            vec!["-nCM", "-m", "ARE", "-s", "64KB"]
        );
        assert_eq!(driver.command_line(&invocation), "./driver -nCM -m ARE -s 64KB");
    }

    #[test]
    fn settings_prefix_args_come_first() {
        let settings = Settings {
            driver: PathBuf::from("/bin/sh"),
            driver_args: Some(vec!["driver.sh".to_owned()]),
            timeout_secs: Some(5),
            ..Default::default()
        };
        let driver = ProcessDriver::from_settings(&settings);
        assert_eq!(driver.timeout, Some(Duration::from_secs(5)));
        assert_eq!(
            driver.args(&Invocation::new("CU", "AAE", "1MB"))[..2],
            ["driver.sh".to_owned(), "-nCU".to_owned()]
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let driver = ProcessDriver::new("/nonexistent/driver");
        let err = driver
            .invoke(&Invocation::new("CM", "ARE", "64KB"))
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Launch { .. }));
    }
}
