// src/executor.rs

//! Build execution seam
//!
//! The installer knows nothing about build systems; it hands each ready
//! node to a BuildExecutor together with the prefix the build must
//! populate. The shell implementation runs a configured command with
//! the spec exported through the environment. Tests substitute mock
//! executors to count or fail builds.

use crate::error::{Error, Result};
use crate::spec::Spec;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Performs the build of one concrete spec into `prefix`
///
/// Implementations must be callable from multiple worker threads.
pub trait BuildExecutor: Sync {
    fn build(&self, spec: &Spec, prefix: &Path) -> Result<()>;
}

/// Runs a shell command for each build
///
/// The command sees the node through environment variables: SMELT_SPEC
/// (canonical spec text), SMELT_PREFIX, SMELT_PACKAGE, SMELT_VERSION,
/// SMELT_HASH. The prefix directory is created before the command runs
/// and a receipt with the canonical spec text is written after it
/// succeeds, so even a trivial command produces a valid non-empty
/// prefix.
pub struct ShellExecutor {
    command: Option<String>,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(command: Option<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    fn run_command(&self, command: &str, spec: &Spec, prefix: &Path) -> Result<()> {
        let version = spec
            .version()
            .map(|v| v.to_string())
            .unwrap_or_default();
        let hash = spec.hash.clone().unwrap_or_default();
        debug!("Running build command for {}: {}", spec.name, command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("SMELT_SPEC", spec.to_string())
            .env("SMELT_PREFIX", prefix)
            .env("SMELT_PACKAGE", &spec.name)
            .env("SMELT_VERSION", &version)
            .env("SMELT_HASH", &hash)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Build {
                spec: spec.to_string(),
                message: format!("failed to spawn build command: {}", e),
            })?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let output = child.wait_with_output()?;
                let stderr = String::from_utf8_lossy(&output.stderr);
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    debug!("[{}] {}", spec.name, line);
                }
                if !status.success() {
                    warn!("Build command for {} exited with {}", spec.name, status);
                    return Err(Error::Build {
                        spec: spec.to_string(),
                        message: format!(
                            "build command exited with {}: {}",
                            status,
                            stderr.trim()
                        ),
                    });
                }
                Ok(())
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::Build {
                    spec: spec.to_string(),
                    message: format!(
                        "build command timed out after {}s",
                        self.timeout.as_secs()
                    ),
                })
            }
        }
    }
}

impl BuildExecutor for ShellExecutor {
    fn build(&self, spec: &Spec, prefix: &Path) -> Result<()> {
        std::fs::create_dir_all(prefix)?;
        if let Some(ref command) = self.command {
            self.run_command(command, spec, prefix)?;
        }
        // Receipt makes the prefix self-describing and non-empty
        std::fs::write(prefix.join(".smelt-spec"), format!("{}\n", spec))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Version, VersionConstraint};

    fn concrete_spec() -> Spec {
        let mut spec = Spec::new("zlib");
        spec.versions = VersionConstraint::exact(Version::parse("1.2.13").unwrap());
        spec.hash = Some("cafe".repeat(16));
        spec
    }

    #[test]
    fn test_stage_only_build_writes_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("zlib");
        let executor = ShellExecutor::new(None, Duration::from_secs(5));

        executor.build(&concrete_spec(), &prefix).unwrap();
        let receipt = std::fs::read_to_string(prefix.join(".smelt-spec")).unwrap();
        assert!(receipt.starts_with("zlib@1.2.13"));
    }

    #[test]
    fn test_command_sees_environment() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("zlib");
        let executor = ShellExecutor::new(
            Some("echo \"$SMELT_PACKAGE-$SMELT_VERSION\" > \"$SMELT_PREFIX/out\"".to_string()),
            Duration::from_secs(5),
        );

        executor.build(&concrete_spec(), &prefix).unwrap();
        let out = std::fs::read_to_string(prefix.join("out")).unwrap();
        assert_eq!(out.trim(), "zlib-1.2.13");
    }

    #[test]
    fn test_failing_command_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new(
            Some("echo boom >&2; exit 3".to_string()),
            Duration::from_secs(5),
        );

        let err = executor
            .build(&concrete_spec(), &dir.path().join("zlib"))
            .unwrap_err();
        match err {
            Error::Build { message, .. } => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
