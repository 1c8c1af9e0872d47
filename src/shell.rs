//! Thin wrapper over external commands (nmcli, ping, rrdtool, catt).

use crate::error::{BusboxError, Result};
use std::process::Command;
use tracing::{debug, error, info};

/// Arguments whose following value is a secret.
const SECRET_FLAGS: &[&str] = &["password", "wifi-sec.psk"];
const REDACTED: &str = "********";

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs. A non-zero exit is an error.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let command_line = redacted_command_line(program, args);
        info!("Running: {}", command_line);

        let output = Command::new(program).args(args).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            debug!("`{}` succeeded", command_line);
            return Ok(CommandOutput { stdout, stderr });
        }

        error!("Command failed with code {:?}", output.status.code());
        if !stdout.trim().is_empty() {
            error!("=== STDOUT ===\n{}", stdout);
        }
        if !stderr.trim().is_empty() {
            error!("=== STDERR ===\n{}", stderr);
        }
        Err(BusboxError::Command {
            command: command_line,
            code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

/// Program and arguments joined for logs and errors.
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like [`command_line`], with the value after a password flag masked.
pub fn redacted_command_line(program: &str, args: &[&str]) -> String {
    let masked = args
        .iter()
        .enumerate()
        .map(|(i, arg)| match i.checked_sub(1).map(|prev| args[prev]) {
            Some(flag) if SECRET_FLAGS.contains(&flag) => REDACTED,
            _ => *arg,
        })
        .collect::<Vec<_>>();
    command_line(program, &masked)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every command and fails the ones whose line starts with a
    /// configured prefix.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: Mutex<Vec<String>>,
        pub failing: Vec<String>,
    }

    impl RecordingRunner {
        pub fn failing(prefixes: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: prefixes.iter().map(|p| p.to_string()).collect(),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = command_line(program, args);
            self.calls.lock().unwrap().push(line.clone());
            if self.failing.iter().any(|prefix| line.starts_with(prefix.as_str())) {
                return Err(BusboxError::Command {
                    command: line,
                    code: Some(1),
                    stdout: String::new(),
                    stderr: "simulated failure".to_string(),
                });
            }
            Ok(CommandOutput::default())
        }
    }
}
