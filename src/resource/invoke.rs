//! Running executables shipped inside a resource

use super::activation::{self, Handle};
use super::Resource;
use crate::error::{GetpackError, GetpackResult};
use std::env::consts::EXE_SUFFIX;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use tracing::{debug, info};

impl Handle<'_> {
    /// Full path of the declared executable, platform suffix included
    pub fn executable_path(&self) -> GetpackResult<PathBuf> {
        let stem = self
            .resource()
            .executable()
            .ok_or_else(|| GetpackError::NotExecutable(self.name().to_string()))?;
        Ok(self.path().join(format!("{}{}", stem, EXE_SUFFIX)))
    }

    /// Command for the executable with the search path in front of `PATH`
    pub fn command<I, S>(&self, args: I) -> GetpackResult<Command>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(self.executable_path()?);
        command
            .args(args)
            .env("PATH", activation::search_path_env()?);
        Ok(command)
    }

    /// Run the executable to completion and capture its output
    ///
    /// `input` is written to stdin, which is otherwise closed. A non-zero exit
    /// status is an error carrying the captured stderr.
    pub fn run<I, S>(&self, args: I, input: Option<&[u8]>) -> GetpackResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|a| a.as_ref().to_os_string())
            .collect();
        let line = command_line(&self.executable_path()?, &args);

        let mut command = self.command(&args)?;
        command
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!("Running {}", line);
        let mut child = command
            .spawn()
            .map_err(|e| GetpackError::command_failed(&line, e))?;

        let stdin = child.stdin.take();
        let output = thread::scope(|scope| {
            if let (Some(bytes), Some(mut stdin)) = (input, stdin) {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(bytes) {
                        debug!("Writing stdin failed: {}", e);
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| GetpackError::command_failed(&line, e))?;

        if !output.status.success() {
            return Err(GetpackError::CommandExecution {
                command: line,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}

impl Resource {
    /// Activate and build a command for the declared executable
    pub fn command<I, S>(&self, args: I) -> GetpackResult<Command>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.activate()?.command(args)
    }

    /// Activate and run the declared executable
    pub fn run<I, S>(&self, args: I, input: Option<&[u8]>) -> GetpackResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.activate()?.run(args, input)
    }
}

fn command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
