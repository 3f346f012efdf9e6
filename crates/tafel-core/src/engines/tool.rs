use crate::error::TafelError;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// An external command-line program an engine depends on.
#[derive(Debug, Clone)]
pub struct Tool {
    pub program: String,
    pub engine: &'static str,
    pub hint: &'static str,
}

impl Tool {
    pub fn new(program: impl Into<String>, engine: &'static str, hint: &'static str) -> Self {
        Tool {
            program: program.into(),
            engine,
            hint,
        }
    }

    fn missing(&self) -> TafelError {
        TafelError::MissingDependency {
            engine: self.engine.to_string(),
            tool: self.program.clone(),
            hint: self.hint.to_string(),
        }
    }

    /// Check that the program can be started at all.
    ///
    /// Some tools print their version on stderr and exit non-zero, so any
    /// output counts as present.
    pub fn ensure_available(&self, version_arg: &str) -> Result<(), TafelError> {
        match Command::new(&self.program).arg(version_arg).output() {
            Ok(o) if o.status.success() || !o.stderr.is_empty() || !o.stdout.is_empty() => Ok(()),
            Ok(_) => Err(self.missing()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(self.missing()),
            Err(e) => Err(TafelError::Extraction(format!(
                "{} could not be started: {e}",
                self.program
            ))),
        }
    }

    /// Run the program to completion, failing on a non-zero exit code.
    ///
    /// With a `deadline`, a program still running at that instant is killed
    /// and `DeadlineExceeded` is returned.
    pub fn run<I, S>(&self, args: I, deadline: Option<Instant>) -> Result<Output, TafelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        tracing::debug!(tool = %self.program, "running external tool");
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.missing()
                } else {
                    TafelError::Extraction(format!("{} failed: {e}", self.program))
                }
            })?;

        let output = match deadline {
            None => child.wait_with_output()?,
            Some(deadline) => self.wait_until(child, deadline)?,
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TafelError::ToolFailed {
                tool: self.program.clone(),
                code,
                stderr,
            });
        }

        Ok(output)
    }

    /// Run the program and return its stdout as text.
    pub fn run_stdout<I, S>(&self, args: I, deadline: Option<Instant>) -> Result<String, TafelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(args, deadline)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn wait_until(&self, mut child: Child, deadline: Instant) -> Result<Output, TafelError> {
        // Pipes are drained on their own threads so a chatty program cannot
        // block on a full pipe while we poll.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(tool = %self.program, engine = self.engine, "killed external tool at deadline");
                return Err(TafelError::DeadlineExceeded {
                    engine: self.engine.to_string(),
                    tool: self.program.clone(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Files in `dir` with the given extension, ordered by the numbers embedded
/// in their names (`page-2` before `page-10`).
pub fn numbered_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, TafelError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();
    files.sort_by_cached_key(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (number_key(&name), name)
    });
    Ok(files)
}

fn number_key(name: &str) -> Vec<u64> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
