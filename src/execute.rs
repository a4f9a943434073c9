//! External filter execution.
//!
//! Filters (highlighters, document converters) run through `sh -c` inside a
//! throwaway working directory. Content is fed on stdin, stdout is the
//! rendered result, stderr is kept for the error report.

use anyhow::Result;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::error::FilterError;

/// Environment overlay handed to a filter, e.g. `filename`, `type`, `scheme`.
pub type FilterEnv<'a> = [(&'a str, &'a str)];

/// Runs `command` with `content` on stdin and returns its stdout.
///
/// The process inherits the current environment plus `env`, and runs in a
/// fresh temporary directory that is removed when the call returns,
/// whatever the outcome.
///
/// # Arguments
///
/// * `content`: Bytes piped to the process
/// * `command`: Shell command line
/// * `env`: Additional environment variables
/// * `timeout`: Kill the process if it runs longer than this
///
/// # Errors
///
/// Returns `FilterError` if the sandbox cannot be created, the process
/// cannot be spawned, exits unsuccessfully or exceeds `timeout`.
///
/// # Examples
///
/// ```no_run
/// use gitin::execute::run_filter;
///
/// let html = run_filter(b"# Title", "pandoc --from=$type --to=html", &[("type", "markdown")], None)?;
/// # Ok::<(), gitin::error::FilterError>(())
/// ```
pub fn run_filter(
    content: &[u8],
    command: &str,
    env: &FilterEnv<'_>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, FilterError> {
    let overlay = describe_env(env);
    debug!(env = %overlay, command, "running filter");

    let sandbox = tempfile::Builder::new()
        .prefix("gitin-")
        .tempdir()
        .map_err(|source| FilterError::Sandbox {
            command: command.to_string(),
            source,
        })?;

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(sandbox.path())
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| FilterError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr) = thread::scope(|scope| {
        scope.spawn(move || {
            if let Some(mut stdin) = stdin {
                // A filter may exit without consuming all input.
                let _ = stdin.write_all(content);
            }
        });
        let out = scope.spawn(move || drain(stdout));
        let err = scope.spawn(move || drain(stderr));

        let status = wait(&mut child, timeout);
        let out = out
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdout reader panicked")));
        let err = err
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stderr reader panicked")));
        (status, out, err)
    });

    let output_error = |source| FilterError::Output {
        command: command.to_string(),
        source,
    };

    let status = status.map_err(output_error)?;
    let stdout = stdout.map_err(output_error)?;
    let stderr = stderr.unwrap_or_default();

    match status {
        None => Err(FilterError::Timeout {
            command: command.to_string(),
            timeout: timeout.unwrap_or_default(),
        }),
        Some(status) if !status.success() => Err(FilterError::Exit {
            env: overlay,
            command: command.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim_end().to_string(),
        }),
        Some(_) => Ok(stdout),
    }
}

/// Runs a filter through the cache store.
///
/// On a hit the cached output is served without spawning anything. On a
/// miss the filter runs and its output is written to `dest` and cached.
/// A failing filter writes nothing to `dest` and leaves no cache entry.
///
/// # Errors
///
/// Returns error if the filter fails or `dest`/the cache cannot be written.
pub fn execute_cached<W: Write + ?Sized>(
    cache: &CacheStore,
    dest: &mut W,
    key: &CacheKey,
    content: &[u8],
    command: &str,
    env: &FilterEnv<'_>,
    timeout: Option<Duration>,
) -> Result<()> {
    cache.cached_render(dest, key, |w| {
        let output = run_filter(content, command, env, timeout)?;
        w.write_all(&output)?;
        Ok(())
    })
}

fn describe_env(env: &FilterEnv<'_>) -> String {
    env.iter().map(|(k, v)| format!("{}={} ", k, v)).collect()
}

fn drain(pipe: Option<impl Read>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

/// Waits for the child, returning `None` if it had to be killed.
fn wait(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(10));
    }
}
