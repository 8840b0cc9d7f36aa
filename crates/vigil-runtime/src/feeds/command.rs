//! Backend CLI plumbing shared by the command-driven feeds.

use std::process::Stdio;

use async_stream::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use vigil_core::ServiceObservation;

use super::{FeedError, FeedStream};

/// Turns one output line into an observation, or `None` for lines that do
/// not describe a relevant transition.
pub(super) type LineParser = fn(&str, &str) -> Result<Option<ServiceObservation>, FeedError>;

/// Run `program` to completion and return its stdout.
pub(super) async fn capture(program: &'static str, args: &[String]) -> Result<String, FeedError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| FeedError::Spawn { program, source })?;

    if !output.status.success() {
        return Err(FeedError::CommandFailed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| FeedError::Parse(e.to_string()))
}

/// Spawn `program` and stream its stdout line by line through `parse`.
///
/// The child is killed when the stream is dropped. Lines that fail to parse
/// are logged and skipped; end of output ends the stream with
/// [`FeedError::Closed`].
pub(super) fn line_stream(
    program: &'static str,
    args: &[String],
    host: String,
    parse: LineParser,
) -> Result<FeedStream, FeedError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| FeedError::Spawn { program, source })?;

    let stdout = child.stdout.take().ok_or(FeedError::Closed)?;
    let mut lines = BufReader::new(stdout).lines();

    debug!(program, %host, "Event feed process started");

    Ok(Box::pin(stream! {
        // Moved in so the process lives exactly as long as the stream.
        let mut child = child;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse(&host, line) {
                        Ok(Some(obs)) => yield Ok(obs),
                        Ok(None) => {}
                        Err(e) => warn!(program, %host, error = %e, "Skipping unparseable event"),
                    }
                }
                Ok(None) => {
                    let status = child.wait().await;
                    debug!(program, %host, ?status, "Event feed process exited");
                    yield Err(FeedError::Closed);
                    break;
                }
                Err(e) => {
                    yield Err(FeedError::Io(e));
                    break;
                }
            }
        }
    }))
}
