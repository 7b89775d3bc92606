//! Dev-server port discovery.
//!
//! A spawned dev server reports its port through whichever channel it
//! supports:
//!
//! - a `PORT=<n>` (or bare `<n>`) line on stdout
//! - the port number written to the file named by `RELAY_PORT_FILE`
//!
//! The first of {stdout, port file, child exit} decides the outcome; the
//! other signals are cancelled.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::debug;

pub const ENV_PORT_FILE: &str = "RELAY_PORT_FILE";

const PORT_FILE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum PortDiscoveryError {
    /// The dev server exited before reporting a port.
    #[error("dev server exited before reporting a port (code: {code:?}, signal: {signal:?})")]
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("dev server did not report a port within {0:?}")]
    Timeout(Duration),

    #[error("port discovery failed at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// Parse a port announcement line.
pub fn parse_port_line(line: &str) -> Option<u16> {
    let line = line.trim();
    let value = line.strip_prefix("PORT=").unwrap_or(line);
    value.parse::<u16>().ok().filter(|p| *p != 0)
}

/// Forward `output` line by line to stdout, sending the first port announcement to `tx`.
pub fn watch_stdout<R>(output: R, tx: oneshot::Sender<u16>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        forward_output(output, tokio::io::stdout(), tx).await;
    })
}

/// Copy `output` to `sink` until EOF, holding back the first port line.
///
/// Lines are raw bytes; only the port parse is lossy. The reader keeps
/// draining after the port is found so the child never writes to a closed pipe.
pub async fn forward_output<R, W>(output: R, mut sink: W, tx: oneshot::Sender<u16>) -> W
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tx = Some(tx);
    let mut reader = BufReader::new(output);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "stopped reading dev server output");
                break;
            }
        }

        if tx.is_some() {
            if let Some(port) = parse_port_line(&String::from_utf8_lossy(&line)) {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(port);
                }
                continue;
            }
        }

        if sink.write_all(&line).await.is_ok() {
            let _ = sink.flush().await;
        }
    }

    sink
}

/// Poll `path` until it holds a port number. A missing file is not an error.
pub async fn poll_port_file(path: &Path, interval: Duration) -> Result<u16, PortDiscoveryError> {
    loop {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                if let Some(port) = parse_port_line(&content) {
                    return Ok(port);
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PortDiscoveryError::Io {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
        tokio::time::sleep(interval).await;
    }
}

/// Wait for the first of: a port on `stdout_port`, a port in `port_file`, or `child` exiting.
///
/// The port file is removed once the race is decided.
pub async fn discover_port(
    child: &mut Child,
    stdout_port: oneshot::Receiver<u16>,
    port_file: &Path,
    timeout: Option<Duration>,
) -> Result<u16, PortDiscoveryError> {
    let race = async {
        let from_pipe = async {
            match stdout_port.await {
                Ok(port) => port,
                // Stdout closed without a port; leave the other signals to decide.
                Err(_) => std::future::pending().await,
            }
        };

        tokio::select! {
            port = from_pipe => {
                debug!(port, "port reported on stdout");
                Ok(port)
            }
            port = poll_port_file(port_file, PORT_FILE_POLL) => {
                debug!(port = ?port.as_ref().ok(), "port reported in port file");
                port
            }
            status = child.wait() => {
                let status = status.map_err(|e| PortDiscoveryError::Io {
                    path: port_file.to_path_buf(),
                    message: e.to_string(),
                })?;
                Err(PortDiscoveryError::Exited {
                    code: status.code(),
                    signal: exit_signal(&status),
                })
            }
        }
    };

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, race)
            .await
            .unwrap_or(Err(PortDiscoveryError::Timeout(limit))),
        None => race.await,
    };

    match tokio::fs::remove_file(port_file).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!(error = %e, "could not remove port file"),
    }

    result
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
