use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::info;

use crate::cli::args::DevArgs;
use crate::exit_codes;
use crate::port::{discover_port, watch_stdout, ENV_PORT_FILE};

pub async fn run(args: DevArgs) -> anyhow::Result<i32> {
    let (program, rest) = args
        .command
        .split_first()
        .context("missing dev server command")?;

    let state_dir = tempfile::Builder::new()
        .prefix("relay-dev-")
        .tempdir()
        .context("creating port file directory")?;
    let port_file = state_dir.path().join("port");

    let mut child = Command::new(program)
        .args(rest)
        .env(ENV_PORT_FILE, &port_file)
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {}", program))?;

    let (tx, rx) = oneshot::channel();
    if let Some(stdout) = child.stdout.take() {
        watch_stdout(stdout, tx);
    }

    let timeout = args.timeout.map(Duration::from_secs);
    let port = match discover_port(&mut child, rx, &port_file, timeout).await {
        Ok(port) => port,
        Err(e) => {
            eprintln!("error: {e}");
            let _ = child.kill().await;
            return Ok(exit_codes::STARTUP_FAILED);
        }
    };

    info!(port, "dev server ready");
    eprintln!("Ready on http://localhost:{}", port);

    tokio::select! {
        status = child.wait() => {
            let status = status.context("waiting for dev server")?;
            Ok(if status.success() { exit_codes::SUCCESS } else { exit_codes::COMMAND_FAILED })
        }
        _ = tokio::signal::ctrl_c() => {
            let _ = child.kill().await;
            Ok(exit_codes::SUCCESS)
        }
    }
}
