//! Handlers backed by an executable.
//!
//! Per invocation the program is spawned with a JSON request on stdin and
//! must print a JSON response on stdout:
//!
//! ```text
//! stdin:  {"method":"GET","url":"https://host/path","headers":{..},"body":"<base64>"}
//! stdout: {"statusCode":200,"headers":{..},"body":"<base64>"}
//! ```
//!
//! Empty stdout means "no response" and yields the default response.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::handler::{Export, Handler, HandlerLoader};
use crate::http::{Request, Response};

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    method: &'a str,
    url: &'a str,
    headers: BTreeMap<&'a str, String>,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    #[serde(default = "default_status")]
    status_code: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
}

fn default_status() -> u16 {
    200
}

/// Loads handlers from executable files, relative to an optional root.
#[derive(Debug, Clone, Default)]
pub struct CommandLoader {
    root: Option<PathBuf>,
}

impl CommandLoader {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, specifier: &str) -> PathBuf {
        let spec = specifier.strip_prefix("file://").unwrap_or(specifier);
        match &self.root {
            Some(root) if Path::new(spec).is_relative() => root.join(spec),
            _ => PathBuf::from(spec),
        }
    }
}

#[async_trait]
impl HandlerLoader for CommandLoader {
    async fn load(&self, specifier: &str) -> RuntimeResult<Export> {
        let path = self.resolve(specifier);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| RuntimeError::HandlerLoad {
                message: format!("cannot load module {}: {}", path.display(), e),
            })?;

        if !metadata.is_file() {
            return Ok(Export::NotCallable("a directory".to_string()));
        }
        if !is_executable(&metadata) {
            return Ok(Export::NotCallable("a non-executable file".to_string()));
        }

        debug!(path = %path.display(), "resolved command handler");
        Ok(Export::Callable(Arc::new(CommandHandler { program: path })))
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Runs one program per invocation.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: PathBuf,
}

impl CommandHandler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Handler for CommandHandler {
    async fn call(&self, request: Request) -> anyhow::Result<Option<Response>> {
        let headers = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let input = serde_json::to_vec(&CommandRequest {
            method: request.method.as_str(),
            url: request.url.as_str(),
            headers,
            body: STANDARD.encode(&request.body),
        })?;

        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning handler {}", self.program.display()))?;

        // Feed stdin while stdout is drained so neither pipe can fill up.
        let stdin = child.stdin.take();
        let write_request = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&input).await {
                // The handler may exit without reading its input.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (written, output) = tokio::join!(write_request, child.wait_with_output());
        let output = output.context("waiting for handler")?;
        written.context("writing request to handler")?;
        if !output.status.success() {
            bail!("handler {} exited with {}", self.program.display(), output.status);
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let parsed: CommandResponse =
            serde_json::from_slice(&output.stdout).context("parsing handler output")?;

        let mut response = Response::new(
            StatusCode::from_u16(parsed.status_code).context("invalid status code")?,
        );
        for (name, value) in parsed.headers {
            response.headers.append(
                HeaderName::from_bytes(name.as_bytes()).context("invalid header name")?,
                HeaderValue::from_str(&value).context("invalid header value")?,
            );
        }
        response.body = STANDARD
            .decode(parsed.body)
            .context("handler body is not base64")?
            .into();

        Ok(Some(response))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn request() -> Request {
        crate::wire::WireRequest::parse(r#"{"method":"GET","path":"/"}"#)
            .unwrap()
            .into_request()
            .unwrap()
    }

    #[tokio::test]
    async fn test_loader_rejects_non_executable() {
        let temp = TempDir::new().unwrap();
        script(temp.path(), "plain", "true", 0o644);

        let loader = CommandLoader::new(Some(temp.path().to_path_buf()));
        assert!(matches!(
            loader.load("plain").await.unwrap(),
            Export::NotCallable(_)
        ));
        assert!(matches!(
            loader.load("missing").await,
            Err(RuntimeError::HandlerLoad { .. })
        ));
    }

    #[tokio::test]
    async fn test_command_handler_round_trip() {
        let temp = TempDir::new().unwrap();
        script(
            temp.path(),
            "hello",
            r#"cat > /dev/null; printf '{"statusCode":201,"headers":{"x-a":"1"},"body":"aGk="}'"#,
            0o755,
        );

        let loader = CommandLoader::new(Some(temp.path().to_path_buf()));
        let Export::Callable(handler) = loader.load("hello").await.unwrap() else {
            panic!("expected callable export");
        };

        let response = handler.call(request()).await.unwrap().unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers["x-a"], "1");
        assert_eq!(response.body.collect().await.unwrap(), "hi".as_bytes());
    }

    #[tokio::test]
    async fn test_command_handler_streams_large_body() {
        let temp = TempDir::new().unwrap();
        // Echoes the request back; the request fields double as a response.
        let echo = script(temp.path(), "echo", "cat", 0o755);

        let body = vec![b'x'; 1 << 20];
        let mut req = request();
        req.body = body.clone().into();

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            CommandHandler::new(echo).call(req),
        )
        .await
        .expect("handler stalled on a large body")
        .unwrap()
        .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.collect().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_command_handler_ignoring_stdin_still_responds() {
        let temp = TempDir::new().unwrap();
        let eager = script(
            temp.path(),
            "eager",
            r#"printf '{"statusCode":204}'"#,
            0o755,
        );

        let mut req = request();
        req.body = vec![b'y'; 1 << 20].into();

        let response = CommandHandler::new(eager).call(req).await.unwrap().unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_command_handler_empty_output_and_failure() {
        let temp = TempDir::new().unwrap();
        let quiet = script(temp.path(), "quiet", "cat > /dev/null", 0o755);
        let failing = script(temp.path(), "failing", "cat > /dev/null; exit 3", 0o755);

        assert!(CommandHandler::new(quiet).call(request()).await.unwrap().is_none());
        assert!(CommandHandler::new(failing).call(request()).await.is_err());
    }
}
