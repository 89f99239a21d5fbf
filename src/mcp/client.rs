//! Stdio MCP client.
//!
//! Spawns the server as a child process and exchanges newline-delimited
//! JSON-RPC over its stdin/stdout. One request is in flight at a time, so
//! responses are read inline rather than routed through a pending map.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::types::{
    CallToolResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
    methods,
};
use crate::error::McpError;

/// How long `close()` waits for the child to exit after stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How to launch an MCP server.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Per-request response timeout.
    pub timeout: Duration,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A running MCP server. The child is killed if this is dropped without
/// calling [`StdioClient::close`].
pub struct StdioClient {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    timeout: Duration,
    command: String,
}

impl StdioClient {
    /// Start the server process. No protocol traffic happens yet.
    pub fn spawn(server: &ServerCommand) -> Result<Self, McpError> {
        let command = server.display();
        debug!(command = %command, "Starting MCP subprocess");

        let mut cmd = Command::new(&server.program);
        cmd.args(&server.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &server.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(stderr = %line, "MCP subprocess stderr");
                }
            });
        }

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            timeout: server.timeout,
            command,
        })
    }

    /// Spawn and complete the `initialize` / `initialized` handshake.
    pub async fn connect(server: &ServerCommand) -> Result<Self, McpError> {
        let mut client = Self::spawn(server)?;
        client.initialize().await?;
        Ok(client)
    }

    pub async fn initialize(&mut self) -> Result<Value, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.request(methods::INITIALIZE, Some(params)).await?;
        self.notify(methods::INITIALIZED).await?;

        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(command = %self.command, server = server_name, "MCP session initialized");
        Ok(result)
    }

    /// Invoke a tool. A result flagged `isError` becomes [`McpError::ToolFailed`].
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self.request(methods::TOOLS_CALL, Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(value)?;

        if result.is_error {
            return Err(McpError::ToolFailed {
                name: name.to_string(),
                message: result.text(),
            });
        }
        debug!(tool = name, "MCP tool call succeeded");
        Ok(result)
    }

    /// Close stdin, give the server a moment to exit, then kill it.
    pub async fn close(mut self) -> Result<(), McpError> {
        drop(self.stdin.take());
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(command = %self.command, ?status, "MCP subprocess exited");
            }
            Err(_) => {
                warn!(command = %self.command, "MCP subprocess did not exit, killing");
                self.child.kill().await?;
            }
        }
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        self.write_line(&line).await?;

        let timeout = self.timeout;
        let response = tokio::time::timeout(timeout, self.read_response(id))
            .await
            .map_err(|_| McpError::Timeout(timeout))??;

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&mut self, method: &str) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), McpError> {
        let stdin = self.stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read until the response for `id`. Blank lines, non-JSON output, and
    /// server notifications are skipped.
    async fn read_response(&mut self, id: u64) -> Result<JsonRpcResponse, McpError> {
        loop {
            let line = self.stdout.next_line().await?.ok_or(McpError::Closed)?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.answers(id) => return Ok(response),
                Ok(_) => debug!("Skipping unrelated MCP message"),
                Err(_) => debug!(line = trimmed, "Skipping non-JSON MCP output"),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn scripted(script: &str) -> ServerCommand {
        ServerCommand::new("sh")
            .arg("-c")
            .arg(script)
            .with_timeout(Duration::from_secs(5))
    }

    const INIT_REPLY: &str = r#"read line; echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"stub","version":"0"}}}'; read line;"#;

    #[tokio::test]
    async fn handshake_then_tool_call() {
        let script = format!(
            r#"{INIT_REPLY} read line; echo 'starting up'; echo '{{"jsonrpc":"2.0","method":"notifications/message"}}'; echo '{{"jsonrpc":"2.0","id":2,"result":{{"content":[{{"type":"text","text":"ID: abc"}}]}}}}'; read line"#
        );
        let mut client = StdioClient::connect(&scripted(&script)).await.unwrap();

        let result = client.call_tool("list-emails", json!({"folder": "inbox"})).await.unwrap();
        assert_eq!(result.text(), "ID: abc");

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn tool_error_flag_becomes_tool_failed() {
        let script = format!(
            r#"{INIT_REPLY} read line; echo '{{"jsonrpc":"2.0","id":2,"result":{{"isError":true,"content":[{{"type":"text","text":"boom"}}]}}}}'"#
        );
        let mut client = StdioClient::connect(&scripted(&script)).await.unwrap();

        let err = client.call_tool("read-email", json!({"id": "x"})).await.unwrap_err();
        assert!(matches!(err, McpError::ToolFailed { ref message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let script = format!(
            r#"{INIT_REPLY} read line; echo '{{"jsonrpc":"2.0","id":2,"error":{{"code":-32601,"message":"no such tool"}}}}'"#
        );
        let mut client = StdioClient::connect(&scripted(&script)).await.unwrap();

        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::Rpc { code: -32601, .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = scripted("read line; sleep 5").with_timeout(Duration::from_millis(200));
        let err = StdioClient::connect(&server).await.err().unwrap();
        assert!(matches!(err, McpError::Timeout(_)));
    }

    #[tokio::test]
    async fn exited_server_is_closed() {
        let err = StdioClient::connect(&scripted("read line")).await.err().unwrap();
        assert!(matches!(err, McpError::Closed | McpError::Io(_)));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let server = ServerCommand::new("/definitely/not/a/real/binary");
        let err = StdioClient::spawn(&server).err().unwrap();
        assert!(matches!(err, McpError::Spawn { .. }));
    }
}
