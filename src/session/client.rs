use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        InitializeRequestParam, RawContent,
    },
    service::RunningService,
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BenchConfig;
use crate::schemas::ImageData;
use crate::session::{resolve_capabilities, CapabilityProfile, InvocationResult, SessionError, Tool};

type McpService = RunningService<RoleClient, InitializeRequestParam>;

/// Time allowed for a graceful transport shutdown before the subprocess is
/// force-terminated.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(3000);

/// How to start one tool provider.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// One initialized tool-provider subprocess plus its discovered tool set and
/// capability profile.
///
/// The rmcp service handle sits behind an async mutex held for the duration
/// of each call, so invocations within a session are strictly ordered onto
/// the single-stream transport.
pub struct ProviderSession {
    label: String,
    service: Mutex<Option<McpService>>,
    tools: Vec<Tool>,
    profile: CapabilityProfile,
    tool_timeout: Duration,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl ProviderSession {
    /// Spawns the provider subprocess, performs the handshake and discovers
    /// its tools. The entire attempt is retried up to `config.max_retries`
    /// with `config.retry_delay` between attempts; a failed attempt tears
    /// down any partially started subprocess before the next one.
    pub async fn initialize(
        spec: &ProviderSpec,
        config: &BenchConfig,
    ) -> Result<Arc<Self>, SessionError> {
        let mut last_error = None;
        for attempt in 1..=config.max_retries {
            info!(
                "Initializing {} (attempt {attempt}/{}): {} {}",
                spec.name,
                config.max_retries,
                spec.command,
                spec.args.join(" ")
            );
            // Dropping a partially constructed service kills its child
            // transport, so an early return here leaves nothing running.
            match Self::try_connect(spec).await {
                Ok((service, tools)) => {
                    let session = Self::assemble(spec, config, service, tools);
                    session.clone().spawn_shutdown_watchdog();
                    return Ok(session);
                }
                Err(error) => {
                    warn!("{} initialization attempt {attempt} failed: {error}", spec.name);
                    last_error = Some(error);
                    if attempt < config.max_retries {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SessionError::Initialization {
            provider: spec.name.clone(),
            details: "no initialization attempts were made".into(),
        }))
    }

    async fn try_connect(spec: &ProviderSpec) -> Result<(McpService, Vec<Tool>), SessionError> {
        let transport =
            TokioChildProcess::new(build_command(&spec.command, &spec.args))?;

        let client_info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "mcp-webbench".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
        };

        let service = client_info.serve(transport).await.map_err(|e| {
            SessionError::Initialization {
                provider: spec.name.clone(),
                details: e.to_string(),
            }
        })?;

        let discovered = service.list_all_tools().await.map_err(|e| {
            SessionError::Initialization {
                provider: spec.name.clone(),
                details: e.to_string(),
            }
        })?;

        if discovered.is_empty() {
            // The service (and its subprocess) is torn down on drop.
            return Err(SessionError::NoToolsDiscovered {
                provider: spec.name.clone(),
            });
        }

        let tools = discovered
            .into_iter()
            .map(|tool| {
                Tool::new(
                    tool.name.to_string(),
                    tool.description
                        .as_deref()
                        .unwrap_or_default()
                        .to_string(),
                    Value::Object((*tool.input_schema).clone()),
                )
            })
            .collect();

        Ok((service, tools))
    }

    fn assemble(
        spec: &ProviderSpec,
        config: &BenchConfig,
        service: McpService,
        tools: Vec<Tool>,
    ) -> Arc<Self> {
        let tool_names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let profile = resolve_capabilities(&spec.name, &tool_names);
        if profile.is_empty() {
            debug!("{}: no capability family matched, generic tiers only", spec.name);
        } else {
            info!(
                "{}: resolved capabilities (context: {:?}, navigate: {:?})",
                spec.name, profile.context_tools, profile.navigate_tool
            );
        }

        let tool_timeout = if is_slow_provider(&spec.name, &tool_names) {
            config.slow_provider_timeout
        } else {
            config.default_tool_timeout
        };

        info!("{} initialized with {} tools", spec.name, tools.len());
        Arc::new(Self {
            label: spec.name.clone(),
            service: Mutex::new(Some(service)),
            tools,
            profile,
            tool_timeout,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Per-session lifecycle owner replacing ambient process signal handlers:
    /// one watchdog per session closes it on interrupt/termination, and is
    /// retired (token cancelled) by a normal `close`.
    fn spawn_shutdown_watchdog(self: Arc<Self>) {
        let token = self.shutdown.clone();
        let session = Arc::downgrade(&self);
        let _ = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = wait_for_termination_signal() => {
                    if let Some(session) = session.upgrade() {
                        warn!("{}: termination signal, emergency cleanup", session.label);
                        session.close().await;
                    }
                }
            }
        });
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The cached discovered tool set; pure read after initialization.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// First tool that can evaluate a script in the page, if any.
    pub fn evaluation_tool(&self) -> Option<&Tool> {
        self.tools.iter().find(|t| {
            let name = t.name.to_lowercase();
            name.contains("evaluate") || name.contains("exec") || name.contains("script")
        })
    }

    pub fn capability_profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends one tool call, racing it against the per-session timeout.
    /// Failures of any kind come back as a failure result, never an error:
    /// a lost invocation must not end the session.
    pub async fn invoke(&self, name: &str, args: Value) -> InvocationResult {
        self.invoke_with_timeout(name, args, self.tool_timeout).await
    }

    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        args: Value,
        timeout: Duration,
    ) -> InvocationResult {
        let args = self.remap_navigation_args(name, args);

        let guard = self.service.lock().await;
        let Some(service) = guard.as_ref() else {
            return InvocationResult::failure("Client not initialized");
        };

        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: args.as_object().cloned(),
        };

        let started = Instant::now();
        match tokio::time::timeout(timeout, service.call_tool(request)).await {
            // The loser of the race is dropped; the transport stays usable.
            Err(_) => InvocationResult::failure(format!(
                "Tool call '{name}' timed out after {}ms",
                timeout.as_millis()
            )),
            Ok(Err(error)) => InvocationResult::failure(error.to_string()),
            Ok(Ok(result)) => parse_call_result(result).with_duration(started.elapsed()),
        }
    }

    /// Providers disagree on the name of the navigation target field. When a
    /// `url` argument is sent to a navigation-like tool whose declared schema
    /// only knows `uri`, the key is renamed before dispatch.
    fn remap_navigation_args(&self, name: &str, mut args: Value) -> Value {
        let Some(obj) = args.as_object_mut() else {
            return args;
        };
        if !obj.contains_key("url") {
            return args;
        }
        let Some(tool) = self.find_tool(name) else {
            return args;
        };
        if needs_uri_remap(name, &tool.parameters) {
            if let Some(url) = obj.remove("url") {
                debug!("Remapping 'url' to 'uri' for tool {name}");
                obj.insert("uri".to_string(), url);
            }
        }
        args
    }

    /// Gracefully shuts the transport down, force-terminating the subprocess
    /// when the graceful path stalls. Idempotent: a second call is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Retire the watchdog so a later signal cannot re-enter cleanup.
        self.shutdown.cancel();

        let service = self.service.lock().await.take();
        let Some(service) = service else {
            return;
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, service.cancel()).await {
            Ok(Ok(_)) => debug!("{}: transport closed", self.label),
            Ok(Err(error)) => warn!("{}: transport shutdown error: {error}", self.label),
            // Timing out drops the in-flight shutdown, and dropping the
            // child-process transport kills the subprocess.
            Err(_) => warn!(
                "{}: graceful shutdown timed out, terminating subprocess",
                self.label
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn stub(label: &str, tools: Vec<Tool>) -> Arc<Self> {
        let tool_names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let profile = resolve_capabilities(label, &tool_names);
        Arc::new(Self {
            label: label.to_string(),
            service: Mutex::new(None),
            tools,
            profile,
            tool_timeout: Duration::from_millis(5000),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }
}

/// True when the tool is navigation-like and its schema declares a `uri`
/// field but no `url` field.
pub fn needs_uri_remap(tool_name: &str, schema: &Value) -> bool {
    let is_navigation = tool_name.contains("navigate")
        || tool_name.contains("goto")
        || tool_name.contains("open");
    if !is_navigation {
        return false;
    }
    let schema = schema.to_string().to_lowercase();
    schema.contains("\"uri\"") && !schema.contains("\"url\"")
}

fn is_slow_provider(label: &str, tool_names: &[String]) -> bool {
    tool_names.iter().any(|n| n.contains("chrome_devtools"))
        || label.to_lowercase().contains("chrome")
}

/// Windows cannot exec `.cmd`/`.ps1` shims (or npm/npx) directly; those go
/// through `cmd.exe /c`.
fn build_command(command: &str, args: &[String]) -> Command {
    let mut cmd = if cfg!(windows)
        && (command == "npx"
            || command == "npm"
            || command.ends_with(".cmd")
            || command.ends_with(".ps1"))
    {
        let mut cmd = Command::new("cmd.exe");
        cmd.arg("/c").arg(command);
        cmd
    } else {
        Command::new(command)
    };
    cmd.args(args);

    // Embedded browser engines refuse to start sandboxed inside containers.
    let no_sandbox = "--no-sandbox --disable-setuid-sandbox";
    cmd.env("CHROME_FLAGS", no_sandbox)
        .env("CHROMIUM_FLAGS", no_sandbox)
        .env("PUPPETEER_ARGS", no_sandbox);
    cmd
}

async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(error) => {
                warn!("Failed to install SIGTERM handler: {error}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn parse_call_result(result: CallToolResult) -> InvocationResult {
    let mut image = None;
    let mut parts = Vec::new();
    for content in result.content {
        match content.raw {
            RawContent::Text(text) => parts.push(text.text),
            RawContent::Image(img) => {
                parts.push("[Image Content]".to_string());
                if image.is_none() {
                    image = Some(ImageData::new(img.data, img.mime_type));
                }
            }
            other => parts.push(
                serde_json::to_string(&other)
                    .unwrap_or_else(|_| "[Unsupported Content]".to_string()),
            ),
        }
    }

    let is_error = result.is_error.unwrap_or(false);
    let message = parts.join("\n");
    let message = if message.is_empty() {
        if is_error {
            "Tool execution failed".to_string()
        } else {
            "Tool executed".to_string()
        }
    } else {
        message
    };

    let result = if is_error {
        InvocationResult::failure(message)
    } else {
        InvocationResult::success(message)
    };
    result.with_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn navigation_tool(schema: Value) -> Tool {
        Tool::new("browser_navigate", "Navigate to a URL", schema)
    }

    #[test]
    fn remaps_url_to_uri_only_when_schema_demands_it() {
        let uri_schema = json!({
            "type": "object",
            "properties": { "uri": { "type": "string" } },
            "required": ["uri"]
        });
        let url_schema = json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        });

        assert!(needs_uri_remap("browser_navigate", &uri_schema));
        assert!(!needs_uri_remap("browser_navigate", &url_schema));
        // Non-navigation tools are never rewritten.
        assert!(!needs_uri_remap("browser_click", &uri_schema));
    }

    #[tokio::test]
    async fn session_applies_uri_remap_before_dispatch() {
        let schema = json!({
            "type": "object",
            "properties": { "uri": { "type": "string" } }
        });
        let session = ProviderSession::stub("Test", vec![navigation_tool(schema)]);

        let args = session
            .remap_navigation_args("browser_navigate", json!({ "url": "http://localhost" }));
        assert_eq!(args, json!({ "uri": "http://localhost" }));
    }

    #[tokio::test]
    async fn invoke_on_closed_session_is_a_failure_result() {
        let session = ProviderSession::stub("Test", vec![]);
        let result = session.invoke("anything", json!({})).await;

        assert!(!result.success);
        assert!(result.message.contains("not initialized"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = ProviderSession::stub("Test", vec![]);
        assert!(!session.is_closed());

        session.close().await;
        assert!(session.is_closed());

        // Second close must be a no-op, not a second termination.
        session.close().await;
        assert!(session.is_closed());
    }

    #[test]
    fn slow_provider_detection_is_family_based() {
        assert!(is_slow_provider(
            "MCP-Chrome-DevTools",
            &["chrome_devtools_navigate".to_string()]
        ));
        assert!(!is_slow_provider("MCP-Playwright", &["playwright_navigate".to_string()]));
    }
}
