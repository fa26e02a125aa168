use serde_json::{json, Value};
use tracing::debug;

use crate::context::scripts;
use crate::schemas::ImageData;
use crate::session::{InvocationResult, ProviderSession};

/// Minimum number of characters for a tier's output to count as an actual
/// page summary rather than an empty or placeholder response.
pub const MIN_INFORMATIVE_LEN: usize = 100;

const SCREENSHOT_MARKER: &str = "[Screenshot captured]";

/// A page-state summary for one loop turn. Produced fresh every turn and
/// never cached: the page is mutated by the provider between turns.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub text: String,
    pub screenshot: Option<ImageData>,
}

impl PageContext {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Builds a [`PageContext`] through a prioritized chain of strategies,
/// stopping at the first tier that yields an informative summary. The chain
/// always produces something: the terminal tier is a diagnostic string, not
/// an error.
pub struct ContextExtractor<'a> {
    session: &'a ProviderSession,
}

impl<'a> ContextExtractor<'a> {
    pub fn new(session: &'a ProviderSession) -> Self {
        Self { session }
    }

    pub async fn extract(&self) -> PageContext {
        // Opportunistic: a screenshot rides along with whichever text tier
        // wins, and its failure must not block any of them.
        let screenshot = self.capture_screenshot().await;

        let text = self.extract_text().await;
        let text = if screenshot.is_some() {
            format!("{SCREENSHOT_MARKER}\n{text}")
        } else {
            text
        };

        PageContext { text, screenshot }
    }

    async fn extract_text(&self) -> String {
        if let Some(text) = self.try_visual_tools().await {
            return text;
        }
        if let Some(text) = self.try_specialized_script().await {
            return text;
        }
        if let Some(text) = self.try_capability_tools().await {
            return text;
        }
        if let Some(text) = self.try_generic_script().await {
            return text;
        }
        if let Some(text) = self.try_name_heuristics().await {
            return text;
        }
        format!(
            "MCP: No context tool found. Available: {}",
            self.session.tool_names().join(", ")
        )
    }

    async fn capture_screenshot(&self) -> Option<ImageData> {
        let tool = self
            .session
            .tools()
            .iter()
            .find(|t| t.name.to_lowercase().contains("screenshot"))?;
        let result = self.session.invoke(&tool.name, json!({})).await;
        if !result.success {
            debug!("Screenshot capture failed: {}", result.message);
            return None;
        }
        result.image
    }

    /// Tools whose name signals a rich semantic or visual representation,
    /// distinct from a raw screenshot.
    async fn try_visual_tools(&self) -> Option<String> {
        for tool in self.session.tools() {
            let name = tool.name.to_lowercase();
            if name.contains("screenshot") {
                continue;
            }
            if name.contains("snapshot") || name.contains("visual") || name.contains("accessibility")
            {
                let result = self.session.invoke(&tool.name, json!({})).await;
                if is_informative(&result) {
                    return Some(result.message);
                }
            }
        }
        None
    }

    /// Deep traversal for providers whose pages hide content behind shadow
    /// roots; only applies when the capability profile flags the family.
    async fn try_specialized_script(&self) -> Option<String> {
        if !self.session.capability_profile().deep_dom {
            return None;
        }
        self.run_script(scripts::DEEP_DOM_SCAN).await
    }

    async fn try_capability_tools(&self) -> Option<String> {
        let context_tools = self.session.capability_profile().context_tools.clone();
        for name in context_tools {
            let args = default_context_args(&name);
            let result = self.session.invoke(&name, args).await;
            if is_informative(&result) {
                return Some(result.message);
            }
        }
        None
    }

    async fn try_generic_script(&self) -> Option<String> {
        self.run_script(scripts::GENERIC_DOM_SCAN).await
    }

    /// Last heuristic before giving up: any tool that sounds like a read of
    /// page state, skipping anything that would mutate it.
    async fn try_name_heuristics(&self) -> Option<String> {
        for tool in self.session.tools() {
            if !is_page_read_tool(&tool.name) {
                continue;
            }
            let result = self.session.invoke(&tool.name, json!({})).await;
            if is_informative(&result) {
                return Some(result.message);
            }
        }
        None
    }

    async fn run_script(&self, script: &str) -> Option<String> {
        let tool = self.session.evaluation_tool()?;
        let key = script_parameter_key(&tool.parameters);
        let args = json!({ key: script });
        let name = tool.name.clone();
        let result = self.session.invoke(&name, args).await;
        is_informative(&result).then_some(result.message)
    }
}

fn is_informative(result: &InvocationResult) -> bool {
    result.success && result.message.len() > MIN_INFORMATIVE_LEN
}

/// Script-evaluation tools disagree on the name of the payload field; read
/// it off the declared schema instead of assuming.
pub fn script_parameter_key(schema: &Value) -> &'static str {
    const CANDIDATES: [&str; 4] = ["script", "expression", "function", "code"];
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for key in CANDIDATES {
            if properties.contains_key(key) {
                return key;
            }
        }
    }
    let text = schema.to_string();
    for key in CANDIDATES {
        if text.contains(&format!("\"{key}\"")) {
            return key;
        }
    }
    "script"
}

/// Fixed default arguments some context tools require by convention.
fn default_context_args(tool_name: &str) -> Value {
    if tool_name.ends_with("get_visible_text") {
        json!({ "selector": "body" })
    } else {
        json!({})
    }
}

/// Tools whose name suggests a page-state read, excluding anything
/// navigation- or interaction-shaped.
fn is_page_read_tool(name: &str) -> bool {
    let name = name.to_lowercase();
    let reads = name.contains("get") || name.contains("page");
    let mutates = ["navigate", "click", "press", "goto", "tab", "close"]
        .iter()
        .any(|word| name.contains(word));
    reads && !mutates
}
