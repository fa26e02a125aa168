use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::BenchConfig;
use crate::context::{ContextExtractor, PageContext};
use crate::guard::{is_interaction, ActionGuard};
use crate::llm::ChatModel;
use crate::runner::{classify_outcome, verify_goal, Scenario};
use crate::schemas::{Message, TokenUsage};
use crate::session::{ProviderSession, ProviderSpec, Tool, NAVIGATE_CANDIDATES};
use crate::telemetry::{token_efficiency, Metrics, Telemetry};

/// Tools the model must not drive directly: navigation is issued by the
/// runner, and tab/install plumbing only derails the task.
const NON_ACTIONABLE_TOOLS: &[&str] = &[
    "browser_navigate",
    "navigate",
    "navigate_page",
    "navigate_url",
    "browser_navigate_back",
    "browser_tabs",
    "browser_close",
    "close_page",
    "browser_install",
];

/// Drives every (provider, scenario) pair to a terminal status. One session
/// per provider; scenarios run strictly sequentially within it because the
/// session reuses a single page.
pub struct BenchRunner {
    config: BenchConfig,
    llm: Arc<dyn ChatModel>,
}

/// All mutable state of one scenario run. Dropped once its metrics record
/// has been emitted.
struct ScenarioRun {
    steps: usize,
    usage: TokenUsage,
    llm_duration: Duration,
    tool_duration: Duration,
    context_sizes: Vec<usize>,
    messages: Vec<Message>,
    success: bool,
    last_error: String,
}

impl ScenarioRun {
    fn new(scenario: &Scenario) -> Self {
        Self {
            steps: 0,
            usage: TokenUsage::default(),
            llm_duration: Duration::ZERO,
            tool_duration: Duration::ZERO,
            context_sizes: Vec::new(),
            messages: vec![Message::new_system_message(format!(
                "You are an expert web automation agent. Your goal is: {}. \
                 Respond with \"SUCCESS\" when achieved.",
                scenario.goal
            ))],
            success: false,
            last_error: String::new(),
        }
    }

    fn push_context(&mut self, context: &PageContext) {
        let text = format!("Page State:\n{}\n\nAction?", context.text);
        let message = match &context.screenshot {
            Some(image) => Message::new_human_message_with_image(text, image.clone()),
            None => Message::new_human_message(text),
        };
        self.messages.push(message);
    }

    fn into_metrics(self, adapter: &str, scenario: &Scenario, total: Duration) -> Metrics {
        let total_tokens = self.usage.total_tokens;
        let avg_context_size = if self.context_sizes.is_empty() {
            0
        } else {
            self.context_sizes.iter().sum::<usize>() / self.context_sizes.len()
        };
        Metrics {
            scenario: scenario.name.to_string(),
            adapter: adapter.to_string(),
            success: self.success,
            status: classify_outcome(self.success, &self.last_error),
            steps: self.steps,
            duration_ms: total.as_millis() as u64,
            llm_duration_ms: self.llm_duration.as_millis() as u64,
            tool_duration_ms: self.tool_duration.as_millis() as u64,
            prompt_tokens: self.usage.prompt_tokens,
            completion_tokens: self.usage.completion_tokens,
            token_efficiency: token_efficiency(self.success, total_tokens),
            avg_context_size,
            error: self.last_error,
        }
    }
}

impl BenchRunner {
    pub fn new(config: BenchConfig, llm: Arc<dyn ChatModel>) -> Self {
        Self { config, llm }
    }

    /// Runs every scenario against every provider. Each (provider, scenario)
    /// pair yields exactly one metrics record, session startup death
    /// included.
    pub async fn run(&self, providers: &[ProviderSpec], scenarios: &[Scenario]) -> Telemetry {
        let mut telemetry = Telemetry::new();
        for spec in providers {
            info!("=== Starting adapter: {} ===", spec.name);
            let session = match ProviderSession::initialize(spec, &self.config).await {
                Ok(session) => session,
                Err(initialization_error) => {
                    error!("Failed to initialize {}: {initialization_error}", spec.name);
                    let details = initialization_error.to_string();
                    for scenario in scenarios {
                        telemetry.record(Metrics {
                            scenario: scenario.name.to_string(),
                            adapter: spec.name.clone(),
                            success: false,
                            status: classify_outcome(false, &details),
                            steps: 0,
                            duration_ms: 0,
                            llm_duration_ms: 0,
                            tool_duration_ms: 0,
                            prompt_tokens: 0,
                            completion_tokens: 0,
                            token_efficiency: 0.0,
                            avg_context_size: 0,
                            error: details.clone(),
                        });
                    }
                    continue;
                }
            };

            let actionable = actionable_tools(session.tools());
            for scenario in scenarios {
                let metrics = self.run_scenario(&session, scenario, &actionable).await;
                telemetry.record(metrics);
            }
            session.close().await;
        }
        telemetry
    }

    pub async fn run_scenario(
        &self,
        session: &ProviderSession,
        scenario: &Scenario,
        actionable: &[Tool],
    ) -> Metrics {
        info!(">>> Testing scenario: {} with {}", scenario.name, session.label());
        let started = Instant::now();
        let mut run = ScenarioRun::new(scenario);
        let mut guard = ActionGuard::new();

        if let Some(delay) = self.config.warmup_delay_for(session.label()) {
            tokio::time::sleep(delay).await;
        }

        self.navigate_to_scenario(session, scenario, &mut run, &mut guard)
            .await;

        while run.steps < self.config.max_steps && !run.success {
            let context = self.extract_context(session, &mut run).await;

            // A prior action may already have completed the goal; checking
            // before asking the model saves an inference call.
            if verify_goal(scenario.kind, &context.text) {
                run.success = true;
                break;
            }

            run.steps += 1;
            run.push_context(&context);

            let llm_started = Instant::now();
            let response = match self.llm.generate(&run.messages, actionable).await {
                Ok(response) => response,
                Err(llm_error) => {
                    error!("LLM call failed: {llm_error}");
                    run.last_error = llm_error.to_string();
                    break;
                }
            };
            run.llm_duration += llm_started.elapsed();
            run.usage.add(&response.usage);

            if response.has_tool_calls() {
                let assistant_text = if response.text.is_empty() {
                    "..."
                } else {
                    response.text.as_str()
                };
                run.messages.push(Message::new_ai_message(assistant_text));

                for call in &response.tool_calls {
                    info!("Step {}: {}", run.steps, call.name);
                    let result = match guard.check(&call.name, &call.arguments) {
                        Some(refusal) => {
                            warn!("Step {}: {}", run.steps, refusal.message);
                            refusal
                        }
                        None => {
                            let tool_started = Instant::now();
                            let result =
                                session.invoke(&call.name, call.arguments.clone()).await;
                            run.tool_duration += tool_started.elapsed();
                            guard.record(&call.name, call.arguments.clone());
                            if is_interaction(&call.name) {
                                guard.wait_for_idle(session, &self.config).await;
                            }
                            result
                        }
                    };
                    let prefix = if result.success { "RESULT" } else { "ERROR" };
                    run.messages
                        .push(Message::new_human_message(format!(
                            "{prefix}: {}",
                            result.message
                        )));
                }
            } else if response.text.to_uppercase().contains("SUCCESS") {
                // The model says it is done. Never trust the claim: take a
                // fresh look at the page and re-run the predicate.
                let fresh = self.extract_context(session, &mut run).await;
                if verify_goal(scenario.kind, &fresh.text) {
                    run.success = true;
                } else {
                    run.messages.push(Message::new_ai_message(&response.text));
                    run.messages.push(Message::new_human_message(
                        "Verification failed. The goal does not appear to be met \
                         based on the current page state.",
                    ));
                }
            } else {
                info!("Step {} thinking: {}", run.steps, response.text);
            }
        }

        run.into_metrics(session.label(), scenario, started.elapsed())
    }

    async fn navigate_to_scenario(
        &self,
        session: &ProviderSession,
        scenario: &Scenario,
        run: &mut ScenarioRun,
        guard: &mut ActionGuard,
    ) {
        let Some(navigate) = navigation_tool(session) else {
            warn!("{}: no navigation tool discovered", session.label());
            return;
        };
        let url = scenario.url(&self.config.target_base_url);
        let args = serde_json::json!({ "url": url });

        let tool_started = Instant::now();
        let result = session.invoke(&navigate, args.clone()).await;
        run.tool_duration += tool_started.elapsed();
        guard.record(&navigate, args);
        if !result.success {
            warn!("Initial navigation failed: {}", result.message);
        }
        guard.wait_for_idle(session, &self.config).await;
    }

    async fn extract_context(
        &self,
        session: &ProviderSession,
        run: &mut ScenarioRun,
    ) -> PageContext {
        let extraction_started = Instant::now();
        let context = ContextExtractor::new(session).extract().await;
        run.tool_duration += extraction_started.elapsed();
        run.context_sizes.push(context.len());
        context
    }
}

/// The tool schema handed to the model: everything discovered minus
/// navigation and provider plumbing.
pub fn actionable_tools(tools: &[Tool]) -> Vec<Tool> {
    tools
        .iter()
        .filter(|tool| !NON_ACTIONABLE_TOOLS.contains(&tool.name.as_str()))
        .cloned()
        .collect()
}

fn navigation_tool(session: &ProviderSession) -> Option<String> {
    if let Some(name) = &session.capability_profile().navigate_tool {
        return Some(name.clone());
    }
    NAVIGATE_CANDIDATES
        .iter()
        .find(|name| session.find_tool(name).is_some())
        .map(|name| (*name).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, LLMError};
    use crate::runner::{ScenarioKind, SCENARIOS};
    use crate::schemas::ToolCall;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted model: pops one canned response per call.
    struct ScriptedChat {
        responses: Vec<ChatResponse>,
        calls: AtomicUsize,
    }

    impl ScriptedChat {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn generate(
            &self,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<ChatResponse, LLMError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .get(index.min(self.responses.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn thinking(text: &str) -> ChatResponse {
        ChatResponse {
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn quick_config() -> BenchConfig {
        BenchConfig {
            max_steps: 5,
            settle_delay: Duration::ZERO,
            vibium_warmup_delay: Duration::ZERO,
            vercel_stabilization_delay: Duration::ZERO,
            ..BenchConfig::default()
        }
    }

    fn find_scenario(kind: ScenarioKind) -> &'static Scenario {
        SCENARIOS.iter().find(|s| s.kind == kind).unwrap()
    }

    #[tokio::test]
    async fn step_count_never_exceeds_the_budget() {
        let config = quick_config();
        let max_steps = config.max_steps;
        let llm = ScriptedChat::new(vec![thinking("still looking around")]);
        let runner = BenchRunner::new(config, llm.clone());
        // The stub session fails every invocation, so the goal never passes.
        let session = ProviderSession::stub("Stub", vec![]);

        let metrics = runner
            .run_scenario(&session, find_scenario(ScenarioKind::ShadowDom), &[])
            .await;

        assert!(!metrics.success);
        assert_eq!(metrics.steps, max_steps);
        assert_eq!(llm.call_count(), max_steps);
        assert_eq!(metrics.status, crate::runner::Status::Failed);
    }

    #[tokio::test]
    async fn bare_success_claim_is_not_trusted() {
        // The model claims success on its first turn, but the stub session
        // can never produce a verifiable page, so the claim must not stick.
        let llm = ScriptedChat::new(vec![
            thinking("SUCCESS"),
            thinking("hmm"),
            thinking("hmm"),
            thinking("hmm"),
            thinking("hmm"),
        ]);
        let runner = BenchRunner::new(quick_config(), llm.clone());
        let session = ProviderSession::stub("Stub", vec![]);

        let metrics = runner
            .run_scenario(&session, find_scenario(ScenarioKind::ShadowDom), &[])
            .await;

        assert!(!metrics.success);
        assert!(llm.call_count() > 1, "loop must continue after the claim");
    }

    #[tokio::test]
    async fn scenario_with_failed_llm_records_the_error() {
        struct FailingChat;

        #[async_trait]
        impl ChatModel for FailingChat {
            async fn generate(
                &self,
                _messages: &[Message],
                _tools: &[Tool],
            ) -> Result<ChatResponse, LLMError> {
                Err(LLMError::ContentNotFound)
            }
        }

        let runner = BenchRunner::new(quick_config(), Arc::new(FailingChat));
        let session = ProviderSession::stub("Stub", vec![]);

        let metrics = runner
            .run_scenario(&session, find_scenario(ScenarioKind::DragAndDrop), &[])
            .await;

        assert!(!metrics.success);
        assert!(!metrics.error.is_empty());
        // One step was charged before the call failed, then the loop ended.
        assert_eq!(metrics.steps, 1);
    }

    #[tokio::test]
    async fn repeated_tool_call_is_refused_not_dispatched() {
        let click = ChatResponse {
            text: String::new(),
            tool_calls: vec![ToolCall::new("browser_click", json!({ "selector": "#go" }))],
            ..Default::default()
        };
        let llm = ScriptedChat::new(vec![click.clone(), click]);
        let runner = BenchRunner::new(
            BenchConfig {
                max_steps: 2,
                ..quick_config()
            },
            llm,
        );
        let session = ProviderSession::stub("Stub", vec![]);

        let metrics = runner
            .run_scenario(&session, find_scenario(ScenarioKind::SelfHealing), &[])
            .await;

        // Both turns ran; the second dispatch was refused by the guard and
        // surfaced as a failed result, not as a crash or early exit.
        assert_eq!(metrics.steps, 2);
        assert!(!metrics.success);
    }

    #[test]
    fn actionable_tools_exclude_navigation_and_plumbing() {
        let tools = vec![
            Tool::new("browser_navigate", "", json!({})),
            Tool::new("browser_tabs", "", json!({})),
            Tool::new("browser_click", "", json!({})),
        ];
        let actionable = actionable_tools(&tools);

        assert_eq!(actionable.len(), 1);
        assert_eq!(actionable[0].name, "browser_click");
    }
}
