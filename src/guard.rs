use std::collections::VecDeque;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use crate::config::BenchConfig;
use crate::context::scripts;
use crate::session::{InvocationResult, ProviderSession};

/// How many of the most recent actions an exact repeat is checked against.
/// A pacing tunable: it blocks immediate repeats, not longer oscillations.
const DUPLICATE_WINDOW: usize = 3;

/// Bounded action history; oldest entries are evicted.
const HISTORY_LIMIT: usize = 10;

const READINESS_PROBE_TIMEOUT_MS: u64 = 3000;

/// One dispatched action, kept only for duplicate detection.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub tool: String,
    pub args: Value,
    pub at: Instant,
}

/// Keeps the control loop from hammering the same failing action forever,
/// and paces the loop after page-mutating actions.
#[derive(Default)]
pub struct ActionGuard {
    history: VecDeque<ActionRecord>,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a refusal result when the action is an exact repeat of a
    /// recent interaction-class action. The refusal is dispatched to the
    /// model as an ordinary failed result so it can choose differently.
    pub fn check(&self, name: &str, args: &Value) -> Option<InvocationResult> {
        if !is_interaction(name) {
            return None;
        }
        let repeated = self
            .history
            .iter()
            .rev()
            .take(DUPLICATE_WINDOW)
            .any(|record| record.tool == name && record.args == *args);
        repeated.then(|| {
            InvocationResult::failure(format!(
                "Action refused: '{name}' was just called with identical arguments \
                 and repeating it will not change the page. Choose a different action."
            ))
        })
    }

    pub fn record(&mut self, name: &str, args: Value) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(ActionRecord {
            tool: name.to_string(),
            args,
            at: Instant::now(),
        });
    }

    pub fn history(&self) -> impl Iterator<Item = &ActionRecord> {
        self.history.iter()
    }

    /// Advisory pacing after a page-mutating action: a fixed settle delay,
    /// then a best-effort readiness probe through an evaluation-capable
    /// tool. Probe failures are ignored; this is not a blocking guarantee.
    pub async fn wait_for_idle(&self, session: &ProviderSession, config: &BenchConfig) {
        tokio::time::sleep(config.settle_delay).await;

        let Some(tool) = session.evaluation_tool() else {
            return;
        };
        let key = crate::context::script_parameter_key(&tool.parameters);
        let name = tool.name.clone();
        let result = session
            .invoke_with_timeout(
                &name,
                serde_json::json!({ key: scripts::READY_STATE_PROBE }),
                std::time::Duration::from_millis(READINESS_PROBE_TIMEOUT_MS),
            )
            .await;
        if !result.success {
            debug!("Readiness probe failed (ignored): {}", result.message);
        }
    }
}

/// Actions that mutate page state and are subject to duplicate refusal and
/// settle pacing.
pub fn is_interaction(name: &str) -> bool {
    let name = name.to_lowercase();
    ["navigate", "click", "press", "goto", "open"]
        .iter()
        .any(|word| name.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn immediate_repeat_of_interaction_is_refused() {
        let mut guard = ActionGuard::new();
        let args = json!({ "selector": "#submit" });

        assert!(guard.check("browser_click", &args).is_none());
        guard.record("browser_click", args.clone());

        let refusal = guard.check("browser_click", &args).expect("must refuse");
        assert!(!refusal.success);
        assert!(refusal.message.contains("refused"));
    }

    #[test]
    fn different_arguments_are_not_a_duplicate() {
        let mut guard = ActionGuard::new();
        guard.record("browser_click", json!({ "selector": "#a" }));

        assert!(guard
            .check("browser_click", &json!({ "selector": "#b" }))
            .is_none());
    }

    #[test]
    fn non_interaction_tools_are_never_blocked() {
        let mut guard = ActionGuard::new();
        let args = json!({});
        guard.record("playwright_get_html", args.clone());

        assert!(guard.check("playwright_get_html", &args).is_none());
    }

    #[test]
    fn duplicate_window_only_covers_recent_actions() {
        let mut guard = ActionGuard::new();
        let args = json!({ "url": "http://localhost:3001/table.html" });
        guard.record("navigate", args.clone());
        for i in 0..DUPLICATE_WINDOW {
            guard.record("browser_click", json!({ "selector": format!("#b{i}") }));
        }

        // The navigation fell out of the inspection window.
        assert!(guard.check("navigate", &args).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let mut guard = ActionGuard::new();
        for i in 0..(HISTORY_LIMIT + 5) {
            guard.record("browser_click", json!({ "selector": format!("#b{i}") }));
        }
        assert_eq!(guard.history().count(), HISTORY_LIMIT);
    }
}
