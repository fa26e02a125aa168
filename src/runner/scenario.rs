use serde::Serialize;

/// Identifies one goal-directed task; the goal predicate is keyed off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioKind {
    TablePagination,
    WizardForm,
    ShadowDom,
    DragAndDrop,
    SelfHealing,
}

/// One goal-directed task run against one provider session.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub name: &'static str,
    pub path: &'static str,
    pub goal: &'static str,
}

impl Scenario {
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        kind: ScenarioKind::TablePagination,
        name: "Table Pagination",
        path: "/table.html",
        goal: "Find the price of \"Plasma Shield\" by navigating through pages and filtering if needed.",
    },
    Scenario {
        kind: ScenarioKind::WizardForm,
        name: "Wizard Form",
        path: "/form.html",
        goal: "Complete the checkout wizard with name \"Alice\", email \"alice@test.com\", phone \"+123456\", and address \"Wonderland\".",
    },
    Scenario {
        kind: ScenarioKind::ShadowDom,
        name: "Shadow DOM",
        path: "/shadow.html",
        goal: "Enter \"OPEN-SESAME\" into the secret input and click reveal.",
    },
    Scenario {
        kind: ScenarioKind::DragAndDrop,
        name: "Drag and Drop",
        path: "/dnd.html",
        goal: "Drag \"Implement MCP Logic\" from To Do to the Done column.",
    },
    Scenario {
        kind: ScenarioKind::SelfHealing,
        name: "Self Healing",
        path: "/dynamic.html",
        goal: "Click the \"ACCESS SYSTEM\" button despite its changing attributes.",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_cleanly_with_and_without_trailing_slash() {
        let scenario = &SCENARIOS[0];
        assert_eq!(
            scenario.url("http://localhost:3001"),
            "http://localhost:3001/table.html"
        );
        assert_eq!(
            scenario.url("http://localhost:3001/"),
            "http://localhost:3001/table.html"
        );
    }
}
