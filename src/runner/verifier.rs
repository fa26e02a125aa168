use crate::runner::ScenarioKind;

/// Pure success predicate over the extracted page context.
///
/// Shared gates run first: a usable context must have some substance, must
/// not be a protocol error surfaced as text, and must not be raw page markup
/// (source text can contain the target phrase without the outcome being
/// visible to a user).
pub fn verify_goal(kind: ScenarioKind, context: &str) -> bool {
    if context.len() < 20 {
        return false;
    }
    if context.starts_with("MCP:") || context.contains("Client not initialized") {
        return false;
    }
    if context.contains("<!DOCTYPE") || (context.contains("<html") && context.contains("<body")) {
        return false;
    }

    let lower = context.to_lowercase();
    match kind {
        ScenarioKind::ShadowDom => context.contains("The cake is a lie"),
        // The confirmation code must be visible after the wizard finished,
        // not while step 3 is still on screen.
        ScenarioKind::WizardForm => {
            context.contains("#CONF-") && !context.contains("id=\"step3\"")
        }
        ScenarioKind::DragAndDrop => context.contains("Completed!"),
        ScenarioKind::SelfHealing => context.contains("ACCESS GRANTED"),
        ScenarioKind::TablePagination => {
            context.contains("$900")
                && lower.contains("plasma shield")
                && !context.contains("const data = [")
        }
    }
}
