/// One provider family's naming conventions: which discovered tools stand in
/// for "get current page state" and "navigate".
struct CapabilityFamily {
    /// Substring looked for in the discovered tool names (first pass) or the
    /// session label (second pass).
    keyword: &'static str,
    /// Candidate context tools, in preference order.
    context_tools: &'static [&'static str],
    navigate_tool: &'static str,
    /// Providers whose pages hide content behind shadow roots and need the
    /// deep traversal script.
    deep_dom: bool,
}

const FAMILIES: &[CapabilityFamily] = &[
    CapabilityFamily {
        keyword: "playwright",
        context_tools: &["playwright_get_visible_text", "playwright_get_html"],
        navigate_tool: "playwright_navigate",
        deep_dom: false,
    },
    CapabilityFamily {
        keyword: "vibium",
        context_tools: &["get_visual_context"],
        navigate_tool: "navigate",
        deep_dom: true,
    },
    CapabilityFamily {
        keyword: "agent_browser",
        context_tools: &["agent_browser_get_dom"],
        navigate_tool: "agent_browser_navigate",
        deep_dom: false,
    },
    CapabilityFamily {
        keyword: "chrome_devtools",
        context_tools: &["chrome_devtools_get_dom"],
        navigate_tool: "chrome_devtools_navigate",
        deep_dom: false,
    },
];

/// The resolved mapping from generic roles (context, navigate) to one
/// session's actual tool names. Computed at most once per session, right
/// after discovery.
#[derive(Debug, Clone, Default)]
pub struct CapabilityProfile {
    /// Existing context tools for this session, preference order preserved.
    pub context_tools: Vec<String>,
    pub navigate_tool: Option<String>,
    pub deep_dom: bool,
}

impl CapabilityProfile {
    pub fn is_empty(&self) -> bool {
        self.context_tools.is_empty() && self.navigate_tool.is_none()
    }
}

/// Maps the discovered tool-name set to a capability profile.
///
/// First pass matches each family keyword against the full discovered
/// tool-name string; second pass, only reached when nothing matched, checks
/// the session label instead. Absence of a match is not fatal; extraction
/// degrades to its generic tiers.
pub fn resolve_capabilities(session_label: &str, tool_names: &[String]) -> CapabilityProfile {
    let joined = tool_names.join(" ");
    let family = FAMILIES
        .iter()
        .find(|family| joined.contains(family.keyword))
        .or_else(|| {
            let label = session_label.to_lowercase();
            FAMILIES.iter().find(|family| label.contains(family.keyword))
        });

    let Some(family) = family else {
        return CapabilityProfile::default();
    };

    CapabilityProfile {
        context_tools: family
            .context_tools
            .iter()
            .filter(|name| tool_names.iter().any(|n| n.as_str() == **name))
            .map(|name| (*name).to_string())
            .collect(),
        navigate_tool: tool_names
            .iter()
            .find(|n| n.as_str() == family.navigate_tool)
            .cloned(),
        deep_dom: family.deep_dom,
    }
}

/// Generic navigate-tool candidates, used when no family matched.
pub const NAVIGATE_CANDIDATES: &[&str] =
    &["browser_navigate", "navigate", "navigate_page", "navigate_url"];

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolves_family_by_tool_name_keyword() {
        let tools = names(&[
            "playwright_navigate",
            "playwright_get_html",
            "playwright_click",
        ]);
        let profile = resolve_capabilities("SomeAdapter", &tools);

        // Only the candidates that actually exist survive, order preserved.
        assert_eq!(profile.context_tools, vec!["playwright_get_html"]);
        assert_eq!(profile.navigate_tool.as_deref(), Some("playwright_navigate"));
        assert!(!profile.deep_dom);
    }

    #[test]
    fn falls_back_to_session_label_match() {
        let tools = names(&["navigate", "click", "get_visual_context"]);
        let profile = resolve_capabilities("Vibium", &tools);

        assert_eq!(profile.context_tools, vec!["get_visual_context"]);
        assert_eq!(profile.navigate_tool.as_deref(), Some("navigate"));
        assert!(profile.deep_dom);
    }

    #[test]
    fn unknown_provider_degrades_to_empty_profile() {
        let tools = names(&["do_thing", "other_thing"]);
        let profile = resolve_capabilities("Mystery", &tools);

        assert!(profile.is_empty());
    }

    #[test]
    fn keyword_pass_wins_over_label_pass() {
        // Tool names say chrome_devtools even though the label says vibium.
        let tools = names(&["chrome_devtools_navigate", "chrome_devtools_get_dom"]);
        let profile = resolve_capabilities("vibium-ish", &tools);

        assert_eq!(profile.context_tools, vec!["chrome_devtools_get_dom"]);
        assert!(!profile.deep_dom);
    }
}
