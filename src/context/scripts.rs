//! Page-inspection scripts injected through a provider's script-evaluation
//! tool. Kept as plain source strings so the extractor can pair them with
//! whatever parameter key the tool's schema declares.

/// Deep scan for pages that hide content behind shadow roots. Recursively
/// descends open shadow boundaries (bounded depth), skips script/style and
/// invisible nodes, and lists up to 30 visible interactive elements.
pub const DEEP_DOM_SCAN: &str = r#"
(() => {
    if (!document.body) return "Empty Body";
    const MAX_DEPTH = 10;
    const MAX_INTERACTIVE = 30;
    const textParts = [];
    const interactive = [];

    const visible = (el) => {
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0 && getComputedStyle(el).display !== 'none';
    };

    const walk = (root, depth) => {
        if (depth > MAX_DEPTH) return;
        for (const node of root.childNodes) {
            if (node.nodeType === Node.TEXT_NODE) {
                const text = node.textContent.trim();
                if (text) textParts.push(text);
                continue;
            }
            if (node.nodeType !== Node.ELEMENT_NODE) continue;
            const tag = node.tagName.toLowerCase();
            if (tag === 'script' || tag === 'style') continue;
            if (!visible(node)) continue;
            const clickable = ['button', 'input', 'a', 'select'].includes(tag) || node.onclick;
            if (clickable && interactive.length < MAX_INTERACTIVE) {
                interactive.push(`${node.tagName} id="${node.id}" text="${(node.textContent || '').trim().slice(0, 30)}"`);
            }
            if (node.shadowRoot) walk(node.shadowRoot, depth + 1);
            walk(node, depth + 1);
        }
    };

    walk(document.body, 0);
    return textParts.join(' ').slice(0, 2000) + '\nINTERACTIVE ELEMENTS:\n' + interactive.join('\n');
})()
"#;

/// Flat scan used when no provider-specialized script applies: visible
/// interactive elements by bounding box plus the page's rendered text.
pub const GENERIC_DOM_SCAN: &str = r#"
(() => {
    if (!document.body) return "Empty Body";
    const interactive = Array.from(document.querySelectorAll('button, input, a, select, [draggable="true"]'))
        .filter(el => {
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0 && getComputedStyle(el).display !== 'none';
        })
        .map(el => `${el.tagName} id="${el.id}" class="${el.className}" text="${el.textContent?.trim().slice(0,30)}"`)
        .join('\n');
    return document.body.innerText.slice(0, 2000) + '\nINTERACTIVE ELEMENTS:\n' + interactive;
})()
"#;

/// Best-effort readiness probe issued after interaction-class actions.
pub const READY_STATE_PROBE: &str = "document.readyState";
