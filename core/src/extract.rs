use scraper::{Html, Node};

/// Plain text of an HTML (or HTML-ish XML) document.
///
/// Text nodes are joined with a single space so adjacent block elements do not
/// fuse words. Script and style bodies are dropped. html5ever recovers from any
/// malformed input, so this never fails.
pub fn extract_text(content: &str) -> String {
    let doc = Html::parse_document(content);
    let mut out = String::with_capacity(content.len() / 2);
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if skipped { continue; }
        let t = text.trim();
        if t.is_empty() { continue; }
        if !out.is_empty() { out.push(' '); }
        out.push_str(t);
    }
    out
}
