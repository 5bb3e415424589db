//! Lightweight text → markup transform for chat messages.
//!
//! The passes below are independent regex substitutions, not a tokenizer, so
//! overlapping or unbalanced markers produce best-effort output. Callers that
//! stream text re-run [`format_message`] over the whole accumulated buffer on
//! every chunk, which keeps markers split across chunks intact.

use regex::Regex;
use std::sync::OnceLock;

struct Passes {
    strong: Regex,
    emphasis: Regex,
    block_code: Regex,
    inline_code: Regex,
    link: Regex,
}

fn passes() -> &'static Passes {
    static PASSES: OnceLock<Passes> = OnceLock::new();
    PASSES.get_or_init(|| Passes {
        strong: Regex::new(r"\*\*(.*?)\*\*").expect("strong pattern"),
        emphasis: Regex::new(r"\*(.*?)\*").expect("emphasis pattern"),
        block_code: Regex::new(r"```([^`]*)```").expect("block code pattern"),
        inline_code: Regex::new(r"`(.*?)`").expect("inline code pattern"),
        // Stop at `<`, `>` and `"` so a URL never swallows or breaks markup.
        link: Regex::new(r#"https?://[^\s<>"]+"#).expect("link pattern"),
    })
}

/// Convert message text to markup.
///
/// Order matters: each pass runs on the output of the previous one.
///
/// 1. `**X**` → `<strong>X</strong>`
/// 2. `*X*` → `<em>X</em>`
/// 3. ```` ```X``` ```` → `<pre><code>X</code></pre>` (may span lines)
/// 4. `` `X` `` → `<code>X</code>`
/// 5. `http(s)://…` → `<a href="…" target="_blank">…</a>`
/// 6. newline → `<br>`
pub fn format_message(content: &str) -> String {
    let p = passes();

    let text = p.strong.replace_all(content, "<strong>${1}</strong>");
    let text = p.emphasis.replace_all(&text, "<em>${1}</em>");
    let text = p.block_code.replace_all(&text, "<pre><code>${1}</code></pre>");
    let text = p.inline_code.replace_all(&text, "<code>${1}</code>");
    let text = p
        .link
        .replace_all(&text, r#"<a href="${0}" target="_blank">${0}</a>"#);

    text.replace('\n', "<br>")
}
