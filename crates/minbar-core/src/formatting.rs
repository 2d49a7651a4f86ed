//! Formatting utilities (Markdown → Telegram HTML, message splitting).

use regex::Regex;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert the markdown subset completion answers tend to use into
/// Telegram-compatible HTML (`<b>`, `<i>`, `<code>`, `<pre>`, `<a>`).
///
/// Code spans are lifted out before escaping so their contents survive
/// untouched; an unclosed fence falls through as literal text.
pub fn convert_markdown_to_html(input: &str) -> String {
    let (text, code_spans) = extract_code_spans(input);
    let mut text = escape_html(&text);

    // Line-oriented transforms (avoid cross-line emphasis bugs).
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let mut l = convert_header_line(line);
        l = replace_delimited(&l, "**", "<b>", "</b>");
        if let Some(rest) = l.strip_prefix("- ") {
            l = format!("• {rest}");
        } else if let Some(rest) = l.strip_prefix("* ") {
            l = format!("• {rest}");
        }
        lines.push(l);
    }
    text = lines.join("\n");

    // Links: [text](url) -> <a href="url">text</a>. Conservative: no
    // nested brackets.
    let link_re = Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex");
    text = link_re
        .replace_all(&text, r#"<a href="$2">$1</a>"#)
        .to_string();

    // Restore code spans, escaped but otherwise verbatim.
    for (i, span) in code_spans.iter().enumerate() {
        let escaped = escape_html(&span.body);
        let html = if span.fenced {
            format!("<pre>{escaped}</pre>")
        } else {
            format!("<code>{escaped}</code>")
        };
        text = text.replace(&placeholder(i), &html);
    }

    text
}

struct CodeSpan {
    body: String,
    fenced: bool,
}

fn placeholder(i: usize) -> String {
    format!("\0CODE{i}\0")
}

fn extract_code_spans(input: &str) -> (String, Vec<CodeSpan>) {
    let mut spans = Vec::new();
    let mut out = String::new();
    let mut rest = input;

    while let Some(start) = rest.find('`') {
        let fenced = rest[start..].starts_with("```");
        let open_len = if fenced { 3 } else { 1 };
        let close = if fenced { "```" } else { "`" };

        let body_start = start + open_len;
        let Some(body_len) = rest[body_start..].find(close) else {
            // Unclosed span: keep the rest as literal text.
            out.push_str(rest);
            return (out, spans);
        };

        out.push_str(&rest[..start]);
        out.push_str(&placeholder(spans.len()));

        let mut body = rest[body_start..body_start + body_len].to_string();
        if fenced {
            // Drop the optional language tag on the opening fence.
            if let Some(nl) = body.find('\n') {
                if body[..nl].chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    body = body[nl + 1..].to_string();
                }
            }
        }
        spans.push(CodeSpan { body, fenced });

        rest = &rest[body_start + body_len + close.len()..];
    }

    out.push_str(rest);
    (out, spans)
}

fn convert_header_line(line: &str) -> String {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return line.to_string();
    }
    match line[hashes..].strip_prefix(' ') {
        Some(rest) => format!("<b>{rest}</b>"),
        None => line.to_string(),
    }
}

fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(start) = rest.find(delim) {
        let body_start = start + delim.len();
        let Some(body_len) = rest[body_start..].find(delim) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(open);
        out.push_str(&rest[body_start..body_start + body_len]);
        out.push_str(close);
        rest = &rest[body_start + body_len + delim.len()..];
    }
    out.push_str(rest);
    out
}

/// Split a reply into chunks below `limit`, preferring line boundaries.
/// A single overlong line is hard-split at a char boundary.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        let mut line = line;
        loop {
            let needed = if current.is_empty() {
                line.len()
            } else {
                current.len() + 1 + line.len()
            };
            if needed <= limit {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
                break;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                continue;
            }

            // One line longer than the limit: hard split.
            let cut = floor_char_boundary(line, limit);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i.max(1)
}

/// One-line preview used when echoing a transcript back to the chat.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").trim().to_string();
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    format!("{}...", cleaned.chars().take(max_chars).collect::<String>())
}
