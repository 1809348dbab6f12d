//! JavaScript snippets injected into live pages.
//!
//! ## Security: string encoding
//!
//! Every value that reaches a script (record fields, option text, labels) is
//! passed through [`sanitize_js_string`] and placed only inside string
//! literals, never in code positions.

/// Element id of the status overlay on the target page.
pub const OVERLAY_ID: &str = "__relay_groups_overlay";

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes all characters that could break out of a JS string context:
/// - Backslashes, single/double quotes, backticks
/// - Newlines, carriage returns, tabs
/// - HTML angle brackets (to prevent `</script>` breakouts)
/// - Null bytes are stripped
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            _ => result.push(ch),
        }
    }
    result
}

/// Quote a value as a single-quoted JS string literal.
pub fn js_str(s: &str) -> String {
    format!("'{}'", sanitize_js_string(s))
}

/// A transient bottom-right toast that fades out after two seconds.
pub fn toast_script(message: &str) -> String {
    format!(
        r#"(() => {{
            const div = document.createElement('div');
            div.textContent = {msg};
            div.style.cssText = 'position:fixed;right:14px;bottom:14px;z-index:999999;' +
                'background:rgba(0,0,0,.85);color:#fff;font:12px system-ui;' +
                'padding:6px 10px;border-radius:6px;opacity:0;transition:opacity .25s ease;';
            document.body.appendChild(div);
            requestAnimationFrame(() => (div.style.opacity = 1));
            setTimeout(() => {{
                div.style.opacity = 0;
                setTimeout(() => div.remove(), 400);
            }}, 2000);
            return true;
        }})()"#,
        msg = js_str(message)
    )
}

/// Create (or reset) the status overlay with one pending row per group.
pub fn overlay_render_script(groups: &[Vec<String>]) -> String {
    let rows: Vec<String> = groups.iter().map(|g| js_str(&g.join(", "))).collect();
    format!(
        r#"(() => {{
            let box = document.getElementById({id});
            if (!box) {{
                box = document.createElement('div');
                box.id = {id};
                box.style.cssText = 'position:fixed;right:12px;bottom:12px;z-index:999999;' +
                    'max-width:380px;background:rgba(20,20,24,.9);color:#fff;' +
                    'font:12px/1.4 system-ui,sans-serif;border:1px solid rgba(255,255,255,.15);' +
                    'border-radius:10px;padding:10px 12px;box-shadow:0 6px 18px rgba(0,0,0,.35);' +
                    'transition:opacity .4s ease;';
                const head = document.createElement('div');
                head.style.cssText = 'font-weight:700;margin-bottom:6px';
                head.textContent = 'Trigger Groups';
                const body = document.createElement('div');
                body.dataset.relay = 'body';
                body.style.cssText = 'display:flex;flex-direction:column;gap:6px;max-height:220px;overflow:auto';
                const status = document.createElement('div');
                status.dataset.relay = 'status';
                status.style.cssText = 'opacity:.8;margin-top:6px';
                box.append(head, body, status);
                document.body.appendChild(box);
            }}
            box.style.opacity = 1;
            const body = box.querySelector('[data-relay="body"]');
            body.innerHTML = '';
            [{rows}].forEach((words, i) => {{
                const row = document.createElement('div');
                row.style.cssText = 'display:flex;gap:6px;align-items:center;' +
                    'background:rgba(255,255,255,.06);padding:6px;border-radius:8px;';
                const mark = document.createElement('span');
                mark.dataset.relayRow = String(i);
                mark.style.fontWeight = '700';
                mark.textContent = '\u23F3';
                const text = document.createElement('div');
                text.style.cssText = 'white-space:nowrap;overflow:hidden;text-overflow:ellipsis;max-width:300px';
                text.textContent = words;
                row.append(mark, text);
                body.appendChild(row);
            }});
            return true;
        }})()"#,
        id = js_str(OVERLAY_ID),
        rows = rows.join(", ")
    )
}

/// Mark one overlay row as succeeded or failed.
pub fn overlay_row_script(index: usize, ok: bool, reason: Option<&str>) -> String {
    format!(
        r#"(() => {{
            const box = document.getElementById({id});
            const mark = box && box.querySelector('[data-relay-row="{index}"]');
            if (!mark) return false;
            mark.textContent = {symbol};
            mark.title = {reason};
            return true;
        }})()"#,
        id = js_str(OVERLAY_ID),
        symbol = if ok { "'\\u2705'" } else { "'\\u274C'" },
        reason = js_str(reason.unwrap_or("")),
    )
}

/// Set the overlay's status line.
pub fn overlay_status_script(text: &str) -> String {
    format!(
        r#"(() => {{
            const box = document.getElementById({id});
            const el = box && box.querySelector('[data-relay="status"]');
            if (!el) return false;
            el.textContent = {text};
            return true;
        }})()"#,
        id = js_str(OVERLAY_ID),
        text = js_str(text)
    )
}

/// Fade the overlay out and remove it after `delay_ms`.
pub fn overlay_fade_script(delay_ms: u64) -> String {
    format!(
        r#"(() => {{
            const box = document.getElementById({id});
            if (!box) return false;
            setTimeout(() => {{
                box.style.opacity = 0;
                setTimeout(() => box.remove(), 400);
            }}, {delay_ms});
            return true;
        }})()"#,
        id = js_str(OVERLAY_ID)
    )
}
