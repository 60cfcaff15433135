//! Escaping for values placed inside FFmpeg filter graphs.
//!
//! A value passed to a filter option is unescaped three times before it is
//! used:
//! 1. the filter graph parser (`\ ' [ ] , ;`),
//! 2. the option string parser (`\ ' :`),
//! 3. for drawtext text only, the text expander (`\ %`).
//!
//! Escaping is applied innermost level first, so each outer level escapes the
//! backslashes added by the inner one.

/// Characters the graph parser treats as syntax.
const GRAPH_SPECIAL: &[char] = &['\\', '\'', '[', ']', ',', ';'];
/// Characters the option parser treats as syntax.
const OPTION_SPECIAL: &[char] = &['\\', '\'', ':'];
/// Characters drawtext expands.
const DRAWTEXT_SPECIAL: &[char] = &['\\', '%'];

fn escape_level(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text for `drawtext=text=...`.
///
/// Control characters other than newline are dropped; newlines separate
/// caption lines.
pub fn escape_drawtext(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect();

    let level3 = escape_level(&cleaned, DRAWTEXT_SPECIAL);
    let level2 = escape_level(&level3, OPTION_SPECIAL);
    escape_level(&level2, GRAPH_SPECIAL)
}

/// Escape a file path used as a filter option value (e.g. `fontfile=`).
pub fn escape_filter_path(path: &str) -> String {
    let level2 = escape_level(path, OPTION_SPECIAL);
    escape_level(&level2, GRAPH_SPECIAL)
}

/// Format a gain factor for the `volume` filter.
pub fn format_gain(gain: f64) -> String {
    let formatted = format!("{:.3}", gain);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
