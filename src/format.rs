// format.rs: tmux-compatible format expansion for chooser and list output
//
// Supports: #{var}, #{?cond,true,false}, #{=N:var}, #{=-N:var},
// #{s/pat/rep/:var}, and ## for a literal '#'.

use std::collections::BTreeMap;

use crate::paste::PasteBuffer;
use crate::types::{Session, Window};

pub const DEFAULT_WINDOW_TEMPLATE: &str = "#{window_index}: #{window_name}#{window_flags} (#{window_panes} panes)";
pub const DEFAULT_BUFFER_TEMPLATE: &str = "#{line}: #{buffer_size} bytes: \"#{buffer_sample}\"";
pub const BUFFER_SAMPLE_WIDTH: usize = 50;

/// Named values a format string is expanded against.
#[derive(Debug, Clone, Default)]
pub struct FormatTree {
    values: BTreeMap<String, String>,
}

impl FormatTree {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, key: &str, value: impl ToString) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn expand(&self, fmt: &str) -> String {
        let mut result = String::with_capacity(fmt.len() * 2);
        let mut i = 0;
        while let Some(off) = fmt[i..].find('#') {
            let at = i + off;
            result.push_str(&fmt[i..at]);
            let rest = &fmt[at + 1..];
            if rest.starts_with('#') {
                result.push('#');
                i = at + 2;
            } else if rest.starts_with('{') {
                match find_matching_brace(fmt, at + 2) {
                    Some(close) => {
                        result.push_str(&self.expand_expression(&fmt[at + 2..close]));
                        i = close + 1;
                    }
                    None => {
                        result.push_str(&fmt[at..]);
                        i = fmt.len();
                    }
                }
            } else {
                result.push('#');
                i = at + 1;
            }
        }
        result.push_str(&fmt[i..]);
        result
    }

    fn expand_expression(&self, expr: &str) -> String {
        if let Some(rest) = expr.strip_prefix('?') {
            let parts = split_at_depth0(rest, ',');
            let cond = self.get(parts[0]).unwrap_or("");
            let truthy = !cond.is_empty() && cond != "0";
            let branch = if truthy { parts.get(1) } else { parts.get(2) };
            return branch.map(|b| self.expand(b)).unwrap_or_default();
        }
        if let Some(rest) = expr.strip_prefix('=') {
            if let Some((n, var)) = rest.split_once(':') {
                if let Ok(n) = n.parse::<i64>() {
                    return trim_chars(&self.expand_var(var), n);
                }
            }
        }
        if let Some(rest) = expr.strip_prefix("s/") {
            if let Some(val) = self.substitute(rest) {
                return val;
            }
        }
        self.expand_var(expr)
    }

    fn expand_var(&self, name: &str) -> String {
        self.get(name).unwrap_or("").to_string()
    }

    /// `pat/rep/flags:var` after the leading `s/`.
    fn substitute(&self, spec: &str) -> Option<String> {
        let (mods, var) = spec.rsplit_once(':')?;
        let mut parts = mods.splitn(3, '/');
        let pattern = parts.next()?;
        let replacement = parts.next()?;
        let flags = parts.next().unwrap_or("");
        let pattern = if flags.contains('i') { format!("(?i){pattern}") } else { pattern.to_string() };
        let value = self.expand_var(var);
        match regex::Regex::new(&pattern) {
            Ok(re) => Some(re.replace_all(&value, replacement).into_owned()),
            Err(_) => Some(value),
        }
    }
}

/// Index of the `}` closing an expression that starts at `start`.
fn find_matching_brace(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'#' if bytes.get(i + 1) == Some(&b'{') => { depth += 1; i += 2; continue; }
            b'}' => {
                depth -= 1;
                if depth == 0 { return Some(i); }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split on `sep` where it is not inside a nested `#{...}`.
fn split_at_depth0(s: &str, sep: char) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && bytes.get(i + 1) == Some(&b'{') {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == b'}' && depth > 0 {
            depth -= 1;
        } else if bytes[i] == sep as u8 && depth == 0 {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

/// Keep the first `n` characters, or the last `-n` when negative.
fn trim_chars(s: &str, n: i64) -> String {
    let count = s.chars().count();
    let keep = n.unsigned_abs() as usize;
    if keep >= count { return s.to_string(); }
    if n >= 0 { s.chars().take(keep).collect() } else { s.chars().skip(count - keep).collect() }
}

// ─────────────────────────── populating ───────────────────────────

pub fn format_session(ft: &mut FormatTree, s: &Session) {
    ft.add("session_name", &s.name);
    ft.add("session_id", format!("${}", s.id));
    ft.add("session_windows", s.winlinks().len());
}

pub fn format_winlink(ft: &mut FormatTree, s: &Session, idx: usize, w: &Window) {
    let mut flags = String::new();
    if s.current() == Some(idx) { flags.push('*'); }
    if s.last() == Some(idx) { flags.push('-'); }
    if w.zoomed { flags.push('Z'); }

    ft.add("window_index", idx);
    ft.add("window_id", format!("@{}", w.id));
    ft.add("window_name", &w.name);
    ft.add("window_panes", w.panes.len());
    ft.add("window_flags", flags);
    ft.add("window_active", if s.current() == Some(idx) { "1" } else { "0" });
    ft.add("window_zoomed_flag", if w.zoomed { "1" } else { "0" });
    ft.add("pane_synchronized", if w.options.synchronize_panes { "1" } else { "0" });
}

pub fn format_paste_buffer(ft: &mut FormatTree, pb: &PasteBuffer) {
    ft.add("buffer_size", pb.size());
    ft.add("buffer_sample", pb.sample(BUFFER_SAMPLE_WIDTH));
    ft.add("buffer_created", pb.created().timestamp());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> FormatTree {
        let mut ft = FormatTree::new();
        ft.add("session_name", "test_session");
        ft.add("window_index", 2);
        ft.add("window_flags", "*");
        ft.add("empty", "");
        ft.add("zero", "0");
        ft
    }

    #[test]
    fn test_plain_variables() {
        assert_eq!(tree().expand("#{window_index}: #{session_name}"), "2: test_session");
        assert_eq!(tree().expand("#{missing}x"), "x");
    }

    #[test]
    fn test_hash_escape() {
        assert_eq!(tree().expand("## #S #{window_flags}"), "# #S *");
        assert_eq!(tree().expand("unterminated #{window_index"), "unterminated #{window_index");
    }

    #[test]
    fn test_conditional() {
        assert_eq!(tree().expand("#{?window_flags,cur,other}"), "cur");
        assert_eq!(tree().expand("#{?zero,yes,no}"), "no");
        assert_eq!(tree().expand("#{?empty,yes,no}"), "no");
        assert_eq!(tree().expand("#{?window_flags,#{window_index},none}"), "2");
    }

    #[test]
    fn test_trim() {
        assert_eq!(tree().expand("#{=3:session_name}"), "tes");
        assert_eq!(tree().expand("#{=-3:session_name}"), "ion");
        assert_eq!(tree().expand("#{=40:session_name}"), "test_session");
    }

    #[test]
    fn test_substitute() {
        assert_eq!(tree().expand("#{s/_/-/:session_name}"), "test-session");
        assert_eq!(tree().expand("#{s/TEST/x/i:session_name}"), "x_session");
    }

    #[test]
    fn test_multibyte_text_survives() {
        assert_eq!(tree().expand("é #{window_index} ü"), "é 2 ü");
    }
}
