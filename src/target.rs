//! `-t` target syntax.
//!
//! ```text
//! %3            pane id
//! @2            window id (current session first)
//! main          session, or a window index if no session has that name
//! main:2.1      session, window index, pane index
//! :logs         window by name in the current session
//! .1            pane index in the current window
//! ```

/// Which window of a session a target names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRef {
    Index(usize),
    Id(usize),
    Name(String),
}

impl WindowRef {
    fn from_spec(spec: &str) -> Option<Self> {
        if spec.is_empty() { return None; }
        if let Some(id) = spec.strip_prefix('@').and_then(|n| n.parse().ok()) {
            return Some(WindowRef::Id(id));
        }
        Some(match spec.parse() {
            Ok(idx) => WindowRef::Index(idx),
            Err(_) => WindowRef::Name(spec.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `%N` anywhere: the pane alone decides everything.
    PaneId(usize),
    /// Anything left out resolves to the current one.
    Path {
        session: Option<String>,
        window: Option<WindowRef>,
        pane: Option<usize>,
    },
}

impl Default for Target {
    fn default() -> Self { Target::Path { session: None, window: None, pane: None } }
}

impl Target {
    /// Parse `raw`. `is_session` says whether a name belongs to a live
    /// session; a bare number that is not one means a window index.
    pub fn parse(raw: &str, is_session: impl Fn(&str) -> bool) -> Target {
        if let Some(id) = raw.strip_prefix('%').and_then(|n| n.parse().ok()) {
            return Target::PaneId(id);
        }

        let (session, rest) = match raw.split_once(':') {
            Some((s, rest)) => ((!s.is_empty()).then(|| s.to_string()), rest),
            None if raw.starts_with('.') || raw.starts_with('@') => (None, raw),
            None if raw.is_empty() => return Target::default(),
            None if !is_session(raw) && raw.parse::<usize>().is_ok() => (None, raw),
            None => return Target::Path { session: Some(raw.to_string()), window: None, pane: None },
        };

        if let Some(id) = rest.strip_prefix('%').and_then(|n| n.parse().ok()) {
            return Target::PaneId(id);
        }
        // window ids never carry a pane part
        let (window, pane) = match rest.strip_prefix('@') {
            Some(_) => (rest, None),
            None => match rest.rsplit_once('.').map(|(w, p)| (w, p.parse::<usize>())) {
                Some((w, Ok(p))) => (w, Some(p)),
                _ => (rest, None),
            },
        };
        Target::Path { session, window: WindowRef::from_spec(window), pane }
    }
}
