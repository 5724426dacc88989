use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cmd::CmdCtx;
use crate::server::Server;

/// How deep `source-file` may nest before it is refused.
const MAX_SOURCE_DEPTH: usize = 10;

fn home_dir() -> String {
    env::var("HOME").or_else(|_| env::var("USERPROFILE")).unwrap_or_default()
}

/// Config files tried in order; the first one that can be read wins.
pub fn config_paths() -> Vec<PathBuf> {
    let home = PathBuf::from(home_dir());
    vec![home.join(".muxcmd.conf"), home.join(".tmux.conf")]
}

/// Load the first readable config file. Returns its path if one was found.
pub fn load_config(server: &mut Server) -> Option<PathBuf> {
    for path in config_paths() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            let errors = parse_config_content(server, &content);
            info!(path = %path.display(), errors = errors.len(), "config loaded");
            return Some(path);
        }
    }
    None
}

/// Apply every line of `content`. Returns the errors, one per failed line.
pub fn parse_config_content(server: &mut Server, content: &str) -> Vec<String> {
    content_at(server, content, 0)
}

fn content_at(server: &mut Server, content: &str, depth: usize) -> Vec<String> {
    let mut errors = Vec::new();
    for (n, line) in content.lines().enumerate() {
        for e in line_at(server, line, depth) {
            warn!(line = n + 1, error = %e, "config error");
            errors.push(format!("{}: {e}", n + 1));
        }
    }
    errors
}

/// Apply one config line. Option commands run through the command layer
/// with no client attached; everything else is skipped.
pub fn parse_config_line(server: &mut Server, line: &str) -> Vec<String> {
    line_at(server, line, 0)
}

fn line_at(server: &mut Server, line: &str, depth: usize) -> Vec<String> {
    let l = line.trim();
    if l.is_empty() || l.starts_with('#') { return Vec::new(); }

    let word = l.split_whitespace().next().unwrap_or("");
    match word {
        "set" | "set-option" | "setw" | "set-window-option" => {
            let mut ctx = CmdCtx::default();
            server.execute(l, &mut ctx);
            ctx.errors
        }
        "source" | "source-file" => {
            let path = l[word.len()..].trim().trim_matches(|c| c == '\'' || c == '"');
            source_at(server, path, depth)
        }
        _ => {
            debug!(line = l, "config line ignored");
            Vec::new()
        }
    }
}

/// Read another config file, `~` expanded to the home directory.
pub fn source_file(server: &mut Server, path: &str) -> Vec<String> {
    source_at(server, path, 0)
}

fn source_at(server: &mut Server, path: &str, depth: usize) -> Vec<String> {
    let expanded = match path.strip_prefix('~') {
        Some(rest) => format!("{}{rest}", home_dir()),
        None => path.to_string(),
    };
    if depth >= MAX_SOURCE_DEPTH {
        return vec![format!("{expanded}: too many nested files")];
    }
    match std::fs::read_to_string(Path::new(&expanded)) {
        Ok(content) => content_at(server, &content, depth + 1),
        Err(e) => vec![format!("{expanded}: {e}")],
    }
}
