use crate::error::{CmdError, Result};
use crate::paste::DEFAULT_BUFFER_LIMIT;

/// Session-scope options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// buffer-limit: how many paste buffers are kept (minimum 1).
    pub buffer_limit: usize,
}

impl Default for Options {
    fn default() -> Self { Self { buffer_limit: DEFAULT_BUFFER_LIMIT } }
}

/// Window-scope options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOptions {
    /// synchronize-panes: send input to every pane in the window.
    pub synchronize_panes: bool,
}

/// tmux flag syntax. An empty value toggles.
pub fn parse_flag(value: &str, current: bool) -> Option<bool> {
    match value {
        "" => Some(!current),
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn flag_str(b: bool) -> &'static str { if b { "on" } else { "off" } }

fn invalid(name: &str, reason: &str) -> CmdError {
    CmdError::InvalidArgumentRange { what: format!("value for {name}"), reason: reason.to_string() }
}

impl Options {
    pub const NAMES: &'static [&'static str] = &["buffer-limit"];

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "buffer-limit" => Some(self.buffer_limit.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "buffer-limit" => {
                let n: usize = value.parse().map_err(|_| invalid(name, "is invalid"))?;
                if n < 1 { return Err(invalid(name, "is too small")); }
                self.buffer_limit = n;
            }
            _ => return Err(CmdError::not_found(format!("unknown option: {name}"))),
        }
        Ok(())
    }
}

impl WindowOptions {
    pub const NAMES: &'static [&'static str] = &["synchronize-panes"];

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "synchronize-panes" => Some(flag_str(self.synchronize_panes).to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "synchronize-panes" => {
                self.synchronize_panes = parse_flag(value, self.synchronize_panes)
                    .ok_or_else(|| invalid(name, "is invalid"))?;
            }
            _ => return Err(CmdError::not_found(format!("unknown option: {name}"))),
        }
        Ok(())
    }
}
