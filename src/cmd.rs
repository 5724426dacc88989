//! Command grammar and execution context.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::commands::CMD_TABLE;
use crate::error::{CmdError, Result};
use crate::server::Server;
use crate::types::Client;

pub type CmdExec = fn(&Args, &mut Server, &mut CmdCtx) -> Result<()>;

#[derive(Debug)]
pub struct CmdEntry {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    /// getopt-style: a letter takes a value when followed by ':'.
    pub args_template: &'static str,
    pub lower: usize,
    pub upper: usize,
    pub usage: &'static str,
    pub exec: CmdExec,
}

pub struct Cmd {
    pub entry: &'static CmdEntry,
    pub args: Args,
}

/// Commands separated by `;` on one line, run in order.
#[derive(Default)]
pub struct CmdList(pub Vec<Cmd>);

impl CmdList {
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|c| c.entry.name).collect()
    }
}

/// Something that can parse and run command strings. The chooser resolves
/// through this so it never needs to know who owns the sessions.
pub trait CommandHost {
    fn parse_commands(&self, line: &str) -> std::result::Result<CmdList, String>;
    fn exec_commands(&mut self, list: CmdList, ctx: &mut CmdCtx);
}

/// Raw arguments a command client sent with its request.
#[derive(Debug, Clone)]
pub struct MsgData {
    pub argv: Vec<String>,
}

/// Who a command runs for and where its output goes.
///
/// With a `cmdclient` (a command typed at a shell prompt) output goes back
/// to that client. Without one (key bindings, choosers) errors become the
/// current client's status message and printed lines go to its output.
#[derive(Default)]
pub struct CmdCtx {
    pub msgdata: Option<MsgData>,
    pub curclient: Option<Rc<Client>>,
    pub cmdclient: Option<Rc<Client>>,
    /// Errors and printed lines with no client to receive them, e.g.
    /// while loading config.
    pub errors: Vec<String>,
    pub output: Vec<String>,
}

impl CmdCtx {
    /// Context for commands run on behalf of an attached client rather
    /// than typed by one.
    pub fn for_client(client: Rc<Client>) -> Self {
        Self { msgdata: None, curclient: Some(client), cmdclient: None, errors: Vec::new(), output: Vec::new() }
    }

    pub fn from_command_client(client: Rc<Client>, argv: Vec<String>) -> Self {
        Self { msgdata: Some(MsgData { argv }), curclient: None, cmdclient: Some(client), errors: Vec::new(), output: Vec::new() }
    }

    pub fn error(&mut self, msg: &str) {
        if let Some(c) = &self.cmdclient {
            c.print(msg);
        } else if let Some(c) = &self.curclient {
            c.set_message(&capitalize_first(msg));
        } else {
            warn!(error = msg, "command error with no client");
            self.errors.push(msg.to_string());
        }
    }

    pub fn print(&mut self, msg: &str) {
        match self.cmdclient.as_ref().or(self.curclient.as_ref()) {
            Some(c) => c.print(msg),
            None => self.output.push(msg.to_string()),
        }
    }

    pub fn info(&mut self, msg: &str) {
        self.print(msg);
    }
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ─────────────────────────── tokenizer ───────────────────────────

/// Split a command line into commands and their words. Handles single and
/// double quotes, backslash escapes, and `;` between commands.
pub fn split_command_line(line: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut cmds: Vec<Vec<String>> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' { quote = None; } else { current.push(c); }
            }
            Some(_) => {
                if c == '"' {
                    quote = None;
                } else if c == '\\' {
                    match chars.next() {
                        Some(n) => current.push(n),
                        None => return Err("unterminated quote".into()),
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => { quote = Some(c); in_word = true; }
                '\\' => {
                    if let Some(n) = chars.next() { current.push(n); }
                    in_word = true;
                }
                ';' => {
                    if in_word { words.push(std::mem::take(&mut current)); in_word = false; }
                    if !words.is_empty() { cmds.push(std::mem::take(&mut words)); }
                }
                c if c.is_whitespace() => {
                    if in_word { words.push(std::mem::take(&mut current)); in_word = false; }
                }
                c => { current.push(c); in_word = true; }
            },
        }
    }
    if quote.is_some() { return Err("unterminated quote".into()); }
    if in_word { words.push(current); }
    if !words.is_empty() { cmds.push(words); }
    Ok(cmds)
}

// ─────────────────────────── arguments ───────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Args {
    flags: BTreeMap<char, Option<String>>,
    pub argv: Vec<String>,
}

impl Args {
    /// Parse `argv` (without the command name) against a getopt template.
    pub fn parse(template: &str, argv: &[String]) -> std::result::Result<Args, String> {
        let mut args = Args::default();
        let mut i = 0;
        while i < argv.len() {
            let a = &argv[i];
            if a == "--" { i += 1; break; }
            if !a.starts_with('-') || a.len() == 1 { break; }
            let mut letters = a[1..].char_indices();
            while let Some((off, c)) = letters.next() {
                let Some(at) = template.find(c).filter(|_| c != ':') else {
                    return Err(format!("unknown flag -{c}"));
                };
                if template[at + c.len_utf8()..].starts_with(':') {
                    let rest = &a[1 + off + c.len_utf8()..];
                    let value = if !rest.is_empty() {
                        rest.to_string()
                    } else {
                        i += 1;
                        argv.get(i).cloned().ok_or_else(|| format!("-{c} expects an argument"))?
                    };
                    args.flags.insert(c, Some(value));
                    break;
                }
                args.flags.insert(c, None);
            }
            i += 1;
        }
        args.argv = argv[i.min(argv.len())..].to_vec();
        Ok(args)
    }

    pub fn has(&self, flag: char) -> bool { self.flags.contains_key(&flag) }

    pub fn get(&self, flag: char) -> Option<&str> {
        self.flags.get(&flag).and_then(|v| v.as_deref())
    }

    /// Numeric flag value within `min..=max`. `Ok(None)` when absent.
    pub fn strtonum(&self, flag: char, min: i64, max: i64, what: &str) -> Result<Option<i64>> {
        let Some(raw) = self.get(flag) else { return Ok(None) };
        let range = |reason: &str| CmdError::InvalidArgumentRange { what: what.to_string(), reason: reason.to_string() };
        let n: i64 = raw.parse().map_err(|_| {
            // a run of digits too long for i64 is still "too large"
            if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) { range("too large") } else { range("invalid") }
        })?;
        if n < min { return Err(range("too small")); }
        if n > max { return Err(range("too large")); }
        Ok(Some(n))
    }
}

// ─────────────────────────── lookup & parse ───────────────────────────

pub fn find_entry(name: &str) -> std::result::Result<&'static CmdEntry, String> {
    if let Some(e) = CMD_TABLE.iter().find(|e| e.name == name || e.alias == Some(name)) {
        return Ok(e);
    }
    let matches: Vec<&'static CmdEntry> = CMD_TABLE.iter().filter(|e| e.name.starts_with(name)).collect();
    match matches.len() {
        0 => Err(format!("unknown command: {name}")),
        1 => Ok(matches[0]),
        _ => {
            let names: Vec<&str> = matches.iter().map(|e| e.name).collect();
            Err(format!("ambiguous command: {name}, could be: {}", names.join(", ")))
        }
    }
}

/// Parse a full command line into a list ready to run.
pub fn parse_command_string(line: &str) -> std::result::Result<CmdList, String> {
    let mut list = CmdList::default();
    for words in split_command_line(line)? {
        let entry = find_entry(&words[0])?;
        let usage = || format!("usage: {} {}", entry.name, entry.usage);
        let args = Args::parse(entry.args_template, &words[1..]).map_err(|_| usage())?;
        if args.argv.len() < entry.lower || args.argv.len() > entry.upper {
            return Err(usage());
        }
        list.0.push(Cmd { entry, args });
    }
    Ok(list)
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%(%|[1-9])").expect("placeholder pattern is valid"))
}

/// Substitute `s` for every `%%` and every `%<idx>` in `template`.
/// Any other `%` sequence is copied through.
pub fn template_replace(template: &str, s: &str, idx: u32) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let m = &caps[1];
            if m == "%" || m.parse::<u32>().ok() == Some(idx) {
                s.to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<Vec<String>> {
        split_command_line(line).unwrap()
    }

    #[test]
    fn template_from_chooser() {
        assert_eq!(template_replace("select-window -t '%%'", "3", 1), "select-window -t '3'");
    }

    #[test]
    fn template_replaces_every_placeholder() {
        assert_eq!(template_replace("a %% b %1 c %%", "x", 1), "a x b x c x");
        assert_eq!(template_replace("keep %2 and 50%", "x", 1), "keep %2 and 50%");
        assert_eq!(template_replace("no placeholders", "x", 1), "no placeholders");
        assert_eq!(template_replace("%%", "%%", 1), "%%");
    }

    #[test]
    fn tokenizer_quotes_and_separators() {
        assert_eq!(words("select-window -t 'main:2'"), vec![vec!["select-window", "-t", "main:2"]]);
        assert_eq!(words(r#"set-buffer "a \"b\" c""#), vec![vec!["set-buffer", r#"a "b" c"#]]);
        assert_eq!(words("list-buffers ; show-buffer"), vec![vec!["list-buffers"], vec!["show-buffer"]]);
        assert_eq!(words("a; b"), vec![vec!["a"], vec!["b"]]);
        assert_eq!(words(r"display-message a\;b"), vec![vec!["display-message", "a;b"]]);
        assert_eq!(words("set-buffer ''"), vec![vec!["set-buffer", ""]]);
        assert!(words("   ").is_empty());
        assert!(split_command_line("select-window -t 'oops").is_err());
    }

    #[test]
    fn args_getopt() {
        let argv: Vec<String> = ["-dp", "-s", "\\n", "-b3", "extra"].iter().map(|s| s.to_string()).collect();
        let a = Args::parse("db:prs:t:", &argv).unwrap();
        assert!(a.has('d') && a.has('p') && !a.has('r'));
        assert_eq!(a.get('s'), Some("\\n"));
        assert_eq!(a.get('b'), Some("3"));
        assert_eq!(a.argv, vec!["extra".to_string()]);
        assert!(Args::parse("t:", &["-x".to_string()]).is_err());
        assert!(Args::parse("t:", &["-t".to_string()]).is_err());
    }

    #[test]
    fn strtonum_ranges() {
        let parse = |v: &str| Args::parse("b:", &["-b".to_string(), v.to_string()]).unwrap();
        assert_eq!(parse("4").strtonum('b', 0, 10, "buffer").unwrap(), Some(4));
        assert_eq!(parse("11").strtonum('b', 0, 10, "buffer").unwrap_err().to_string(), "buffer too large");
        assert_eq!(parse("-1").strtonum('b', 0, 10, "buffer").unwrap_err().to_string(), "buffer too small");
        assert_eq!(parse("x").strtonum('b', 0, 10, "buffer").unwrap_err().to_string(), "buffer invalid");
        assert_eq!(parse("99999999999999999999").strtonum('b', 0, 10, "buffer").unwrap_err().to_string(), "buffer too large");
        assert_eq!(Args::default().strtonum('b', 0, 10, "buffer").unwrap(), None);
    }

    #[test]
    fn command_lookup() {
        assert_eq!(find_entry("paste-buffer").unwrap().name, "paste-buffer");
        assert_eq!(find_entry("pasteb").unwrap().name, "paste-buffer");
        assert_eq!(find_entry("choose-w").unwrap().name, "choose-window");
        assert!(find_entry("choose").unwrap_err().starts_with("ambiguous command: choose"));
        assert_eq!(find_entry("frobnicate").unwrap_err(), "unknown command: frobnicate");
    }

    #[test]
    fn parse_reports_usage() {
        let err = parse_command_string("select-window -x").err().unwrap();
        assert!(err.starts_with("usage: select-window"), "{err}");
        let list = parse_command_string("set-buffer hi ; list-buffers").unwrap();
        assert_eq!(list.names(), vec!["set-buffer", "list-buffers"]);
        assert!(parse_command_string("set-buffer").is_err());
    }

    #[test]
    fn capitalize() {
        assert_eq!(capitalize_first("unknown command: x"), "Unknown command: x");
        assert_eq!(capitalize_first(""), "");
    }
}
