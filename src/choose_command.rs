//! Choosers whose pick runs a command template.
//!
//! The list is built now and the command runs later, possibly after the
//! session or client it was built for has gone. The callback therefore
//! holds `Rc`s to both (so they stay allocated) and checks liveness before
//! running anything.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::choose::{ChooseCallback, ChooseSession};
use crate::cmd::{capitalize_first, template_replace, CmdCtx, CommandHost};
use crate::error::{CmdError, Result};
use crate::format::{format_paste_buffer, format_session, format_winlink, FormatTree};
use crate::server::Server;
use crate::types::{Client, Session};

pub const DEFAULT_CHOOSE_WINDOW_COMMAND: &str = "select-window -t '%%'";
pub const DEFAULT_CHOOSE_BUFFER_COMMAND: &str = "paste-buffer -b '%%'";

/// Deferred command for one chooser activation.
pub struct ChooseCommand {
    session: Rc<Session>,
    client: Rc<Client>,
    template: String,
    /// Substitution token for each position, `targets[pos - 1]`.
    targets: Vec<String>,
}

impl ChooseCommand {
    pub fn new(session: Rc<Session>, client: Rc<Client>, template: impl Into<String>, targets: Vec<String>) -> Self {
        Self { session, client, template: template.into(), targets }
    }

    /// Substitute the token for `pos` and run the result for the client.
    pub fn run(&self, host: &mut dyn CommandHost, pos: usize) -> Result<()> {
        if !self.session.is_alive() || self.client.is_dead() {
            return Err(CmdError::StaleTarget);
        }
        let token = pos.checked_sub(1).and_then(|i| self.targets.get(i))
            .ok_or_else(|| CmdError::not_found(format!("no item {pos}")))?;
        let line = template_replace(&self.template, token, 1);
        let list = host.parse_commands(&line).map_err(CmdError::TemplateParse)?;
        debug!(client = %self.client.name, command = %line, "running chosen command");
        let mut ctx = CmdCtx::for_client(Rc::clone(&self.client));
        host.exec_commands(list, &mut ctx);
        Ok(())
    }
}

impl ChooseCallback for ChooseCommand {
    fn choose(&mut self, host: &mut dyn CommandHost, pos: usize) {
        match self.run(host, pos) {
            Ok(()) => {}
            Err(CmdError::TemplateParse(cause)) => self.client.set_message(&capitalize_first(&cause)),
            Err(e) => debug!(pos, error = %e, "chosen command not run"),
        }
    }

    fn free(self: Box<Self>) {
        trace!(session = %self.session.name, client = %self.client.name, "chooser released");
    }
}

/// Show the windows of `session` in the active pane of `window_id`.
pub fn choose_window(
    server: &mut Server,
    client: &Rc<Client>,
    session: &Rc<Session>,
    window_id: usize,
    format: &str,
    template: &str,
) -> Result<()> {
    busy_check(server, window_id)?;

    let mut names = Vec::new();
    let mut targets = Vec::new();
    let mut initial = 1;
    for (idx, wid) in session.winlinks() {
        let Some(w) = server.window(wid) else { continue };
        let pos = names.len() + 1;
        if session.current() == Some(idx) { initial = pos; }
        let mut ft = FormatTree::new();
        ft.add("line", pos);
        format_session(&mut ft, session);
        format_winlink(&mut ft, session, idx, w);
        names.push(ft.expand(format));
        targets.push(format!("{}:{}", session.name, idx));
    }

    let cb = ChooseCommand::new(Rc::clone(session), Rc::clone(client), template, targets);
    activate_in(server, window_id, names, initial, cb)
}

/// Show the paste buffers in the active pane of `window_id`.
pub fn choose_buffer(
    server: &mut Server,
    client: &Rc<Client>,
    session: &Rc<Session>,
    window_id: usize,
    format: &str,
    template: &str,
) -> Result<()> {
    if server.buffers.is_empty() {
        return Err(CmdError::not_found("no buffers"));
    }
    busy_check(server, window_id)?;

    let mut names = Vec::new();
    let mut targets = Vec::new();
    for (i, pb) in server.buffers.iter().enumerate() {
        let mut ft = FormatTree::new();
        ft.add("line", i);
        format_paste_buffer(&mut ft, pb);
        names.push(ft.expand(format));
        targets.push(i.to_string());
    }

    let cb = ChooseCommand::new(Rc::clone(session), Rc::clone(client), template, targets);
    activate_in(server, window_id, names, 1, cb)
}

fn busy_check(server: &Server, window_id: usize) -> Result<()> {
    let w = server.window(window_id)
        .ok_or_else(|| CmdError::not_found(format!("can't find window @{window_id}")))?;
    match w.active_pane() {
        Some(p) if p.in_mode() => Err(CmdError::ModeUnavailable),
        Some(_) => Ok(()),
        None => Err(CmdError::not_found(format!("can't find pane in @{window_id}"))),
    }
}

fn activate_in(server: &mut Server, window_id: usize, names: Vec<String>, initial: usize, cb: ChooseCommand) -> Result<()> {
    let pane = server.windows.get_mut(&window_id).and_then(|w| w.active_pane_mut())
        .ok_or_else(|| CmdError::not_found(format!("can't find window @{window_id}")))?;
    ChooseSession::activate(pane, names, initial, Box::new(cb))
}
