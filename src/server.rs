use std::collections::BTreeMap;
use std::rc::Rc;

use crossterm::event::KeyEvent;
use tracing::{debug, info};

use crate::choose::Choice;
use crate::cmd::{parse_command_string, CmdCtx, CmdList, CommandHost};
use crate::error::{CmdError, Result};
use crate::options::{Options, WindowOptions};
use crate::paste::PasteStore;
use crate::target::{Target, WindowRef};
use crate::types::{Client, Pane, Session, Window};

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// Everything the command layer works on. Created once at startup and
/// passed to commands explicitly; nothing here is global.
pub struct Server {
    pub sessions: Vec<Rc<Session>>,
    pub clients: Vec<Rc<Client>>,
    pub windows: BTreeMap<usize, Window>,
    pub buffers: PasteStore,
    pub options: Options,
    /// Window options new windows start with (set with `setw -g`).
    pub window_defaults: WindowOptions,
    next_session_id: usize,
    next_window_id: usize,
    next_pane_id: usize,
    next_client_id: usize,
}

impl Default for Server {
    fn default() -> Self { Self::new() }
}

impl Server {
    pub fn new() -> Self { Self::with_options(Options::default()) }

    pub fn with_options(options: Options) -> Self {
        Self {
            sessions: Vec::new(),
            clients: Vec::new(),
            windows: BTreeMap::new(),
            buffers: PasteStore::new(options.buffer_limit),
            options,
            window_defaults: WindowOptions::default(),
            next_session_id: 0,
            next_window_id: 0,
            next_pane_id: 0,
            next_client_id: 0,
        }
    }

    /// Push option changes into the state they govern.
    pub fn apply_options(&mut self) {
        self.buffers.set_limit(self.options.buffer_limit);
    }

    // ─────────────────────────── lifecycle ───────────────────────────

    /// New session with one window.
    pub fn new_session(&mut self, name: &str) -> Result<Rc<Session>> {
        if self.session_by_name(name).is_some() {
            return Err(CmdError::Failed(format!("duplicate session: {name}")));
        }
        let s = Session::new(self.next_session_id, name);
        self.next_session_id += 1;
        self.sessions.push(Rc::clone(&s));
        self.new_window(&s, "shell");
        info!(session = %s.name, "session created");
        Ok(s)
    }

    /// New single-pane window linked into `session`. Returns the window id.
    pub fn new_window(&mut self, session: &Rc<Session>, name: &str) -> usize {
        let id = self.next_window_id;
        self.next_window_id += 1;
        let pane = self.alloc_pane();
        let mut w = Window::new(id, name, pane);
        w.options = self.window_defaults.clone();
        self.windows.insert(id, w);
        session.link_window(id);
        id
    }

    /// Add a pane to a window. Returns the new pane id.
    pub fn split_window(&mut self, window_id: usize) -> Result<usize> {
        let pane = self.alloc_pane();
        let id = pane.id;
        let w = self.windows.get_mut(&window_id)
            .ok_or_else(|| CmdError::not_found(format!("can't find window @{window_id}")))?;
        w.panes.push(pane);
        Ok(id)
    }

    fn alloc_pane(&mut self) -> Pane {
        let p = Pane::new(self.next_pane_id, DEFAULT_ROWS, DEFAULT_COLS);
        self.next_pane_id += 1;
        p
    }

    pub fn new_client(&mut self, name: &str, session: Option<&Rc<Session>>) -> Rc<Client> {
        let c = Client::new(self.next_client_id, name);
        self.next_client_id += 1;
        if let Some(s) = session { c.attach(s); }
        self.clients.push(Rc::clone(&c));
        c
    }

    /// Mark the session dead and take its windows away. Deferred commands
    /// may still hold the `Rc`; they see `is_alive() == false`.
    pub fn destroy_session(&mut self, session: &Rc<Session>) {
        session.mark_dead();
        self.sessions.retain(|s| !Rc::ptr_eq(s, session));
        for c in &self.clients {
            if c.session().is_some_and(|s| Rc::ptr_eq(&s, session)) { c.detach(); }
        }
        for wid in session.unlink_all() {
            if !self.sessions.iter().any(|s| s.has_window(wid)) {
                // dropping the window drops its panes and any chooser in them
                self.windows.remove(&wid);
            }
        }
        info!(session = %session.name, "session destroyed");
    }

    pub fn lose_client(&mut self, client: &Rc<Client>) {
        client.mark_dead();
        self.clients.retain(|c| !Rc::ptr_eq(c, client));
        info!(client = %client.name, "client lost");
    }

    /// Remove a pane. A window left empty is unlinked everywhere and destroyed.
    pub fn kill_pane(&mut self, pane_id: usize) -> Result<()> {
        let wid = self.window_of_pane(pane_id)
            .ok_or_else(|| CmdError::not_found(format!("can't find pane %{pane_id}")))?;
        let now_empty = match self.windows.get_mut(&wid) {
            Some(w) => {
                if let Some(i) = w.pane_index(pane_id) {
                    w.panes.remove(i);
                    if i < w.active { w.active -= 1; }
                    if w.active >= w.panes.len() { w.active = w.panes.len().saturating_sub(1); }
                }
                w.panes.is_empty()
            }
            None => false,
        };
        if now_empty {
            for s in &self.sessions { s.unlink_window(wid); }
            self.windows.remove(&wid);
        }
        Ok(())
    }

    // ─────────────────────────── lookup ───────────────────────────

    pub fn session_by_name(&self, name: &str) -> Option<Rc<Session>> {
        self.sessions.iter().find(|s| s.name == name).cloned()
    }

    pub fn window(&self, id: usize) -> Option<&Window> { self.windows.get(&id) }

    pub fn window_of_pane(&self, pane_id: usize) -> Option<usize> {
        self.windows.values().find(|w| w.pane_index(pane_id).is_some()).map(|w| w.id)
    }

    pub fn pane_mut(&mut self, pane_id: usize) -> Option<&mut Pane> {
        self.windows.values_mut().find_map(|w| w.pane_mut(pane_id))
    }

    /// The session commands act on when no target names one: the current
    /// client's, then the command client's, then the newest.
    pub fn current_session(&self, ctx: &CmdCtx) -> Option<Rc<Session>> {
        ctx.curclient.as_ref().and_then(|c| c.session())
            .or_else(|| ctx.cmdclient.as_ref().and_then(|c| c.session()))
            .or_else(|| self.sessions.last().cloned())
    }

    fn parse_target(&self, raw: &str) -> Target {
        Target::parse(raw, |name| self.session_by_name(name).is_some())
    }

    pub fn find_session(&self, ctx: &CmdCtx, target: Option<&str>) -> Result<Rc<Session>> {
        match self.parse_target(target.unwrap_or("")) {
            Target::Path { session: Some(name), .. } => self.named_session(&name),
            Target::PaneId(_) => self.find_pane(ctx, target).map(|(s, _, _)| s),
            Target::Path { .. } => self.current_session(ctx).ok_or_else(|| CmdError::not_found("no current session")),
        }
    }

    fn named_session(&self, name: &str) -> Result<Rc<Session>> {
        self.session_by_name(name).ok_or_else(|| CmdError::not_found(format!("can't find session {name}")))
    }

    /// Resolve a window target to `(session, winlink index, window id)`.
    pub fn find_window(&self, ctx: &CmdCtx, target: Option<&str>) -> Result<(Rc<Session>, usize, usize)> {
        let raw = target.unwrap_or("");
        match self.parse_target(raw) {
            Target::PaneId(pid) => self.window_of_pane(pid)
                .and_then(|wid| self.locate_window(ctx, wid))
                .ok_or_else(|| CmdError::not_found(format!("can't find window {raw}"))),
            Target::Path { session, window, .. } => self.resolve_path(ctx, session.as_deref(), window.as_ref(), raw),
        }
    }

    /// Resolve a pane target to `(session, window id, pane id)`.
    pub fn find_pane(&self, ctx: &CmdCtx, target: Option<&str>) -> Result<(Rc<Session>, usize, usize)> {
        let raw = target.unwrap_or("");
        let missing = || CmdError::not_found(format!("can't find pane {raw}"));
        match self.parse_target(raw) {
            Target::PaneId(pid) => {
                let wid = self.window_of_pane(pid).ok_or_else(missing)?;
                let (s, _, _) = self.locate_window(ctx, wid).ok_or_else(missing)?;
                Ok((s, wid, pid))
            }
            Target::Path { session, window, pane } => {
                let (s, _, wid) = self.resolve_path(ctx, session.as_deref(), window.as_ref(), raw)?;
                let w = self.windows.get(&wid).ok_or_else(missing)?;
                let p = w.panes.get(pane.unwrap_or(w.active)).ok_or_else(missing)?;
                Ok((s, wid, p.id))
            }
        }
    }

    /// A window id found through whichever session links it, the current
    /// session first.
    fn locate_window(&self, ctx: &CmdCtx, wid: usize) -> Option<(Rc<Session>, usize, usize)> {
        let s = self.current_session(ctx).filter(|s| s.has_window(wid))
            .or_else(|| self.sessions.iter().find(|s| s.has_window(wid)).cloned())?;
        let idx = s.winlinks().into_iter().find(|&(_, w)| w == wid)?.0;
        Some((s, idx, wid))
    }

    fn resolve_path(
        &self,
        ctx: &CmdCtx,
        session: Option<&str>,
        window: Option<&WindowRef>,
        raw: &str,
    ) -> Result<(Rc<Session>, usize, usize)> {
        let missing = || CmdError::not_found(format!("can't find window {raw}"));
        if let (None, Some(&WindowRef::Id(wid))) = (session, window) {
            return self.locate_window(ctx, wid).ok_or_else(missing);
        }
        let s = match session {
            Some(name) => self.named_session(name)?,
            None => self.current_session(ctx).ok_or_else(|| CmdError::not_found("no current session"))?,
        };
        let links = s.winlinks();
        let found = match window {
            None => s.current().and_then(|cur| links.iter().find(|&&(i, _)| i == cur)),
            Some(WindowRef::Index(idx)) => links.iter().find(|&&(i, _)| i == *idx),
            Some(WindowRef::Id(id)) => links.iter().find(|&&(_, w)| w == *id),
            Some(WindowRef::Name(name)) => links.iter()
                .find(|&&(_, w)| self.windows.get(&w).is_some_and(|win| &win.name == name)),
        };
        let &(idx, wid) = found.ok_or_else(missing)?;
        Ok((s, idx, wid))
    }

    // ─────────────────────────── choosers ───────────────────────────

    /// Deliver the user's pick (or cancel) to the chooser in `pane_id`.
    /// Does nothing if the pane has no chooser.
    pub fn choose_resolve(&mut self, pane_id: usize, choice: Choice) {
        let Some(cs) = self.pane_mut(pane_id).and_then(|p| p.take_chooser()) else {
            debug!(pane = pane_id, "no chooser to resolve");
            return;
        };
        cs.resolve(self, choice);
    }

    /// Feed a key to the chooser in `pane_id`. Returns false if there is none.
    pub fn choose_key(&mut self, pane_id: usize, key: KeyEvent) -> bool {
        let Some(cs) = self.pane_mut(pane_id).and_then(|p| p.chooser_mut()) else { return false };
        if let Some(choice) = cs.key(key) {
            self.choose_resolve(pane_id, choice);
        }
        true
    }

    /// Force a pane out of whatever mode it is in.
    pub fn reset_mode(&mut self, pane_id: usize) {
        if let Some(p) = self.pane_mut(pane_id) { p.reset_mode(); }
    }

    // ─────────────────────────── commands ───────────────────────────

    /// Parse and run a command line. Problems go to the context's error sink.
    pub fn execute(&mut self, line: &str, ctx: &mut CmdCtx) {
        match self.parse_commands(line) {
            Ok(list) => self.exec_commands(list, ctx),
            Err(cause) => ctx.error(&cause),
        }
    }
}

impl CommandHost for Server {
    fn parse_commands(&self, line: &str) -> std::result::Result<CmdList, String> {
        parse_command_string(line)
    }

    /// Run each command in turn; the first failure is reported and stops
    /// the rest of the list.
    fn exec_commands(&mut self, list: CmdList, ctx: &mut CmdCtx) {
        for cmd in list.0 {
            if let Err(e) = (cmd.entry.exec)(&cmd.args, self, ctx) {
                if e.is_silent() {
                    debug!(command = cmd.entry.name, error = %e, "command skipped");
                } else {
                    ctx.error(&e.to_string());
                }
                break;
            }
        }
    }
}
