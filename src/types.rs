use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use crate::choose::ChooseSession;
use crate::error::{CmdError, Result};
use crate::options::WindowOptions;

/// A session is shared through `Rc`; every holder of a clone keeps it
/// allocated. Whether it is still usable is a separate question answered by
/// `is_alive`, which goes false the moment the session is destroyed even if
/// deferred commands still hold references.
pub struct Session {
    pub id: usize,
    pub name: String,
    alive: Cell<bool>,
    /// Winlink index -> window id, iterated in index order.
    winlinks: RefCell<BTreeMap<usize, usize>>,
    curw: Cell<Option<usize>>,
    lastw: Cell<Option<usize>>,
}

impl Session {
    pub fn new(id: usize, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.into(),
            alive: Cell::new(true),
            winlinks: RefCell::new(BTreeMap::new()),
            curw: Cell::new(None),
            lastw: Cell::new(None),
        })
    }

    pub fn is_alive(&self) -> bool { self.alive.get() }

    pub(crate) fn mark_dead(&self) { self.alive.set(false); }

    /// Snapshot of `(index, window id)` pairs in index order.
    pub fn winlinks(&self) -> Vec<(usize, usize)> {
        self.winlinks.borrow().iter().map(|(&i, &w)| (i, w)).collect()
    }

    pub fn window_at(&self, idx: usize) -> Option<usize> {
        self.winlinks.borrow().get(&idx).copied()
    }

    pub fn has_window(&self, window_id: usize) -> bool {
        self.winlinks.borrow().values().any(|&w| w == window_id)
    }

    /// Link a window at the first free index. The first window linked
    /// becomes current.
    pub fn link_window(&self, window_id: usize) -> usize {
        let mut links = self.winlinks.borrow_mut();
        let mut idx = 0;
        while links.contains_key(&idx) { idx += 1; }
        links.insert(idx, window_id);
        if self.curw.get().is_none() { self.curw.set(Some(idx)); }
        idx
    }

    /// Remove every winlink and return the window ids they pointed at.
    pub(crate) fn unlink_all(&self) -> Vec<usize> {
        self.curw.set(None);
        self.lastw.set(None);
        std::mem::take(&mut *self.winlinks.borrow_mut()).into_values().collect()
    }

    /// Drop every winlink to `window_id`. If the current window goes, the
    /// last window (or failing that the lowest index) takes over.
    pub(crate) fn unlink_window(&self, window_id: usize) {
        let mut links = self.winlinks.borrow_mut();
        links.retain(|_, w| *w != window_id);
        if self.lastw.get().is_some_and(|i| !links.contains_key(&i)) { self.lastw.set(None); }
        if self.curw.get().is_some_and(|i| !links.contains_key(&i)) {
            let next = self.lastw.take().or_else(|| links.keys().next().copied());
            self.curw.set(next);
        }
    }

    pub fn current(&self) -> Option<usize> { self.curw.get() }

    pub fn last(&self) -> Option<usize> { self.lastw.get() }

    /// Make `idx` the current window. Returns false if nothing is linked there.
    pub fn select(&self, idx: usize) -> bool {
        if !self.winlinks.borrow().contains_key(&idx) { return false; }
        if self.curw.get() != Some(idx) {
            self.lastw.set(self.curw.get());
            self.curw.set(Some(idx));
        }
        true
    }

    /// Index after (or before) the current one, wrapping around.
    pub fn adjacent(&self, forward: bool) -> Option<usize> {
        let links = self.winlinks.borrow();
        let cur = self.curw.get()?;
        let next = if forward {
            links.range(cur + 1..).next().or_else(|| links.iter().next())
        } else {
            links.range(..cur).next_back().or_else(|| links.iter().next_back())
        };
        next.map(|(&i, _)| i)
    }
}

/// An attached client. `dead` is set when the connection goes away; the
/// struct itself lives on while anything still holds an `Rc` to it.
pub struct Client {
    pub id: usize,
    pub name: String,
    dead: Cell<bool>,
    session: RefCell<Option<Rc<Session>>>,
    message: RefCell<Option<String>>,
    output: RefCell<Vec<String>>,
}

impl Client {
    pub fn new(id: usize, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.into(),
            dead: Cell::new(false),
            session: RefCell::new(None),
            message: RefCell::new(None),
            output: RefCell::new(Vec::new()),
        })
    }

    pub fn is_dead(&self) -> bool { self.dead.get() }

    pub(crate) fn mark_dead(&self) {
        self.dead.set(true);
        self.session.borrow_mut().take();
    }

    pub fn session(&self) -> Option<Rc<Session>> { self.session.borrow().clone() }

    pub fn attach(&self, session: &Rc<Session>) {
        *self.session.borrow_mut() = Some(Rc::clone(session));
    }

    pub fn detach(&self) { self.session.borrow_mut().take(); }

    /// Status line message, replacing whatever was shown before.
    pub fn set_message(&self, msg: &str) {
        tracing::info!(client = %self.name, message = msg, "status message");
        *self.message.borrow_mut() = Some(msg.to_string());
    }

    pub fn message(&self) -> Option<String> { self.message.borrow().clone() }

    pub fn print(&self, line: &str) {
        self.output.borrow_mut().push(line.to_string());
    }

    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.borrow_mut())
    }
}

/// Exclusive input modes a pane can be in. While any is active, keys and
/// synchronized input no longer reach the program in the pane.
pub enum PaneMode {
    Choose(ChooseSession),
    Copy,
    Clock,
}

pub struct Pane {
    pub id: usize,
    /// Tracks the program's terminal state, including whether it has
    /// turned on bracketed paste (DECSET 2004).
    term: vt100::Parser,
    input: Option<Box<dyn Write>>,
    mode: Option<PaneMode>,
}

impl Pane {
    pub fn new(id: usize, rows: u16, cols: u16) -> Self {
        Self { id, term: vt100::Parser::new(rows, cols, 0), input: None, mode: None }
    }

    /// Connect the stream that feeds the program's input.
    pub fn set_input(&mut self, input: Box<dyn Write>) { self.input = Some(input); }

    pub fn close_input(&mut self) { self.input = None; }

    pub fn has_input(&self) -> bool { self.input.is_some() }

    pub(crate) fn input_mut(&mut self) -> Option<&mut dyn Write> {
        self.input.as_deref_mut().map(|w| w as &mut dyn Write)
    }

    /// Feed program output through the emulator.
    pub fn process_output(&mut self, bytes: &[u8]) { self.term.process(bytes); }

    pub fn bracketed_paste(&self) -> bool { self.term.screen().bracketed_paste() }

    pub fn in_mode(&self) -> bool { self.mode.is_some() }

    pub fn mode(&self) -> Option<&PaneMode> { self.mode.as_ref() }

    pub fn set_mode(&mut self, mode: PaneMode) -> Result<()> {
        if self.mode.is_some() { return Err(CmdError::ModeUnavailable); }
        self.mode = Some(mode);
        Ok(())
    }

    /// Leave whatever mode is active. A chooser is cancelled.
    pub fn reset_mode(&mut self) { self.mode = None; }

    pub fn chooser_mut(&mut self) -> Option<&mut ChooseSession> {
        match self.mode.as_mut() { Some(PaneMode::Choose(cs)) => Some(cs), _ => None }
    }

    /// Detach the chooser so it can be resolved without borrowing the pane.
    pub fn take_chooser(&mut self) -> Option<ChooseSession> {
        match self.mode.take() {
            Some(PaneMode::Choose(cs)) => Some(cs),
            other => { self.mode = other; None }
        }
    }
}

pub struct Window {
    pub id: usize,
    pub name: String,
    pub panes: Vec<Pane>,
    pub active: usize,
    pub zoomed: bool,
    pub options: WindowOptions,
}

impl Window {
    pub fn new(id: usize, name: impl Into<String>, first: Pane) -> Self {
        Self { id, name: name.into(), panes: vec![first], active: 0, zoomed: false, options: WindowOptions::default() }
    }

    pub fn active_pane(&self) -> Option<&Pane> { self.panes.get(self.active) }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> { self.panes.get_mut(self.active) }

    pub fn pane_index(&self, pane_id: usize) -> Option<usize> {
        self.panes.iter().position(|p| p.id == pane_id)
    }

    pub fn pane_mut(&mut self, pane_id: usize) -> Option<&mut Pane> {
        self.panes.iter_mut().find(|p| p.id == pane_id)
    }

    /// A zoomed window only shows its active pane.
    pub fn pane_visible(&self, index: usize) -> bool {
        index < self.panes.len() && (!self.zoomed || index == self.active)
    }
}
