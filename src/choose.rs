//! Interactive chooser mode.
//!
//! A chooser shows a numbered list in a pane and waits. Building the list
//! and acting on the pick are separated in time: whoever activates the mode
//! hands over a [`ChooseCallback`], and the chooser calls it back once the
//! user picks an item, cancels, or the pane goes away.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, trace};

use crate::cmd::CommandHost;
use crate::error::{CmdError, Result};
use crate::types::{Pane, PaneMode};

const PAGE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooseItem {
    /// 1-based, contiguous, in the order the items were added.
    pub pos: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Item(usize),
    Cancel,
}

/// What a chooser does with the user's pick.
pub trait ChooseCallback {
    /// Act on the chosen position. Never called for a cancel.
    fn choose(&mut self, host: &mut dyn CommandHost, pos: usize);

    /// Release everything the callback holds. Runs exactly once per
    /// activation, after `choose` if that ran at all.
    fn free(self: Box<Self>);
}

pub struct ChooseSession {
    items: Vec<ChooseItem>,
    selected: usize,
    callback: Option<Box<dyn ChooseCallback>>,
}

impl ChooseSession {
    /// Put `pane` into choose mode with `names` numbered from 1.
    /// `initial` is the position highlighted first.
    ///
    /// A pane already in another mode refuses with `ModeUnavailable`; the
    /// callback is freed immediately in that case.
    pub fn activate(pane: &mut Pane, names: Vec<String>, initial: usize, callback: Box<dyn ChooseCallback>) -> Result<()> {
        if pane.in_mode() {
            debug!(pane = pane.id, "choose mode refused, pane busy");
            callback.free();
            return Err(CmdError::ModeUnavailable);
        }
        let items: Vec<ChooseItem> = names.into_iter().enumerate()
            .map(|(i, name)| ChooseItem { pos: i + 1, name })
            .collect();
        let selected = items.iter().position(|it| it.pos == initial).unwrap_or(0);
        debug!(pane = pane.id, items = items.len(), selected, "choose mode entered");
        pane.set_mode(PaneMode::Choose(ChooseSession { items, selected, callback: Some(callback) }))
    }

    pub fn items(&self) -> &[ChooseItem] { &self.items }

    pub fn selected(&self) -> Option<&ChooseItem> { self.items.get(self.selected) }

    /// Move the highlight or finish. Returns the resolution when the key
    /// ends the session.
    pub fn key(&mut self, key: KeyEvent) -> Option<Choice> {
        let last = self.items.len().saturating_sub(1);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Some(Choice::Cancel),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Some(Choice::Cancel),
            KeyCode::Enter => {
                return Some(match self.selected() {
                    Some(it) => Choice::Item(it.pos),
                    None => Choice::Cancel,
                });
            }
            KeyCode::Up | KeyCode::Char('k') => { self.selected = self.selected.saturating_sub(1); }
            KeyCode::Down | KeyCode::Char('j') => { self.selected = (self.selected + 1).min(last); }
            KeyCode::PageUp => { self.selected = self.selected.saturating_sub(PAGE_ROWS); }
            KeyCode::PageDown => { self.selected = (self.selected + PAGE_ROWS).min(last); }
            KeyCode::Home | KeyCode::Char('g') => { self.selected = 0; }
            KeyCode::End | KeyCode::Char('G') => { self.selected = last; }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let n = c.to_digit(10).unwrap_or(0) as usize;
                if let Some(i) = self.items.iter().position(|it| it.pos == n) { self.selected = i; }
            }
            _ => {}
        }
        None
    }

    /// End the session. The callback's `choose` runs for a valid position,
    /// then `free` runs whatever the outcome. A position that is not in
    /// the list counts as a cancel.
    pub fn resolve(mut self, host: &mut dyn CommandHost, choice: Choice) {
        let Some(mut cb) = self.callback.take() else { return };
        match choice {
            Choice::Item(pos) if self.items.iter().any(|it| it.pos == pos) => {
                trace!(pos, "chooser resolved");
                cb.choose(host, pos);
            }
            Choice::Item(pos) => debug!(pos, "chooser resolved to unknown position, cancelling"),
            Choice::Cancel => trace!("chooser cancelled"),
        }
        cb.free();
    }
}

impl Drop for ChooseSession {
    fn drop(&mut self) {
        if let Some(cb) = self.callback.take() {
            debug!("chooser torn down before resolution");
            cb.free();
        }
    }
}
