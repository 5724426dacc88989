//! Writing paste buffer contents into panes.

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::error::{CmdError, Result};
use crate::types::{Pane, Window};

pub const BRACKET_START: &[u8] = b"\x1b[200~";
pub const BRACKET_END: &[u8] = b"\x1b[201~";

/// How line feeds are rewritten and whether bracketed paste is wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteSeparator {
    pub sep: Vec<u8>,
    pub bracket: bool,
}

impl Default for PasteSeparator {
    fn default() -> Self { Self { sep: b"\r".to_vec(), bracket: false } }
}

impl PasteSeparator {
    /// An explicit separator wins, then `raw_newline` keeps `\n`, otherwise
    /// line feeds become carriage returns.
    pub fn new(explicit: Option<&str>, raw_newline: bool, bracket: bool) -> Self {
        let sep = match explicit {
            Some(s) => s.as_bytes().to_vec(),
            None if raw_newline => b"\n".to_vec(),
            None => b"\r".to_vec(),
        };
        Self { sep, bracket }
    }
}

/// Write `data` with every line feed replaced by `sep`, optionally wrapped
/// in bracketed paste markers. A line feed at the very start still produces
/// a separator; nothing is appended after the last fragment.
pub fn paste_filter<W: Write + ?Sized>(out: &mut W, data: &[u8], sep: &[u8], bracket: bool) -> io::Result<()> {
    if bracket { out.write_all(BRACKET_START)?; }
    let mut rest = data;
    while let Some(lf) = memchr::memchr(b'\n', rest) {
        if lf != 0 { out.write_all(&rest[..lf])?; }
        out.write_all(sep)?;
        rest = &rest[lf + 1..];
    }
    if !rest.is_empty() { out.write_all(rest)?; }
    if bracket { out.write_all(BRACKET_END)?; }
    Ok(())
}

/// Paste into one pane. Markers are only sent if the program in the pane
/// has asked for bracketed paste.
pub fn paste_pane(pane: &mut Pane, data: &[u8], spec: &PasteSeparator) -> io::Result<()> {
    let bracket = spec.bracket && pane.bracketed_paste();
    let id = pane.id;
    let Some(out) = pane.input_mut() else { return Ok(()) };
    paste_filter(out, data, &spec.sep, bracket)?;
    out.flush()?;
    debug!(pane = id, bytes = data.len(), bracket, "pasted");
    Ok(())
}

/// Paste into `pane_id`, then, if the window has synchronize-panes on, into
/// every other visible pane that is not in a mode and still has an input
/// stream. Returns how many panes were written.
pub fn paste_window(window: &mut Window, pane_id: usize, data: &[u8], spec: &PasteSeparator) -> Result<usize> {
    let origin = window.pane_index(pane_id)
        .ok_or_else(|| CmdError::not_found(format!("can't find pane %{pane_id}")))?;
    paste_pane(&mut window.panes[origin], data, spec)?;
    let mut written = 1;

    if window.options.synchronize_panes {
        for i in 0..window.panes.len() {
            if i == origin || !window.pane_visible(i) { continue; }
            let pane = &mut window.panes[i];
            if pane.in_mode() || !pane.has_input() { continue; }
            match paste_pane(pane, data, spec) {
                Ok(()) => written += 1,
                Err(e) => warn!(pane = pane.id, error = %e, "synchronized paste failed"),
            }
        }
        debug!(window = window.id, panes = written, "synchronized paste");
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::types::PaneMode;

    /// Input stream that keeps everything written to it.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(pub Rc<RefCell<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    impl Capture {
        pub(crate) fn bytes(&self) -> Vec<u8> { self.0.borrow().clone() }
    }

    pub(crate) fn live_pane(id: usize) -> (Pane, Capture) {
        let cap = Capture::default();
        let mut p = Pane::new(id, 24, 80);
        p.set_input(Box::new(cap.clone()));
        (p, cap)
    }

    fn filtered(data: &[u8], sep: &[u8], bracket: bool) -> Vec<u8> {
        let mut out = Vec::new();
        paste_filter(&mut out, data, sep, bracket).unwrap();
        out
    }

    #[test]
    fn line_feeds_become_separator() {
        assert_eq!(filtered(b"a\nb\nc", b"\r", false), b"a\rb\rc");
        assert_eq!(filtered(b"a\nb\n", b"\r", false), b"a\rb\r");
        assert_eq!(filtered(b"one\ntwo", b"\r\n", false), b"one\r\ntwo");
        assert_eq!(filtered(b"plain", b"\r", false), b"plain");
        assert_eq!(filtered(b"", b"\r", false), b"");
    }

    #[test]
    fn leading_and_repeated_line_feeds() {
        assert_eq!(filtered(b"\nX", b"\r", false), b"\rX");
        assert_eq!(filtered(b"\n\n", b"\r", false), b"\r\r");
    }

    #[test]
    fn bracket_wraps_transformed_content() {
        assert_eq!(filtered(b"a\nb", b"\r", true), b"\x1b[200~a\rb\x1b[201~");
    }

    #[test]
    fn separator_resolution_order() {
        assert_eq!(PasteSeparator::new(Some("|"), true, false).sep, b"|");
        assert_eq!(PasteSeparator::new(None, true, false).sep, b"\n");
        assert_eq!(PasteSeparator::new(None, false, false), PasteSeparator::default());
    }

    #[test]
    fn bracket_needs_pane_support() {
        let spec = PasteSeparator::new(None, false, true);
        let (mut plain, plain_out) = live_pane(0);
        paste_pane(&mut plain, b"x\ny", &spec).unwrap();
        assert_eq!(plain_out.bytes(), b"x\ry");

        let (mut aware, aware_out) = live_pane(1);
        aware.process_output(b"\x1b[?2004h");
        paste_pane(&mut aware, b"x\ny", &spec).unwrap();
        assert_eq!(aware_out.bytes(), b"\x1b[200~x\ry\x1b[201~");
    }

    #[test]
    fn sync_reaches_unmoded_siblings_only() {
        let (p0, out0) = live_pane(0);
        let (p1, out1) = live_pane(1);
        let (mut p2, out2) = live_pane(2);
        p2.set_mode(PaneMode::Clock).unwrap();
        let mut w = Window::new(0, "w", p0);
        w.panes.push(p1);
        w.panes.push(p2);
        w.options.synchronize_panes = true;

        let n = paste_window(&mut w, 0, b"hi\n", &PasteSeparator::default()).unwrap();
        assert_eq!(n, 2);
        assert_eq!(out0.bytes(), b"hi\r");
        assert_eq!(out1.bytes(), b"hi\r");
        assert!(out2.bytes().is_empty());
    }

    #[test]
    fn sync_skips_hidden_and_closed_panes() {
        let (p0, out0) = live_pane(0);
        let (p1, out1) = live_pane(1);
        let (mut p2, out2) = live_pane(2);
        p2.close_input();
        let mut w = Window::new(0, "w", p0);
        w.panes.push(p1);
        w.panes.push(p2);
        w.options.synchronize_panes = true;
        w.zoomed = true;

        assert_eq!(paste_window(&mut w, 0, b"z", &PasteSeparator::default()).unwrap(), 1);
        assert_eq!(out0.bytes(), b"z");
        assert!(out1.bytes().is_empty());
        assert!(out2.bytes().is_empty());
    }

    #[test]
    fn bracket_decided_per_destination() {
        let (p0, out0) = live_pane(0);
        let (mut p1, out1) = live_pane(1);
        p1.process_output(b"\x1b[?2004h");
        let mut w = Window::new(0, "w", p0);
        w.panes.push(p1);
        w.options.synchronize_panes = true;

        paste_window(&mut w, 0, b"q", &PasteSeparator::new(None, false, true)).unwrap();
        assert_eq!(out0.bytes(), b"q");
        assert_eq!(out1.bytes(), b"\x1b[200~q\x1b[201~");
    }

    #[test]
    fn no_sync_writes_origin_only() {
        let (p0, out0) = live_pane(0);
        let (p1, out1) = live_pane(1);
        let mut w = Window::new(0, "w", p0);
        w.panes.push(p1);
        assert_eq!(paste_window(&mut w, 1, b"k", &PasteSeparator::default()).unwrap(), 1);
        assert!(out0.bytes().is_empty());
        assert_eq!(out1.bytes(), b"k");
        assert!(paste_window(&mut w, 9, b"k", &PasteSeparator::default()).is_err());
    }
}
