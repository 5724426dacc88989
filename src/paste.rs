//! Paste buffer store.
//!
//! Index 0 is always the most recent buffer. Indices are positions in the
//! current order, so any mutation renumbers everything below it and callers
//! must look a buffer up again afterwards.

use chrono::{DateTime, Local};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::error::{CmdError, Result};

pub const DEFAULT_BUFFER_LIMIT: usize = 20;

pub struct PasteBuffer {
    data: Vec<u8>,
    created: DateTime<Local>,
}

impl PasteBuffer {
    fn new(data: Vec<u8>) -> Self {
        Self { data, created: Local::now() }
    }

    pub fn data(&self) -> &[u8] { &self.data }

    pub fn size(&self) -> usize { self.data.len() }

    pub fn created(&self) -> DateTime<Local> { self.created }

    /// Printable sample of the contents no wider than `width` columns.
    /// Control characters are escaped (`\n`, `\t`, `\033`); a truncated
    /// sample ends with `...`.
    pub fn sample(&self, width: usize) -> String {
        let text = String::from_utf8_lossy(&self.data);
        let mut out = String::new();
        let mut used = 0usize;
        for c in text.chars() {
            let piece = match c {
                '\n' => "\\n".to_string(),
                '\r' => "\\r".to_string(),
                '\t' => "\\t".to_string(),
                '\\' => "\\\\".to_string(),
                c if c.is_control() => format!("\\{:03o}", c as u32 & 0xff),
                c => c.to_string(),
            };
            let w: usize = piece.chars().map(|ch| ch.width().unwrap_or(0)).sum();
            if used + w > width {
                out.push_str("...");
                return out;
            }
            used += w;
            out.push_str(&piece);
        }
        out
    }
}

pub struct PasteStore {
    buffers: Vec<PasteBuffer>,
    limit: usize,
}

impl Default for PasteStore {
    fn default() -> Self { Self::new(DEFAULT_BUFFER_LIMIT) }
}

impl PasteStore {
    pub fn new(limit: usize) -> Self {
        Self { buffers: Vec::new(), limit: limit.max(1) }
    }

    pub fn len(&self) -> usize { self.buffers.len() }

    pub fn is_empty(&self) -> bool { self.buffers.is_empty() }

    pub fn limit(&self) -> usize { self.limit }

    /// Change the capacity, evicting the oldest buffers if the store is
    /// now over it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        if self.buffers.len() > self.limit {
            debug!(limit = self.limit, evicted = self.buffers.len() - self.limit, "paste store trimmed");
            self.buffers.truncate(self.limit);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PasteBuffer> {
        self.buffers.iter()
    }

    /// Insert at the top. The oldest buffer is dropped when over the limit.
    pub fn push(&mut self, data: Vec<u8>) {
        self.buffers.insert(0, PasteBuffer::new(data));
        if self.buffers.len() > self.limit {
            self.buffers.pop();
            debug!(limit = self.limit, "oldest paste buffer evicted");
        }
    }

    /// The buffer at `index`, or the top buffer when `index` is `None`.
    pub fn get(&self, index: Option<usize>) -> Result<&PasteBuffer> {
        match index {
            None => self.buffers.first().ok_or_else(|| CmdError::not_found("no buffers")),
            Some(i) => self.buffers.get(i).ok_or_else(|| CmdError::not_found(format!("no buffer {i}"))),
        }
    }

    /// Remove and return the buffer at `index` (top when `None`).
    pub fn remove(&mut self, index: Option<usize>) -> Result<PasteBuffer> {
        let i = index.unwrap_or(0);
        if i >= self.buffers.len() {
            return Err(match index {
                None => CmdError::not_found("no buffers"),
                Some(i) => CmdError::not_found(format!("no buffer {i}")),
            });
        }
        Ok(self.buffers.remove(i))
    }

    /// Replace the contents of an existing buffer in place.
    pub fn replace(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        let pb = self.buffers.get_mut(index)
            .ok_or_else(|| CmdError::not_found(format!("no buffer {index}")))?;
        *pb = PasteBuffer::new(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(limit: usize, items: &[&str]) -> PasteStore {
        let mut s = PasteStore::new(limit);
        for it in items { s.push(it.as_bytes().to_vec()); }
        s
    }

    #[test]
    fn top_is_most_recent() {
        let s = store_with(10, &["first", "second", "third"]);
        assert_eq!(s.get(None).unwrap().data(), b"third");
        assert_eq!(s.get(Some(2)).unwrap().data(), b"first");
        assert_eq!(s.get(Some(1)).unwrap().data(), b"second");
    }

    #[test]
    fn push_evicts_oldest_over_limit() {
        let mut s = PasteStore::new(3);
        for i in 0..7 {
            s.push(format!("b{i}").into_bytes());
            assert!(s.len() <= 3);
        }
        let all: Vec<&[u8]> = s.iter().map(|b| b.data()).collect();
        assert_eq!(all, vec![&b"b6"[..], b"b5", b"b4"]);
    }

    #[test]
    fn empty_store_is_not_found() {
        let mut s = PasteStore::default();
        assert!(matches!(s.get(None), Err(CmdError::NotFound { .. })));
        assert!(matches!(s.remove(None), Err(CmdError::NotFound { .. })));
    }

    #[test]
    fn remove_out_of_range_leaves_store_unchanged() {
        let mut s = store_with(10, &["a", "b"]);
        let err = s.remove(Some(5)).err().unwrap();
        assert_eq!(err.to_string(), "no buffer 5");
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(None).unwrap().data(), b"b");
    }

    #[test]
    fn remove_compacts_positions() {
        let mut s = store_with(10, &["a", "b", "c"]);
        let gone = s.remove(Some(1)).unwrap();
        assert_eq!(gone.data(), b"b");
        assert_eq!(s.get(Some(0)).unwrap().data(), b"c");
        assert_eq!(s.get(Some(1)).unwrap().data(), b"a");
        assert!(s.get(Some(2)).is_err());
    }

    #[test]
    fn shrinking_limit_trims_oldest() {
        let mut s = store_with(10, &["a", "b", "c", "d"]);
        s.set_limit(2);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(Some(1)).unwrap().data(), b"c");
        s.set_limit(0);
        assert_eq!(s.limit(), 1);
        assert_eq!(s.get(None).unwrap().data(), b"d");
    }

    #[test]
    fn replace_keeps_position() {
        let mut s = store_with(10, &["a", "b"]);
        s.replace(1, b"z".to_vec()).unwrap();
        assert_eq!(s.get(Some(1)).unwrap().data(), b"z");
        assert!(s.replace(4, b"x".to_vec()).is_err());
    }

    #[test]
    fn sample_escapes_and_truncates() {
        let s = store_with(10, &["ab\ncd\t\x1b"]);
        assert_eq!(s.get(None).unwrap().sample(50), "ab\\ncd\\t\\033");
        assert_eq!(s.get(None).unwrap().sample(4), "ab\\n...");
        let wide = store_with(10, &["日本語"]);
        assert_eq!(wide.get(None).unwrap().sample(4), "日本...");
    }
}
