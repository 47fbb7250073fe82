//! Streaming marker substitution.
//!
//! [`MarkerWriter`] sits between a node's captured body and the real output
//! sink. Literal bytes pass straight through; every complete marker whose
//! key is registered on the node is replaced by the output of that key's
//! [`ElementWriter`](crate::model::ElementWriter). Partial matches are carried
//! across `write` calls, so the output does not depend on how the body is
//! chunked.

use std::io::{self, Write};
use std::mem;

use memchr::memchr;

use super::codec::{ElementKey, KEY_LEN, PREFIX, SUFFIX, hex_value};
use crate::error::{Error, Result};
use crate::model::{ElementContext, Node};

/// Configuration for marker scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    /// If true, a well-formed marker with no registered writer is an error.
    /// Default is false (the marker is logged and written out verbatim).
    pub strict: bool,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Scanner position within a potential marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Not inside a marker.
    Idle,
    /// This many prefix bytes matched (at least one, fewer than all).
    Prefix(usize),
    /// Full prefix matched, this many key digits captured.
    Key(usize),
    /// Full key captured, this many suffix bytes matched.
    Suffix(usize),
}

/// Outcome of feeding one byte to the state machine.
enum Step {
    Consumed,
    /// The byte ended a partial match and must be fed again.
    Retry,
}

/// A `Write` adapter that substitutes element markers in a node body.
///
/// Call [`finish`](Self::finish) once the whole body has been written so any
/// trailing partial marker is emitted and errors are observed. Dropping an
/// unfinished writer emits the trailing bytes on a best-effort basis.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use pagemodel::{Element, IdAllocator, MarkerWriter, Node, NullContext, push_marker};
///
/// let mut alloc = IdAllocator::new();
/// let node = Node::new();
/// let key = node
///     .add_child_element(&mut alloc, Element::heading("Intro"), |out: &mut dyn Write, _: &dyn pagemodel::ElementContext| {
///         out.write_all(b"<h2>Intro</h2>")
///     })
///     .unwrap();
///
/// let mut body = String::from("<div>");
/// push_marker(key, &mut body);
/// body.push_str("</div>");
///
/// let mut out = Vec::new();
/// let mut writer = MarkerWriter::new(&node, &mut out, &NullContext);
/// writer.write_all(body.as_bytes()).unwrap();
/// writer.finish().unwrap();
/// drop(writer);
/// assert_eq!(out, b"<div><h2>Intro</h2></div>");
/// ```
pub struct MarkerWriter<'a, W: Write> {
    node: &'a Node,
    out: W,
    context: &'a dyn ElementContext,
    config: ScanConfig,
    state: ScanState,
    key: [u8; KEY_LEN],
    key_value: u64,
}

impl<'a, W: Write> MarkerWriter<'a, W> {
    pub fn new(node: &'a Node, out: W, context: &'a dyn ElementContext) -> Self {
        Self::with_config(node, out, context, ScanConfig::default())
    }

    pub fn with_config(
        node: &'a Node,
        out: W,
        context: &'a dyn ElementContext,
        config: ScanConfig,
    ) -> Self {
        Self {
            node,
            out,
            context,
            config,
            state: ScanState::Idle,
            key: [0u8; KEY_LEN],
            key_value: 0,
        }
    }

    /// Feed a chunk of body bytes.
    pub fn feed(&mut self, buf: &[u8]) -> Result<()> {
        let mut pos = 0;
        while pos < buf.len() {
            if self.state == ScanState::Idle {
                // Literal runs up to the next possible marker start go out in one write
                let rest = &buf[pos..];
                match memchr(PREFIX[0], rest) {
                    None => {
                        self.out.write_all(rest)?;
                        return Ok(());
                    }
                    Some(0) => {}
                    Some(skip) => {
                        self.out.write_all(&rest[..skip])?;
                        pos += skip;
                    }
                }
            }
            match self.step(buf[pos])? {
                Step::Consumed => pos += 1,
                Step::Retry => {}
            }
        }
        Ok(())
    }

    fn step(&mut self, b: u8) -> Result<Step> {
        match self.state {
            ScanState::Idle => {
                if b == PREFIX[0] {
                    self.state = ScanState::Prefix(1);
                } else {
                    self.out.write_all(&[b])?;
                }
                Ok(Step::Consumed)
            }
            ScanState::Prefix(matched) => {
                if b != PREFIX[matched] {
                    // A marker may still start inside the bytes matched so far
                    match prefix_restart(matched) {
                        Some(skip) => {
                            self.out.write_all(&PREFIX[..skip])?;
                            self.state = ScanState::Prefix(matched - skip);
                        }
                        None => self.flush_pending()?,
                    }
                    return Ok(Step::Retry);
                }
                self.state = if matched + 1 == PREFIX.len() {
                    ScanState::Key(0)
                } else {
                    ScanState::Prefix(matched + 1)
                };
                Ok(Step::Consumed)
            }
            ScanState::Key(captured) => {
                let Some(digit) = hex_value(b) else {
                    self.flush_pending()?;
                    return Ok(Step::Retry);
                };
                let prior = if captured == 0 { 0 } else { self.key_value };
                self.key[captured] = b;
                self.key_value = (prior << 4) | u64::from(digit);
                self.state = if captured + 1 == KEY_LEN {
                    ScanState::Suffix(0)
                } else {
                    ScanState::Key(captured + 1)
                };
                Ok(Step::Consumed)
            }
            ScanState::Suffix(matched) => {
                if b != SUFFIX[matched] {
                    self.flush_pending()?;
                    return Ok(Step::Retry);
                }
                if matched + 1 == SUFFIX.len() {
                    self.state = ScanState::Idle;
                    self.substitute()?;
                } else {
                    self.state = ScanState::Suffix(matched + 1);
                }
                Ok(Step::Consumed)
            }
        }
    }

    /// A complete marker was read: render its element or pass it through.
    fn substitute(&mut self) -> Result<()> {
        let key = ElementKey(self.key_value);
        match self.node.element_writer(key) {
            Some(element_writer) => {
                element_writer.write_to(&mut self.out, self.context)?;
            }
            None if self.config.strict => return Err(Error::UnresolvedMarker(key)),
            None => {
                log::warn!("element writer not found by key: {key} in {:?}", self.node.label());
                self.out.write_all(PREFIX)?;
                self.out.write_all(&self.key)?;
                self.out.write_all(SUFFIX)?;
            }
        }
        Ok(())
    }

    /// Write out whatever partial marker is buffered and return to `Idle`.
    fn flush_pending(&mut self) -> io::Result<()> {
        match mem::replace(&mut self.state, ScanState::Idle) {
            ScanState::Idle => {}
            ScanState::Prefix(matched) => self.out.write_all(&PREFIX[..matched])?,
            ScanState::Key(captured) => {
                self.out.write_all(PREFIX)?;
                self.out.write_all(&self.key[..captured])?;
            }
            ScanState::Suffix(matched) => {
                self.out.write_all(PREFIX)?;
                self.out.write_all(&self.key)?;
                self.out.write_all(&SUFFIX[..matched])?;
            }
        }
        Ok(())
    }

    /// Emit any trailing partial marker verbatim and flush the sink.
    ///
    /// The writer may keep being used afterwards; scanning restarts from a
    /// clean state.
    pub fn finish(&mut self) -> Result<()> {
        self.flush_pending()?;
        self.out.flush()?;
        Ok(())
    }

    /// Whether a partial marker is currently buffered.
    pub fn has_pending(&self) -> bool {
        self.state != ScanState::Idle
    }
}

/// Smallest `skip` such that the last `matched - skip` matched bytes are
/// themselves a prefix of the marker.
fn prefix_restart(matched: usize) -> Option<usize> {
    (1..matched).find(|&skip| PREFIX[skip..matched] == PREFIX[..matched - skip])
}

impl<W: Write> Write for MarkerWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.feed(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Pending bytes stay buffered; they may still turn into a marker
        self.out.flush()
    }
}

impl<W: Write> Drop for MarkerWriter<'_, W> {
    fn drop(&mut self) {
        if self.has_pending() {
            let _ = self.flush_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ids::IdAllocator;
    use crate::marker::{marker_string, push_marker};
    use crate::model::{Element, NullContext};

    fn node_with_child(body: &'static [u8]) -> (Node, ElementKey) {
        let node = Node::new();
        let key = node
            .add_child_element(
                &mut IdAllocator::new(),
                Element::heading("Child"),
                move |out: &mut dyn Write, _: &dyn ElementContext| out.write_all(body),
            )
            .unwrap();
        (node, key)
    }

    fn scan(node: &Node, chunks: &[&[u8]], config: ScanConfig) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut writer = MarkerWriter::with_config(node, &mut out, &NullContext, config);
            for chunk in chunks {
                writer.feed(chunk)?;
            }
            writer.finish()?;
        }
        Ok(out)
    }

    #[test]
    fn test_plain_text_passthrough() {
        let node = Node::new();
        let out = scan(&node, &[b"hello <b>world</b>"], ScanConfig::default()).unwrap();
        assert_eq!(out, b"hello <b>world</b>");
    }

    #[test]
    fn test_substitutes_marker() {
        let (node, key) = node_with_child(b"[child]");
        let body = format!("a{}b", marker_string(key));
        let out = scan(&node, &[body.as_bytes()], ScanConfig::default()).unwrap();
        assert_eq!(out, b"a[child]b");
    }

    #[test]
    fn test_marker_split_across_writes() {
        let (node, key) = node_with_child(b"[child]");
        let body = format!("a{}b", marker_string(key));
        let (left, right) = body.as_bytes().split_at(9);
        let out = scan(&node, &[left, right], ScanConfig::default()).unwrap();
        assert_eq!(out, b"a[child]b");
    }

    #[test]
    fn test_prefix_mismatch_reprocesses_byte() {
        let (node, key) = node_with_child(b"X");
        // The '<' that breaks the first partial prefix starts the real marker
        let mut body = String::from("<A");
        push_marker(key, &mut body);
        let body = body.replacen("<A<A<O", "<A<<A<O", 1);
        let out = scan(&node, &[body.as_bytes()], ScanConfig::default()).unwrap();
        assert_eq!(out, b"<A<X");
    }

    #[test]
    fn test_marker_overlapping_partial_prefix() {
        let (node, key) = node_with_child(b"X");
        for lead in ["<A", "<A<O", "<<A"] {
            let mut body = String::from(lead);
            push_marker(key, &mut body);
            let expected = format!("{lead}X");
            for split in 0..body.len() {
                let (left, right) = body.as_bytes().split_at(split);
                let out = scan(&node, &[left, right], ScanConfig::default()).unwrap();
                assert_eq!(out, expected.as_bytes(), "lead={lead:?} split={split}");
            }
        }
    }

    #[test]
    fn test_prefix_restart_points() {
        assert_eq!(prefix_restart(1), None);
        assert_eq!(prefix_restart(2), None);
        assert_eq!(prefix_restart(3), Some(2));
        assert_eq!(prefix_restart(5), Some(4));
        assert_eq!(prefix_restart(7), None);
    }

    #[test]
    fn test_non_hex_key_flushes_captured_digits() {
        let node = Node::new();
        let out = scan(&node, &[b"<A<O<ELEMENT 12zq"], ScanConfig::default()).unwrap();
        assert_eq!(out, b"<A<O<ELEMENT 12zq");
    }

    #[test]
    fn test_suffix_mismatch_flushes_matched_suffix() {
        let node = Node::new();
        let body = b"<A<O<ELEMENT 0123456789abcdef>O>X";
        let out = scan(&node, &[body], ScanConfig::default()).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_trailing_partial_flushed_on_finish() {
        let node = Node::new();
        for body in [
            &b"text <A<O<ELE"[..],
            &b"text <A<O<ELEMENT 0123"[..],
            &b"text <A<O<ELEMENT 0123456789abcdef>O"[..],
        ] {
            let out = scan(&node, &[body], ScanConfig::default()).unwrap();
            assert_eq!(out, body);
        }
    }

    #[test]
    fn test_trailing_partial_flushed_on_drop() {
        let node = Node::new();
        let mut out = Vec::new();
        {
            let mut writer = MarkerWriter::new(&node, &mut out, &NullContext);
            writer.write_all(b"end <A<O<").unwrap();
            assert!(writer.has_pending());
        }
        assert_eq!(out, b"end <A<O<");
    }

    #[test]
    fn test_unresolved_marker_passthrough() {
        let node = Node::new();
        let body = marker_string(ElementKey(7));
        let out = scan(&node, &[body.as_bytes()], ScanConfig::default()).unwrap();
        assert_eq!(out, body.as_bytes());
    }

    #[test]
    fn test_unresolved_marker_strict() {
        let node = Node::new();
        let body = marker_string(ElementKey(7));
        let err = scan(&node, &[body.as_bytes()], ScanConfig::new().with_strict(true)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMarker(ElementKey(7))));
    }

    #[test]
    fn test_key_decoded_after_abandoned_key() {
        let node = Node::new();
        let key = ElementKey(0xfedc_ba98_7654_3210);
        let body = format!("<A<O<ELEMENT ff{}", marker_string(key));
        let chunks: Vec<&[u8]> = body.as_bytes().chunks(1).collect();
        let err = scan(&node, &chunks, ScanConfig::new().with_strict(true)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMarker(k) if k == key));
    }

    #[test]
    fn test_writer_invoked_once_per_marker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let node = Node::new();
        let key = node
            .add_child_element(
                &mut IdAllocator::new(),
                Element::heading("Counted"),
                move |out: &mut dyn Write, _: &dyn ElementContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    out.write_all(b"!")
                },
            )
            .unwrap();
        let body = format!("{0}-{0}", marker_string(key));
        let out = scan(&node, &[body.as_bytes()], ScanConfig::default()).unwrap();
        assert_eq!(out, b"!-!");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_write_trait_reports_strict_failure() {
        let node = Node::new();
        let mut out = Vec::new();
        let mut writer = MarkerWriter::with_config(
            &node,
            &mut out,
            &NullContext,
            ScanConfig::new().with_strict(true),
        );
        let err = writer
            .write_all(marker_string(ElementKey(1)).as_bytes())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
