//! Framing of the `latexmk -deps` dependency listing
//!
//! latexmk prints a make-style rule between two marker comments:
//!
//! ```text
//! #===Dependents, and related info, for main:
//! main.pdf :\
//!     main.tex\
//!     figures/plot.pdf\
//! #===End dependents for main:
//! ```
//!
//! [`TraceReader`] skips everything before the start marker, checks the rule header,
//! then yields the dependency lines one by one as latexmk produces them.

use crate::error::{CollectError, Result};
use regex::Regex;
use std::io::{self, BufRead};
use std::path::PathBuf;

const STREAM_LABEL: &str = "<latexmk output>";

/// Where the reader is in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    ScanningPreamble,
    InDependencyBlock,
    Draining,
    Done,
}

/// Lazy reader over the build tool's stdout.
///
/// Iterating yields each raw dependency line (terminator removed) in the order it was
/// emitted. Iteration stops at the end marker or after the first error.
pub struct TraceReader<R> {
    reader: R,
    start_marker: Regex,
    header: String,
    end_marker: String,
    state: TraceState,
    buf: Vec<u8>,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R, base_name: &str) -> Self {
        let start_marker = Regex::new(&format!(
            r"^#===Dependents(, and related info,)? for {}:$",
            regex::escape(base_name)
        ))
        .expect("escaped marker pattern is valid");

        Self {
            reader,
            start_marker,
            header: format!("{base_name}.pdf :\\"),
            end_marker: format!("#===End dependents for {base_name}:"),
            state: TraceState::ScanningPreamble,
            buf: Vec::new(),
        }
    }

    pub fn state(&self) -> TraceState {
        self.state
    }

    /// Skip to the start marker and validate the rule header that follows it.
    ///
    /// Called implicitly by the first `next()`; calling it again is a no-op.
    pub fn open_block(&mut self) -> Result<()> {
        if self.state != TraceState::ScanningPreamble {
            return Ok(());
        }

        loop {
            let Some(line) = self.next_line()? else {
                self.state = TraceState::Done;
                return Err(CollectError::eof("the start of the dependency listing"));
            };
            if self.start_marker.is_match(&line) {
                break;
            }
        }

        let Some(line) = self.next_line()? else {
            self.state = TraceState::Done;
            return Err(CollectError::eof(format!("the {:?} rule header", self.header)));
        };
        if line.trim() != self.header {
            self.state = TraceState::Done;
            return Err(CollectError::MalformedHeader {
                expected: self.header.clone(),
                found: line.trim().to_string(),
            });
        }

        tracing::debug!("found dependency listing");
        self.state = TraceState::InDependencyBlock;
        Ok(())
    }

    /// Discard everything left in the stream so the child never blocks on a full pipe.
    ///
    /// Returns the number of bytes thrown away.
    pub fn drain(&mut self) -> Result<u64> {
        self.state = TraceState::Draining;
        let discarded = io::copy(&mut self.reader, &mut io::sink())
            .map_err(|e| CollectError::io(PathBuf::from(STREAM_LABEL), e))?;
        self.state = TraceState::Done;
        Ok(discarded)
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| CollectError::io(PathBuf::from(STREAM_LABEL), e))?;
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            TraceState::ScanningPreamble => {
                if let Err(e) = self.open_block() {
                    return Some(Err(e));
                }
            }
            TraceState::InDependencyBlock => {}
            TraceState::Draining | TraceState::Done => return None,
        }

        match self.next_line() {
            Ok(Some(line)) if line == self.end_marker => {
                self.state = TraceState::Draining;
                None
            }
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.state = TraceState::Done;
                Some(Err(CollectError::eof(format!("{:?}", self.end_marker))))
            }
            Err(e) => {
                self.state = TraceState::Done;
                Some(Err(e))
            }
        }
    }
}
