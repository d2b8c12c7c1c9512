// plandiff-core/src/audit/assembler.rs

use std::borrow::Cow;
use std::io::{self, BufRead};

/// Substring that marks the first line of an audit record.
pub const START_MARKER: &str = "query] |Client";

/// One framed audit record before field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number of the record's first line.
    pub line: usize,
    /// All physical lines of the record joined by a single space.
    pub text: String,
}

/// Stateful line folder. A record is only complete once the next start
/// marker (or the end of input, via [`RecordFramer::finish`]) is seen.
#[derive(Debug, Default)]
pub struct RecordFramer {
    buf: String,
    start_line: usize,
    line_no: usize,
}

impl RecordFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one physical line; returns the previous record when `line` opens a
    /// new one.
    pub fn push(&mut self, line: &str) -> Option<RawRecord> {
        self.line_no += 1;
        if line.contains(START_MARKER) {
            let done = self.take();
            self.start_line = self.line_no;
            self.append(line);
            return done;
        }
        if self.buf.is_empty() {
            self.start_line = self.line_no;
        }
        self.append(line);
        None
    }

    /// Flush the trailing record at end of input.
    pub fn finish(&mut self) -> Option<RawRecord> {
        self.take()
    }

    fn append(&mut self, line: &str) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(line);
    }

    fn take(&mut self) -> Option<RawRecord> {
        if self.buf.trim().is_empty() {
            self.buf.clear();
            return None;
        }
        Some(RawRecord {
            line: self.start_line,
            text: std::mem::take(&mut self.buf),
        })
    }
}

/// Lazy iterator of framed records over a line source. Not restartable.
pub struct AuditRecords<I> {
    lines: I,
    framer: RecordFramer,
    done: bool,
}

impl<I> AuditRecords<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            framer: RecordFramer::new(),
            done: false,
        }
    }
}

impl<R: BufRead> AuditRecords<LossyLines<R>> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(LossyLines::new(reader))
    }
}

/// Line reader that tolerates bytes outside UTF-8. Logged statements may
/// carry literals in any client encoding; invalid sequences become U+FFFD
/// instead of ending the stream. Line terminators (`\n`, `\r\n`) are stripped.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let line = match String::from_utf8_lossy(&self.buf) {
                    Cow::Borrowed(text) => text.to_string(),
                    Cow::Owned(text) => {
                        tracing::warn!(line = self.line_no, "invalid UTF-8 in audit log, replaced");
                        text
                    }
                };
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl<I> Iterator for AuditRecords<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Some(rec) = self.framer.push(&line) {
                        return Some(Ok(rec));
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    return self.framer.finish().map(Ok);
                }
            }
        }
    }
}
