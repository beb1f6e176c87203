//! Query file reader.
//!
//! A query file holds one question per line as
//! `<count>/<class>/<type>/<name>`, most popular first. This is the format
//! the `querylog` subcommand writes with `--dump-queries`.

use anyhow::{anyhow, Context, Result};
use iterdns_proto::{Class, Name, Question, Type};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::BufRead;
use std::str::FromStr;
use tracing::warn;

static RE_QUERY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d*/([^/]*)/([^/]*)/(.*)$").expect("valid query line regex")
});

/// Parses one query file line.
pub fn parse_query_line(line: &str) -> Result<Question> {
    let caps = RE_QUERY_LINE
        .captures(line)
        .ok_or_else(|| anyhow!("unexpected query line: {line}"))?;

    let qclass = Class::from_str(&caps[1]).context("bad query class")?;
    let qtype = Type::from_str(&caps[2]).context("bad query type")?;
    let qname = Name::from_str(&caps[3]).context("bad query name")?;
    Ok(Question::new(qname, qtype, qclass))
}

/// Iterates the questions of a query file.
///
/// Reading stops at the first malformed line, which is logged and kept in
/// [`QueryFile::malformed`].
#[derive(Debug)]
pub struct QueryFile<R> {
    reader: R,
    line_no: usize,
    malformed: Option<usize>,
    buf: String,
}

impl<R: BufRead> QueryFile<R> {
    /// Wraps a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            malformed: None,
            buf: String::new(),
        }
    }

    /// Returns the number of the line that ended the input early, if any.
    pub fn malformed(&self) -> Option<usize> {
        self.malformed
    }

    /// Returns the number of lines read so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for QueryFile<R> {
    type Item = Question;

    fn next(&mut self) -> Option<Question> {
        if self.malformed.is_some() {
            return None;
        }

        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => return None,
            Ok(_) => self.line_no += 1,
            Err(e) => {
                warn!(line = self.line_no + 1, error = %e, "failed to read query file");
                self.malformed = Some(self.line_no + 1);
                return None;
            }
        }

        match parse_query_line(self.buf.trim_end_matches(['\r', '\n'])) {
            Ok(question) => Some(question),
            Err(e) => {
                warn!(line = self.line_no, error = %e, "malformed query line, stopping");
                self.malformed = Some(self.line_no);
                None
            }
        }
    }
}
