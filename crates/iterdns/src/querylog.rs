//! Query trace parsing and popularity aggregation.
//!
//! Trace lines look like
//! `<timestamp> <client_ip>#<port> <qname> <qclass> <qtype>`.

use anyhow::{anyhow, Context, Result};
use hashbrown::HashMap;
use iterdns_proto::{Class, Name, Question, Type};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::warn;

static RE_LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\d\.]*) ([\d\.]*)#\d+ (\S*) (\S*) (\S*)$").expect("valid log line regex")
});

/// One parsed trace line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Query time as Unix seconds.
    pub time: f64,
    /// Client address as logged.
    pub client: String,
    /// The question asked.
    pub question: Question,
}

/// Parses one trace line.
pub fn parse_log_line(line: &str) -> Result<LogEntry> {
    let caps = RE_LOG_LINE
        .captures(line)
        .ok_or_else(|| anyhow!("unexpected line: {line}"))?;

    let time = caps[1]
        .parse::<f64>()
        .with_context(|| format!("bad timestamp '{}'", &caps[1]))?;
    let qname = Name::from_str(&caps[3]).context("bad query name")?;
    let qclass = Class::from_str(&caps[4]).context("bad query class")?;
    let qtype = Type::from_str(&caps[5]).context("bad query type")?;

    Ok(LogEntry {
        time,
        client: caps[2].to_string(),
        question: Question::new(qname, qtype, qclass),
    })
}

/// Unique questions of a trace with their query counts.
#[derive(Debug, Default)]
pub struct QueryLog {
    total: usize,
    counts: Vec<(Question, usize)>,
    index: HashMap<Question, usize>,
}

impl QueryLog {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a whole trace.
    ///
    /// Unparsable lines are logged and count towards the total only.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut log = Self::new();
        for line in reader.lines() {
            let line = line.context("failed to read query log")?;
            log.total += 1;
            match parse_log_line(&line) {
                Ok(entry) => log.record(entry.question),
                Err(e) => warn!(error = %e, "skipping log line"),
            }
        }
        Ok(log)
    }

    /// Counts one query for `question`.
    pub fn add(&mut self, question: Question) {
        self.total += 1;
        self.record(question);
    }

    fn record(&mut self, question: Question) {
        match self.index.get(&question) {
            Some(&pos) => self.counts[pos].1 += 1,
            None => {
                self.index.insert(question.clone(), self.counts.len());
                self.counts.push((question, 1));
            }
        }
    }

    /// Returns the number of trace lines seen.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of distinct questions.
    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    /// Returns the questions by descending popularity; ties keep trace
    /// order.
    pub fn by_popularity(&self) -> Vec<(&Question, usize)> {
        let mut sorted: Vec<_> = self.counts.iter().map(|(q, n)| (q, *n)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }

    /// Writes `position,cumulative-percent` rows.
    pub fn write_popularity<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut cumulative = 0usize;
        for (position, (_, count)) in self.by_popularity().into_iter().enumerate() {
            cumulative += count;
            let percent = cumulative as f64 / self.total as f64 * 100.0;
            writeln!(writer, "{},{:.2}", position + 1, percent)?;
        }
        Ok(())
    }

    /// Writes the questions as a query file.
    pub fn write_queries<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (question, count) in self.by_popularity() {
            write_query_line(writer, question, count)?;
        }
        Ok(())
    }
}

/// Writes one `<count>/<class>/<type>/<name>` line.
pub fn write_query_line<W: Write>(writer: &mut W, question: &Question, count: usize) -> Result<()> {
    writeln!(
        writer,
        "{}/{}/{}/{}",
        count, question.qclass, question.qtype, question.qname
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queryfile::parse_query_line;
    use iterdns_proto::RecordType;
    use std::io::Cursor;

    const TRACE: &str = "\
1334718000.123 192.0.2.1#53124 www.example.com IN A
1334718000.500 192.0.2.2#1024 www.example.com IN A
1334718001.000 192.0.2.1#53125 example.org IN MX
garbage
1334718002.250 192.0.2.3#4000 WWW.EXAMPLE.COM IN A
1334718003.000 192.0.2.3#4001 example.org IN ANY
";

    #[test]
    fn test_parse_log_line() {
        let entry = parse_log_line("1334718000.123 192.0.2.1#53124 www.example.com IN AAAA").unwrap();
        assert!((entry.time - 1334718000.123).abs() < 1e-6);
        assert_eq!(entry.client, "192.0.2.1");
        assert!(entry.question.qtype.is(RecordType::AAAA));

        assert!(parse_log_line("1334718000 www.example.com IN A").is_err());
    }

    #[test]
    fn test_aggregate_by_popularity() {
        let log = QueryLog::read(Cursor::new(TRACE)).unwrap();
        assert_eq!(log.total(), 6);
        assert_eq!(log.unique(), 3);

        let sorted = log.by_popularity();
        assert_eq!(sorted[0].0.qname.to_string(), "www.example.com.");
        assert_eq!(sorted[0].1, 3);
        assert!(sorted[1].0.qtype.is(RecordType::MX));
        assert!(sorted[2].0.qtype.is(RecordType::ANY));
    }

    #[test]
    fn test_write_popularity() {
        let log = QueryLog::read(Cursor::new(TRACE)).unwrap();
        let mut out = Vec::new();
        log.write_popularity(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1,50.00\n2,66.67\n3,83.33\n");
    }

    #[test]
    fn test_write_queries_is_a_query_file() {
        let mut log = QueryLog::new();
        let question = parse_query_line("0/IN/A/a.example.").unwrap();
        log.add(question.clone());
        log.add(question);

        let mut out = Vec::new();
        log.write_queries(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "2/IN/A/a.example.\n");
        assert!(parse_query_line(text.trim_end()).is_ok());
    }
}
