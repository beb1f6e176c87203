//! DNS message representation.
//!
//! A DNS message consists of a header, question section, and three
//! resource record sections (answer, authority, additional). Record
//! sections are held as [`RRset`]s in order of first appearance.

use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::question::Question;
use crate::rcode::ResponseCode;
use crate::record::{RRset, RecordParser};
use crate::rtype::RecordType;
use crate::wire::WireReader;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<RRset>,
    authority: Vec<RRset>,
    additional: Vec<RRset>,
}

impl Message {
    /// Creates a new empty message with the given header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Creates an iterative (RD clear) query message.
    pub fn query(id: u16, question: Question) -> Self {
        let mut msg = Self::new(Header::query(id));
        msg.questions.push(question);
        msg
    }

    /// Creates a response message from a query.
    pub fn response_from(query: &Message) -> Self {
        let mut msg = Self::new(Header::response_from(&query.header));
        msg.questions = query.questions.clone();
        msg
    }

    // =========================================================================
    // Header accessors
    // =========================================================================

    /// Returns the message header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a mutable reference to the header.
    #[inline]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the message ID.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Returns the response code.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    #[inline]
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// Returns true if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    /// Returns true if the response is authoritative.
    #[inline]
    pub fn is_authoritative(&self) -> bool {
        self.header.is_authoritative()
    }

    // =========================================================================
    // Sections
    // =========================================================================

    /// Returns the questions.
    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns the first question.
    #[inline]
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the answer section.
    #[inline]
    pub fn answers(&self) -> &[RRset] {
        &self.answers
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[RRset] {
        &self.authority
    }

    /// Returns the additional section.
    #[inline]
    pub fn additional(&self) -> &[RRset] {
        &self.additional
    }

    /// Adds a question.
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Adds an RRset to the answer section.
    pub fn add_answer(&mut self, rrset: RRset) {
        self.answers.push(rrset);
    }

    /// Adds an RRset to the authority section.
    pub fn add_authority(&mut self, rrset: RRset) {
        self.authority.push(rrset);
    }

    /// Adds an RRset to the additional section.
    pub fn add_additional(&mut self, rrset: RRset) {
        self.additional.push(rrset);
    }

    /// Returns the first authority RRset of the given type.
    pub fn find_authority(&self, rtype: RecordType) -> Option<&RRset> {
        self.authority.iter().find(|set| set.rtype().is(rtype))
    }

    // =========================================================================
    // Wire format
    // =========================================================================

    /// Parses a DNS message from wire format.
    ///
    /// OPT pseudo-records are dropped from the additional section; bytes
    /// after the last record are an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;

        let mut reader = WireReader::new(data);
        reader.advance(HEADER_SIZE)?;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            questions.push(Question::read(&mut reader)?);
        }

        let answers = RecordParser::new(&mut reader, header.an_count).collect_all()?;
        let authority = RecordParser::new(&mut reader, header.ns_count).collect_all()?;
        let mut additional = RecordParser::new(&mut reader, header.ar_count).collect_all()?;
        additional.retain(|r| !r.rtype().is(RecordType::OPT));

        if !reader.is_empty() {
            return Err(Error::TrailingData {
                count: reader.remaining(),
            });
        }

        Ok(Self {
            header,
            questions,
            answers: RRset::group(answers),
            authority: RRset::group(authority),
            additional: RRset::group(additional),
        })
    }

    /// Returns the wire format length of this message.
    pub fn wire_len(&self) -> usize {
        let sections = [&self.answers, &self.authority, &self.additional];
        HEADER_SIZE
            + self.questions.iter().map(Question::wire_len).sum::<usize>()
            + sections
                .iter()
                .flat_map(|section| section.iter())
                .flat_map(|set| set.records())
                .map(|r| r.wire_len())
                .sum::<usize>()
    }

    /// Writes the message to wire format, without name compression.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let count = |section: &[RRset]| section.iter().map(RRset::len).sum::<usize>() as u16;

        let mut header = self.header.clone();
        header.qd_count = self.questions.len() as u16;
        header.an_count = count(&self.answers);
        header.ns_count = count(&self.authority);
        header.ar_count = count(&self.additional);
        buf.extend_from_slice(&header.to_wire());

        for q in &self.questions {
            q.write_to(buf);
        }
        for section in [&self.answers, &self.authority, &self.additional] {
            for record in section.iter().flat_map(|set| set.records()) {
                record.write_to(buf);
            }
        }
    }

    /// Converts the message to wire format bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Header::default())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; ->>HEADER<<- {}", self.header)?;

        writeln!(f, "\n;; QUESTION SECTION:")?;
        for q in &self.questions {
            writeln!(f, ";{q}")?;
        }

        let sections = [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authority),
            ("ADDITIONAL", &self.additional),
        ];
        for (title, section) in sections {
            if !section.is_empty() {
                writeln!(f, "\n;; {title} SECTION:")?;
                for set in section.iter() {
                    writeln!(f, "{set}")?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::name::Name;
    use crate::rdata::RData;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn question() -> Question {
        Question::new(name("www.example.com"), RecordType::A, Class::IN)
    }

    #[test]
    fn test_query_wire() {
        let query = Message::query(0x4242, question());
        let wire = query.to_wire();

        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.id(), 0x4242);
        assert!(!parsed.is_response());
        assert!(!parsed.header().recursion_desired());
        assert_eq!(parsed.question(), Some(&question()));
    }

    #[test]
    fn test_response_sections() {
        let query = Message::query(1, question());
        let mut response = Message::response_from(&query);
        response.header_mut().set_authoritative(true);
        response.add_answer(RRset::with_rdatas(
            name("www.example.com"),
            RecordType::A,
            Class::IN,
            300,
            vec![
                RData::A(Ipv4Addr::new(192, 0, 2, 1)),
                RData::A(Ipv4Addr::new(192, 0, 2, 2)),
            ],
        ));
        response.add_authority(RRset::with_rdatas(
            name("example.com"),
            RecordType::NS,
            Class::IN,
            3600,
            vec![RData::NS(name("ns.example.com"))],
        ));

        let wire = response.to_wire();
        assert_eq!(wire.len(), response.wire_len());

        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.header().an_count, 2);
        assert_eq!(parsed.answers().len(), 1);
        assert_eq!(parsed.answers()[0].len(), 2);
        assert!(parsed.find_authority(RecordType::NS).is_some());
        assert!(parsed.find_authority(RecordType::SOA).is_none());
    }

    #[test]
    fn test_trailing_data_rejected() {
        let mut wire = BytesMut::new();
        Message::query(1, question()).write_to(&mut wire);
        wire.extend_from_slice(&[0xAB]);

        assert!(matches!(
            Message::parse(&wire),
            Err(Error::TrailingData { count: 1 })
        ));
    }

    #[test]
    fn test_short_message_rejected() {
        assert!(Message::parse(&[0; 5]).is_err());
    }

    #[test]
    fn test_display_sections() {
        let mut response = Message::response_from(&Message::query(9, question()));
        response.add_answer(RRset::with_rdatas(
            name("www.example.com"),
            RecordType::A,
            Class::IN,
            60,
            vec![RData::A(Ipv4Addr::new(192, 0, 2, 9))],
        ));

        let text = response.to_string();
        assert!(text.contains(";; ANSWER SECTION:"));
        assert!(text.contains("www.example.com. 60 IN A 192.0.2.9"));
        assert!(!text.contains("AUTHORITY"));
    }
}
