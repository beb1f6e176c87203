//! # iterdns Protocol Library
//!
//! DNS wire format types used by the iterative resolver: domain names,
//! record types and classes, headers, questions, RRsets and messages.
//!
//! ## Features
//!
//! - **RFC 1035 wire format** parsing with compression pointer handling
//! - **Name relations** (equal, subdomain, superdomain, common ancestor)
//!   used for zone-cut and bailiwick checks
//! - **Typed RDATA** for the types resolution depends on, opaque bytes
//!   (RFC 3597 generic presentation) for everything else
//! - **RRset grouping** of message sections
//!
//! ## Example
//!
//! ```rust,ignore
//! use iterdns_proto::{Message, Question, Name, RecordType, RecordClass};
//!
//! let question = Question::new(Name::from_str("example.com.")?, RecordType::A, RecordClass::IN);
//! let wire = Message::query(0x1234, question).to_wire();
//! let parsed = Message::parse(&wire)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod class;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod opcode;
pub mod question;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;
pub mod wire;

// Re-exports for convenience
pub use class::{Class, RecordClass};
pub use error::{Error, Result};
pub use header::{Header, HeaderFlags};
pub use message::Message;
pub use name::{Name, NameRelation};
pub use opcode::OpCode;
pub use question::Question;
pub use rcode::ResponseCode;
pub use rdata::RData;
pub use record::{RRset, ResourceRecord};
pub use rtype::{RecordType, Type};

/// Maximum length of a DNS label (63 bytes per RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a domain name (255 bytes per RFC 1035)
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum size of a UDP DNS message without EDNS0 (512 bytes per RFC 1035)
pub const MAX_UDP_MESSAGE_SIZE: usize = 512;

/// DNS port (53)
pub const DNS_PORT: u16 = 53;
