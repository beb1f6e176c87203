//! Response validation and classification.

use iterdns_proto::{Message, Name, Question, RecordType, ResponseCode, Type};
use thiserror::Error;

/// The shape of a validated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Authoritative answer (AA set).
    Answer,
    /// Non-authoritative NOERROR response whose first answer is a CNAME.
    /// Some servers answer this way while following an alias.
    CnameAnswer,
    /// NOERROR or NXDOMAIN with empty answer and authority sections.
    Negative,
    /// Non-authoritative NOERROR response, expected to carry a delegation.
    Referral,
    /// Anything else.
    Unexpected(ResponseCode),
}

impl ResponseClass {
    /// Returns the label used for metrics.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::CnameAnswer => "cname_answer",
            Self::Negative => "negative",
            Self::Referral => "referral",
            Self::Unexpected(_) => "lame",
        }
    }
}

/// Classifies a response that already passed [`validate`].
pub fn classify(response: &Message) -> ResponseClass {
    let rcode = response.rcode();
    let answers = response.answers();

    let cname_first = rcode == ResponseCode::NoError
        && answers.first().is_some_and(|set| set.rtype().is_cname());

    if response.is_authoritative() {
        ResponseClass::Answer
    } else if cname_first {
        ResponseClass::CnameAnswer
    } else if answers.is_empty()
        && response.authority().is_empty()
        && matches!(rcode, ResponseCode::NoError | ResponseCode::NXDomain)
    {
        ResponseClass::Negative
    } else if rcode == ResponseCode::NoError {
        ResponseClass::Referral
    } else {
        ResponseClass::Unexpected(rcode)
    }
}

/// Why a server's response was rejected.
///
/// A lame response moves the context on to its next candidate server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum Lame {
    #[error("received query when expecting a response")]
    NotResponse,

    #[error("unexpected number of questions in response: {0}")]
    QuestionCount(usize),

    #[error("query mismatch, actual={0}")]
    QuestionMismatch(Question),

    #[error("query id mismatch, expected={expected}, actual={actual}")]
    IdMismatch { expected: u16, actual: u16 },

    #[error("no answer found in answer section")]
    NoAnswer,

    #[error("unexpected answer rcode={0}")]
    AnswerRcode(ResponseCode),

    #[error("delegation to {owner} not for a subdomain of {zone}")]
    NotSubdomain { owner: Name, zone: Name },

    #[error("delegation with no NS")]
    NoDelegation,

    #[error("no further recursion possible")]
    NoFurtherRecursion,

    #[error("unexpected rcode={0}")]
    Rcode(ResponseCode),
}

/// Checks that `response` answers `question` under transaction `qid`.
pub(crate) fn validate(response: &Message, question: &Question, qid: u16) -> Result<(), Lame> {
    if !response.is_response() {
        return Err(Lame::NotResponse);
    }

    let questions = response.questions();
    if questions.len() != 1 {
        return Err(Lame::QuestionCount(questions.len()));
    }
    if !questions[0].matches(question) {
        return Err(Lame::QuestionMismatch(questions[0].clone()));
    }

    if response.id() != qid {
        return Err(Lame::IdMismatch {
            expected: qid,
            actual: response.id(),
        });
    }
    Ok(())
}

/// Returns true for the address types accepted as glue.
pub(crate) fn is_address(rtype: Type) -> bool {
    rtype.is(RecordType::A) || rtype.is(RecordType::AAAA)
}
