//! DNS Wire Format
//!
//! Minimal codec for what the responder needs: reading the header and the
//! single question of a query, and writing A-record responses and
//! error responses. Passthrough traffic is never decoded beyond the question.

use std::net::Ipv4Addr;
use thiserror::Error;

use crate::types::{AddressAnswer, RecordType, CLASS_IN};

/// DNS packet constants
pub const DNS_HEADER_SIZE: usize = 12;
const MAX_LABEL_LEN: usize = 63;

/// DNS flags
const FLAG_QR: u16 = 0x8000; // Query/Response
const FLAG_AA: u16 = 0x0400; // Authoritative Answer
const FLAG_TC: u16 = 0x0200; // Truncated
const FLAG_RD: u16 = 0x0100; // Recursion Desired
const FLAG_RA: u16 = 0x0080; // Recursion Available
const OPCODE_MASK: u16 = 0x7800;

/// Compression pointer to the question name at offset 12
const QUESTION_NAME_PTR: u16 = 0xC000 | DNS_HEADER_SIZE as u16;

/// Size of one A record using a compressed owner name
const A_RECORD_SIZE: usize = 16;

/// Response codes the responder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Rcode {
    NoError = 0,
    FormErr = 1,
    ServFail = 2,
    NotImp = 4,
}

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("message shorter than a DNS header ({0} bytes)")]
    ShortHeader(usize),

    #[error("truncated question section")]
    TruncatedQuestion,

    #[error("invalid label length {0}")]
    InvalidLabel(u8),

    #[error("expected exactly one question, got {0}")]
    QuestionCount(u16),

    #[error("message is a response, not a query")]
    NotAQuery,

    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u8),

    #[error("synthesized address {0:?} is not a valid IPv4 address")]
    InvalidAddress(String),
}

/// Fixed 12-byte message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < DNS_HEADER_SIZE {
            return Err(WireError::ShortHeader(data.len()));
        }
        Ok(Self {
            id: u16::from_be_bytes([data[0], data[1]]),
            flags: u16::from_be_bytes([data[2], data[3]]),
            qdcount: u16::from_be_bytes([data[4], data[5]]),
            ancount: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags & OPCODE_MASK) >> 11) as u8
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & 0x000F) as u8
    }
}

/// The single question of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dotted name as sent, without the trailing root dot
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

/// A decoded query: header, question, and where the question ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub header: Header,
    pub question: Question,
    /// Offset just past the question section
    pub question_end: usize,
}

/// Decode the header and single question of an inbound query
pub fn parse_request(data: &[u8]) -> Result<Request, WireError> {
    let header = Header::parse(data)?;

    if header.is_response() {
        return Err(WireError::NotAQuery);
    }
    if header.opcode() != 0 {
        return Err(WireError::UnsupportedOpcode(header.opcode()));
    }
    if header.qdcount != 1 {
        return Err(WireError::QuestionCount(header.qdcount));
    }

    let (question, len) = parse_question(&data[DNS_HEADER_SIZE..])?;

    Ok(Request {
        header,
        question,
        question_end: DNS_HEADER_SIZE + len,
    })
}

/// Parse DNS question section
fn parse_question(data: &[u8]) -> Result<(Question, usize), WireError> {
    let mut name_parts = Vec::new();
    let mut offset = 0;

    // Parse name labels; compression pointers never appear in a question
    loop {
        let len = *data.get(offset).ok_or(WireError::TruncatedQuestion)? as usize;
        if len == 0 {
            offset += 1;
            break;
        }

        if len > MAX_LABEL_LEN {
            return Err(WireError::InvalidLabel(len as u8));
        }

        offset += 1;
        let label = data
            .get(offset..offset + len)
            .ok_or(WireError::TruncatedQuestion)?;
        name_parts.push(String::from_utf8_lossy(label).into_owned());
        offset += len;
    }

    let fixed = data
        .get(offset..offset + 4)
        .ok_or(WireError::TruncatedQuestion)?;
    let qtype = u16::from_be_bytes([fixed[0], fixed[1]]);
    let qclass = u16::from_be_bytes([fixed[2], fixed[3]]);
    offset += 4;

    let question = Question {
        name: name_parts.join("."),
        qtype: RecordType::from(qtype),
        qclass,
    };

    Ok((question, offset))
}

/// Response flags: QR and AA set, opcode and RD echoed, RA advertised
fn response_flags(request_flags: u16, rcode: Rcode) -> u16 {
    FLAG_QR | FLAG_AA | FLAG_RA | (request_flags & (OPCODE_MASK | FLAG_RD)) | rcode as u16
}

/// Build an A-record response to `request`, whose raw bytes are `raw`.
///
/// The question is copied verbatim from the request. Records that would
/// push the message past `max_size` are left out and TC is set.
pub fn build_answer_response(
    request: &Request,
    raw: &[u8],
    answers: &[AddressAnswer],
    max_size: usize,
) -> Result<Vec<u8>, WireError> {
    let addrs = answers
        .iter()
        .map(|a| {
            a.address
                .parse::<Ipv4Addr>()
                .map(|ip| (ip, a.ttl))
                .map_err(|_| WireError::InvalidAddress(a.address.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let question = &raw[DNS_HEADER_SIZE..request.question_end];
    let room = max_size.saturating_sub(DNS_HEADER_SIZE + question.len()) / A_RECORD_SIZE;
    let fitting = addrs.len().min(room);

    let mut flags = response_flags(request.header.flags, Rcode::NoError);
    if fitting < addrs.len() {
        flags |= FLAG_TC;
    }

    let mut response = Vec::with_capacity(DNS_HEADER_SIZE + question.len() + fitting * A_RECORD_SIZE);

    // Build header
    response.extend_from_slice(&request.header.id.to_be_bytes());
    response.extend_from_slice(&flags.to_be_bytes());
    response.extend_from_slice(&1u16.to_be_bytes()); // qdcount = 1
    response.extend_from_slice(&(fitting as u16).to_be_bytes()); // ancount
    response.extend_from_slice(&0u16.to_be_bytes()); // nscount = 0
    response.extend_from_slice(&0u16.to_be_bytes()); // arcount = 0

    response.extend_from_slice(question);

    for (ip, ttl) in &addrs[..fitting] {
        response.extend_from_slice(&QUESTION_NAME_PTR.to_be_bytes());
        response.extend_from_slice(&u16::from(RecordType::A).to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&ttl.to_be_bytes());
        response.extend_from_slice(&4u16.to_be_bytes()); // rdlength
        response.extend_from_slice(&ip.octets());
    }

    Ok(response)
}

/// Build an answerless response carrying `rcode`.
///
/// The question is echoed when it can be decoded. Returns `None` when the
/// message is too short to even carry a transaction ID worth answering.
pub fn build_error_response(raw: &[u8], rcode: Rcode) -> Option<Vec<u8>> {
    let header = Header::parse(raw).ok()?;

    let question = if header.qdcount == 1 {
        parse_question(&raw[DNS_HEADER_SIZE..])
            .ok()
            .map(|(_, len)| &raw[DNS_HEADER_SIZE..DNS_HEADER_SIZE + len])
    } else {
        None
    };

    let flags = response_flags(header.flags, rcode);
    let qdcount: u16 = if question.is_some() { 1 } else { 0 };

    let mut response = Vec::with_capacity(DNS_HEADER_SIZE + question.map_or(0, <[u8]>::len));
    response.extend_from_slice(&header.id.to_be_bytes());
    response.extend_from_slice(&flags.to_be_bytes());
    response.extend_from_slice(&qdcount.to_be_bytes());
    response.extend_from_slice(&[0u8; 6]); // ancount, nscount, arcount
    if let Some(question) = question {
        response.extend_from_slice(question);
    }

    Some(response)
}

/// Encoders and decoders used by tests to play client and upstream
#[cfg(test)]
pub mod testing {
    use super::*;

    /// Encode a single-question query
    pub fn build_query(id: u16, name: &str, qtype: RecordType) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&id.to_be_bytes());
        data.extend_from_slice(&FLAG_RD.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 6]);
        for part in name.split('.').filter(|p| !p.is_empty()) {
            data.push(part.len() as u8);
            data.extend_from_slice(part.as_bytes());
        }
        data.push(0);
        data.extend_from_slice(&u16::from(qtype).to_be_bytes());
        data.extend_from_slice(&CLASS_IN.to_be_bytes());
        data
    }

    /// Decode the A records of a response built by this module
    pub fn read_a_answers(response: &[u8]) -> (Header, Vec<(Ipv4Addr, u32)>) {
        let header = Header::parse(response).unwrap();
        let (_, qlen) = parse_question(&response[DNS_HEADER_SIZE..]).unwrap();
        let mut offset = DNS_HEADER_SIZE + qlen;
        let mut answers = Vec::new();
        for _ in 0..header.ancount {
            let rr = &response[offset..offset + A_RECORD_SIZE];
            assert_eq!(u16::from_be_bytes([rr[0], rr[1]]), QUESTION_NAME_PTR);
            assert_eq!(u16::from_be_bytes([rr[2], rr[3]]), 1);
            let ttl = u32::from_be_bytes([rr[6], rr[7], rr[8], rr[9]]);
            answers.push((Ipv4Addr::new(rr[12], rr[13], rr[14], rr[15]), ttl));
            offset += A_RECORD_SIZE;
        }
        (header, answers)
    }
}
