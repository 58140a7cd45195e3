//! Fixed-layout command records exchanged over the UDP control channel.
//!
//! All numbers are in network byte order (BE):
//! ```ascii
//! simple record:
//! 0:  command: 10 bytes ASCII, right-padded with NUL
//! 10: sequence number: u64, chosen by the client and echoed in replies
//! 18: payload: rest of the datagram (filename, substring filter, listing, ...)
//!
//! complex record:
//! 0:  command: 10 bytes ASCII, right-padded with NUL
//! 10: sequence number: u64
//! 18: parameter: u64 (declared file size in upload requests; TCP port or free
//!      space in replies)
//! 26: payload: rest of the datagram
//! ```
//!
//! A datagram shorter than the fixed part of its record is malformed and dropped without
//!  a reply; a well-formed record carrying an unknown or misused command is answered with
//!  an [`commands::INVALID`] reply.

use anyhow::bail;
use bytes::{Buf, BufMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use std::fmt::{Debug, Formatter};

/// Largest UDP payload the control socket accepts or produces.
pub const MAX_DATAGRAM_LEN: usize = 65507;

pub const CMD_FIELD_LEN: usize = 10;
pub const SIMPLE_HEADER_LEN: usize = CMD_FIELD_LEN + size_of::<u64>();
pub const COMPLEX_HEADER_LEN: usize = SIMPLE_HEADER_LEN + size_of::<u64>();

pub const MAX_SIMPLE_PAYLOAD_LEN: usize = MAX_DATAGRAM_LEN - SIMPLE_HEADER_LEN;
pub const MAX_COMPLEX_PAYLOAD_LEN: usize = MAX_DATAGRAM_LEN - COMPLEX_HEADER_LEN;

/// The command vocabulary, as it appears in the 10-byte command field.
pub mod commands {
    /// discover request (simple, empty payload)
    pub const DISCOVER: &str = "HELLO";
    /// discover reply (complex: param = available space, payload = multicast address)
    pub const DISCOVER_REPLY: &str = "GOOD_DAY";
    /// search request (simple, payload = substring filter, may be empty)
    pub const SEARCH: &str = "LIST";
    /// search reply (simple, payload = newline-joined filenames)
    pub const SEARCH_REPLY: &str = "MY_LIST";
    /// remove request (simple, payload = filename); fire and forget
    pub const REMOVE: &str = "DEL";
    /// fetch request (simple, payload = filename)
    pub const FETCH: &str = "GET";
    /// fetch reply (complex: param = TCP port, payload = filename)
    pub const FETCH_REPLY: &str = "CONNECT_ME";
    /// upload request (complex: param = declared size, payload = filename)
    pub const UPLOAD: &str = "ADD";
    /// upload accepted (complex: param = TCP port, empty payload)
    pub const UPLOAD_REPLY: &str = "CAN_ADD";
    /// upload rejected (simple, payload = rejected filename)
    pub const UPLOAD_REJECTED: &str = "NO_WAY";
    /// generic error reply (simple, payload = diagnostic)
    pub const INVALID: &str = "INVALID";
}

/// The fixed-width, NUL-padded command field.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandField([u8; CMD_FIELD_LEN]);

impl CommandField {
    pub fn new(command: &str) -> CommandField {
        debug_assert!(command.len() <= CMD_FIELD_LEN);
        let mut field = [0u8; CMD_FIELD_LEN];
        field[..command.len()].copy_from_slice(command.as_bytes());
        CommandField(field)
    }

    /// Strict match: every byte after the command name must be NUL, so e.g. `"HELLOX"`
    ///  does not pass as `HELLO`.
    pub fn is(&self, command: &str) -> bool {
        self.0.starts_with(command.as_bytes()) && self.0[command.len()..].iter().all(|b| *b == 0)
    }

    fn ser(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }

    fn deser(buf: &mut impl Buf) -> anyhow::Result<CommandField> {
        if buf.remaining() < CMD_FIELD_LEN {
            bail!("datagram shorter than the command field");
        }
        let mut field = [0u8; CMD_FIELD_LEN];
        buf.copy_to_slice(&mut field);
        Ok(CommandField(field))
    }
}

impl Debug for CommandField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let printable = self.0.iter().take_while(|b| **b != 0).cloned().collect::<Vec<_>>();
        write!(f, "{:?}", String::from_utf8_lossy(&printable))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleRecord {
    pub cmd: CommandField,
    pub seq: u64,
    pub payload: String,
}

impl SimpleRecord {
    pub fn new(command: &str, seq: u64, payload: impl Into<String>) -> SimpleRecord {
        SimpleRecord {
            cmd: CommandField::new(command),
            seq,
            payload: payload.into(),
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        self.cmd.ser(buf);
        buf.put_u64(self.seq);
        buf.put_slice(self.payload.as_bytes());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<SimpleRecord> {
        let cmd = CommandField::deser(buf)?;
        let seq = buf.try_get_u64()?;
        Ok(SimpleRecord {
            cmd,
            seq,
            payload: take_payload(buf)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplexRecord {
    pub cmd: CommandField,
    pub seq: u64,
    pub param: u64,
    pub payload: String,
}

impl ComplexRecord {
    pub fn new(command: &str, seq: u64, param: u64, payload: impl Into<String>) -> ComplexRecord {
        ComplexRecord {
            cmd: CommandField::new(command),
            seq,
            param,
            payload: payload.into(),
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        self.cmd.ser(buf);
        buf.put_u64(self.seq);
        buf.put_u64(self.param);
        buf.put_slice(self.payload.as_bytes());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<ComplexRecord> {
        let cmd = CommandField::deser(buf)?;
        let seq = buf.try_get_u64()?;
        let param = buf.try_get_u64()?;
        Ok(ComplexRecord {
            cmd,
            seq,
            param,
            payload: take_payload(buf)?,
        })
    }
}

fn take_payload(buf: &mut impl Buf) -> anyhow::Result<String> {
    let mut payload = vec![0u8; buf.remaining()];
    buf.copy_to_slice(&mut payload);
    Ok(String::from_utf8(payload)?)
}
