// Author: Lukas Bower
// Purpose: Define 9P2000.L wire types and constants shared across the codec.

//! Shared wire types: qids, protocol constants, and the codec error enum.

/// Maximum number of path elements in a single `Twalk`/`Rwalk` exchange.
pub const P9_MAXWELEM: usize = 16;

/// Tag value reserved for `Tversion`/`Rversion` during version negotiation.
pub const P9_NOTAG: u16 = 0xFFFF;

/// `datacheck` value requesting no checksum on the optional large-I/O path.
pub const P9_CHECK_NONE: u8 = 0;

/// `datacheck` value requesting an Adler-32 checksum on the optional
/// large-I/O path.
pub const P9_CHECK_ADLER32: u8 = 2;

/// Qid type bit: directory.
pub const QTDIR: u8 = 0x80;
/// Qid type bit: append-only file.
pub const QTAPPEND: u8 = 0x40;
/// Qid type bit: exclusive-use file.
pub const QTEXCL: u8 = 0x20;
/// Qid type bit: mounted channel.
pub const QTMOUNT: u8 = 0x10;
/// Qid type bit: authentication file.
pub const QTAUTH: u8 = 0x08;
/// Qid type bit: non-backed-up (temporary) file.
pub const QTTMP: u8 = 0x04;
/// Qid type bit: symbolic link.
pub const QTSYMLINK: u8 = 0x02;
/// Qid type value for a plain file.
pub const QTFILE: u8 = 0x00;

/// 13-byte server-assigned file identity: type, version, path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Qid {
    /// Qid type bits (`QTDIR`, `QTSYMLINK`, ... or'd together).
    pub ty: u8,
    /// Version number, incremented whenever the file's contents change.
    pub version: u32,
    /// Path: a unique identifier for the file within the server.
    pub path: u64,
}

impl Qid {
    /// Build a new qid from its three wire fields.
    pub fn new(ty: u8, version: u32, path: u64) -> Self {
        Self { ty, version, path }
    }

    /// Whether the directory bit is set.
    pub fn is_dir(&self) -> bool {
        self.ty & QTDIR != 0
    }

    /// Whether the symlink bit is set.
    pub fn is_symlink(&self) -> bool {
        self.ty & QTSYMLINK != 0
    }
}

/// Errors produced while encoding or decoding 9P2000.L wire messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input was shorter than the header or a declared field demanded.
    #[error("truncated frame")]
    Truncated,
    /// A write ran past the end of the destination buffer, or a bounded
    /// array exceeded its protocol limit (`nwname`/`nwqid` > 16).
    #[error("buffer overflow")]
    Overflow,
    /// The frame header's `size` field did not match the buffer actually
    /// supplied to the decoder.
    #[error("length mismatch: header said {declared}, buffer holds {actual}")]
    LengthMismatch {
        /// Declared frame size.
        declared: u32,
        /// Bytes actually available.
        actual: usize,
    },
    /// Decode saw a message type outside the closed 9P2000.L enumeration.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// A string field was not valid UTF-8.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// A two-phase builder was finalized with more bytes than it reserved.
    #[error("finalize payload ({actual}) exceeds reserved capacity ({max})")]
    PayloadTooLarge {
        /// Bytes the caller tried to finalize with.
        actual: u32,
        /// Bytes originally reserved.
        max: u32,
    },
}
