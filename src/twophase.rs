// Author: Lukas Bower
// Purpose: Provide two-phase builders for bulk-payload 9P2000.L replies.

//! Two-phase response builders for bulk-payload replies.
//!
//! `Rread`, `Rreaddir`, and (under `large-io`) `Raread` all carry a
//! variable-length payload that the caller fills in with a second I/O call
//! (a file read, a directory scan) after the frame header has already been
//! sized and written. Rather than build the body twice — once to discover
//! its length, once to fill it — each builder here reserves the maximum
//! possible frame up front, hands back a typed handle exposing the payload
//! region as `&mut [u8]`, and `finalize`s by rewriting the header's `size`
//! field (and, for `Raread`, appending the checksum) once the caller reports
//! how many bytes it actually produced. `finalize` consumes the handle, so a
//! builder can't be sent on the wire before it's been finalized.

use alloc::vec;
use alloc::vec::Vec;

use crate::adler32::adler32;
use crate::cursor::Writer;
use crate::types::{CodecError, P9_CHECK_ADLER32, P9_NOTAG};

const HEADER_LEN: usize = 7;
const RREAD_TYPE: u8 = 117; // Rread
const RREADDIR_TYPE: u8 = 41; // Rreaddir
#[cfg(feature = "large-io")]
const RAREAD_TYPE: u8 = 151; // Raread

fn rewrite_size(buf: &mut [u8], size: u32) {
    buf[0..4].copy_from_slice(&size.to_le_bytes());
}

/// Handle for an in-progress `Rread` reply. Reserves `max_count` bytes of
/// payload; the caller fills as much of [`payload_mut`](Self::payload_mut)
/// as it actually read, then calls [`finalize`](Self::finalize).
pub struct RreadBuilder {
    buf: Vec<u8>,
    max_count: u32,
}

/// Reserve an `Rread` reply frame able to hold up to `max_count` payload
/// bytes, mirroring the reference server's pattern of allocating the reply
/// before the backing read has run.
pub fn alloc_rread(max_count: u32) -> RreadBuilder {
    let total = HEADER_LEN + 4 + max_count as usize;
    let mut buf = vec![0u8; total];
    {
        let mut w = Writer::new(&mut buf);
        w.put_u32(total as u32);
        w.put_u8(RREAD_TYPE);
        w.put_u16(P9_NOTAG);
        w.put_u32(max_count);
    }
    RreadBuilder { buf, max_count }
}

impl RreadBuilder {
    /// Mutable view over the reserved payload region, sized `max_count`.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_LEN + 4..]
    }

    /// Shrink the frame to `actual` payload bytes and fix up the `size` and
    /// `count` header fields. Returns the finished frame.
    pub fn finalize(mut self, actual: u32) -> Result<Vec<u8>, CodecError> {
        if actual > self.max_count {
            return Err(CodecError::PayloadTooLarge {
                actual,
                max: self.max_count,
            });
        }
        self.buf.truncate(HEADER_LEN + 4 + actual as usize);
        let total = self.buf.len() as u32;
        rewrite_size(&mut self.buf, total);
        self.buf[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&actual.to_le_bytes());
        Ok(self.buf)
    }
}

/// Handle for an in-progress `Rreaddir` reply, filled with packed dirents by
/// the caller.
pub struct RreaddirBuilder {
    buf: Vec<u8>,
    max_count: u32,
}

/// Reserve an `Rreaddir` reply frame able to hold up to `max_count` bytes of
/// packed dirent data.
pub fn create_rreaddir(max_count: u32) -> RreaddirBuilder {
    let total = HEADER_LEN + 4 + max_count as usize;
    let mut buf = vec![0u8; total];
    {
        let mut w = Writer::new(&mut buf);
        w.put_u32(total as u32);
        w.put_u8(RREADDIR_TYPE);
        w.put_u16(P9_NOTAG);
        w.put_u32(max_count);
    }
    RreaddirBuilder { buf, max_count }
}

impl RreaddirBuilder {
    /// Mutable view over the reserved dirent payload region.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_LEN + 4..]
    }

    /// Shrink the frame to `actual` packed bytes and fix up the header.
    pub fn finalize_rreaddir(mut self, actual: u32) -> Result<Vec<u8>, CodecError> {
        if actual > self.max_count {
            return Err(CodecError::PayloadTooLarge {
                actual,
                max: self.max_count,
            });
        }
        self.buf.truncate(HEADER_LEN + 4 + actual as usize);
        let total = self.buf.len() as u32;
        rewrite_size(&mut self.buf, total);
        self.buf[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&actual.to_le_bytes());
        Ok(self.buf)
    }
}

/// Handle for an in-progress `Raread` reply (optional large-I/O extension).
#[cfg(feature = "large-io")]
pub struct RareadBuilder {
    buf: Vec<u8>,
    max_count: u32,
    datacheck: u8,
}

/// Reserve an `Raread` reply frame able to hold up to `max_count` payload
/// bytes plus the trailing checksum word.
#[cfg(feature = "large-io")]
pub fn create_raread(max_count: u32, datacheck: u8) -> RareadBuilder {
    let total = HEADER_LEN + 4 + max_count as usize + 4;
    let mut buf = vec![0u8; total];
    {
        let mut w = Writer::new(&mut buf);
        w.put_u32(total as u32);
        w.put_u8(RAREAD_TYPE);
        w.put_u16(P9_NOTAG);
        w.put_u32(max_count);
    }
    RareadBuilder {
        buf,
        max_count,
        datacheck,
    }
}

#[cfg(feature = "large-io")]
impl RareadBuilder {
    /// Mutable view over the reserved payload region, sized `max_count`.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let end = self.buf.len() - 4;
        &mut self.buf[HEADER_LEN + 4..end]
    }

    /// Shrink the frame to `actual` payload bytes, compute the Adler-32
    /// checksum over them if `datacheck` requested one, append it, and fix
    /// up the header.
    pub fn finalize_raread(mut self, actual: u32) -> Result<Vec<u8>, CodecError> {
        if actual > self.max_count {
            return Err(CodecError::PayloadTooLarge {
                actual,
                max: self.max_count,
            });
        }
        let payload_end = HEADER_LEN + 4 + actual as usize;
        let check = if self.datacheck == P9_CHECK_ADLER32 {
            adler32(1, &self.buf[HEADER_LEN + 4..payload_end])
        } else {
            0
        };
        self.buf.truncate(payload_end);
        self.buf.extend_from_slice(&check.to_le_bytes());
        let total = self.buf.len() as u32;
        rewrite_size(&mut self.buf, total);
        self.buf[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&actual.to_le_bytes());
        Ok(self.buf)
    }
}
