// Author: Lukas Bower
// Purpose: Pack and iterate the dirent sub-format carried in Rreaddir payloads.

//! Packing and iteration over the dirent records carried in `Rreaddir`
//! payloads: `qid[13] offset[8] type[1] name[s]` per entry, back to back,
//! with no overall count prefix — the reader stops at the end of the slice
//! or the first entry that would overrun it.

use crate::cursor::{Reader, Writer};
use crate::types::Qid;

const FIXED_LEN: usize = 13 + 8 + 1; // qid + offset + type

/// Bytes a single dirent record for `name` will occupy.
pub fn dirent_len(name: &str) -> usize {
    FIXED_LEN + 2 + name.len()
}

/// Pack one dirent into `out`, returning the number of bytes written, or
/// `None` if `out` is too small to hold it.
pub fn serialize_dirent(qid: Qid, offset: u64, kind: u8, name: &str, out: &mut [u8]) -> Option<usize> {
    let mut w = Writer::new(out);
    w.put_u8(qid.ty);
    w.put_u32(qid.version);
    w.put_u64(qid.path);
    w.put_u64(offset);
    w.put_u8(kind);
    w.put_str(name);
    if w.overflowed() {
        None
    } else {
        Some(w.position())
    }
}

/// One decoded directory entry, borrowed from the `Rreaddir` payload that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    /// Identity of the entry.
    pub qid: Qid,
    /// Opaque offset to resume a subsequent `Treaddir` after this entry.
    pub offset: u64,
    /// `DT_*`-style directory entry type.
    pub kind: u8,
    /// Entry name.
    pub name: &'a str,
}

/// Iterator over the dirents packed into an `Rreaddir` payload.
///
/// Stops cleanly at the end of the slice. A trailing partial record (fewer
/// bytes remaining than one full entry needs) ends iteration rather than
/// erroring, since a server is free to truncate at an entry boundary inside
/// a buffer sized by `count` rather than by entry count.
pub struct DirentIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DirentIter<'a> {
    /// Walk the dirent records packed into `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Iterator for DirentIter<'a> {
    type Item = DirEntry<'a>;

    fn next(&mut self) -> Option<DirEntry<'a>> {
        if self.buf.len().saturating_sub(self.pos) < FIXED_LEN {
            return None;
        }
        let mut r = Reader::new(&self.buf[self.pos..]);
        let ty = r.get_u8();
        let version = r.get_u32();
        let path = r.get_u64();
        let offset = r.get_u64();
        let kind = r.get_u8();
        let name = r.get_str();
        if r.overflowed() {
            self.pos = self.buf.len();
            return None;
        }
        self.pos += r.position();
        Some(DirEntry {
            qid: Qid::new(ty, version, path),
            offset,
            kind,
            name,
        })
    }
}
