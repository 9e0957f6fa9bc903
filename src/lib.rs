// Author: Lukas Bower
// Purpose: Provide 9P2000.L wire types and codec primitives for client and
// server implementations.

//! Wire-format codec for the 9P2000.L distributed file system protocol.
//!
//! This crate turns 9P2000.L requests and responses into bytes and back. It
//! does not open a socket, track fids, or assign tags — those are a
//! session/transport layer's job, built on top of this codec.
//! Decoded strings and payloads borrow from the input buffer; nothing here
//! allocates beyond the `Vec<u8>` frames encoding itself produces and the
//! small `Vec`s needed for `Twalk`/`Rwalk`'s variable-length arrays.

#![no_std]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

mod adler32;
pub mod codec;
mod cursor;
pub mod dirent;
mod message;
mod twophase;
mod types;

pub use cursor::{Reader, Writer};
pub use message::{strcmp_cstr, strdup_owned, strncmp_cstr, Request, RequestBody, Response, ResponseBody};
pub use types::{
    CodecError, Qid, P9_CHECK_ADLER32, P9_CHECK_NONE, P9_MAXWELEM, P9_NOTAG, QTAPPEND, QTAUTH,
    QTDIR, QTEXCL, QTFILE, QTMOUNT, QTSYMLINK, QTTMP,
};

pub use codec::{decode_request, decode_response, encode_request, encode_response, set_tag};

pub use twophase::{alloc_rread, create_rreaddir, RreadBuilder, RreaddirBuilder};

#[cfg(feature = "large-io")]
pub use twophase::{create_raread, RareadBuilder};

#[cfg(feature = "large-io")]
pub use adler32::adler32;
