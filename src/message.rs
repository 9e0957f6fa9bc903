// Author: Lukas Bower
// Purpose: Define the 9P2000.L request/response message model and wire sizes.

//! The 9P2000.L message model: one request/response envelope carrying a
//! tagged union of bodies, one variant per message in the closed
//! enumeration. Strings and payloads borrow from whichever buffer produced
//! them (the caller's semantic arguments on encode, the input frame on
//! decode) instead of being copied onto the heap.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::types::Qid;

const QID_LEN: usize = 13; // type[1] + version[4] + path[8]

fn str_len(s: &str) -> usize {
    2 + s.len()
}

/// Copy a borrowed wire string into an owned, NUL-terminated byte string,
/// for callers (POSIX backends, path tables) that need it to outlive the
/// decoded frame or interoperate with C-style string APIs.
pub fn strdup_owned(s: &str) -> Vec<u8> {
    let mut owned = Vec::with_capacity(s.len() + 1);
    owned.extend_from_slice(s.as_bytes());
    owned.push(0);
    owned
}

fn cstr_bytes(c_str: &[u8]) -> &[u8] {
    let len = c_str.iter().position(|&b| b == 0).unwrap_or(c_str.len());
    &c_str[..len]
}

/// Compare a wire string to a NUL-terminated string, byte for byte. If `s`'s
/// bytes equal the first `n` bytes of `c_str` but `c_str` has more, `s`
/// compares as `Less` (ordinary lexicographic prefix ordering).
pub fn strcmp_cstr(s: &str, c_str: &[u8]) -> Ordering {
    s.as_bytes().cmp(cstr_bytes(c_str))
}

/// Bounded variant of [`strcmp_cstr`]: compares at most the first `n` bytes
/// of each side. If `len(s) >= n`, only `s`'s first `n` bytes are considered.
pub fn strncmp_cstr(s: &str, c_str: &[u8], n: usize) -> Ordering {
    let s_bytes = s.as_bytes();
    let s_bound = s_bytes.len().min(n);
    let c_bytes = cstr_bytes(c_str);
    let c_bound = c_bytes.len().min(n);
    s_bytes[..s_bound].cmp(&c_bytes[..c_bound])
}

/// A client request: a correlating tag plus a typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    /// Tag chosen by the client to correlate this request with its reply.
    pub tag: u16,
    /// The request payload.
    pub body: RequestBody<'a>,
}

/// A server response: the tag mirrored from the request plus a typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<'a> {
    /// Tag copied from the originating request.
    pub tag: u16,
    /// The response payload.
    pub body: ResponseBody<'a>,
}

/// Every T-message body in the 9P2000.L closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody<'a> {
    /// Negotiate the maximum message size and protocol version.
    Version {
        /// Maximum message size the client proposes.
        msize: u32,
        /// Protocol version string, e.g. `"9P2000.L"`.
        version: &'a str,
    },
    /// Request an authentication fid.
    Auth {
        /// Fid to associate with the authentication conversation.
        afid: u32,
        /// User name.
        uname: &'a str,
        /// Attach name (namespace selector).
        aname: &'a str,
        /// Numeric user id.
        n_uname: u32,
    },
    /// Bind a fid to the root of a served tree.
    Attach {
        /// Fid to bind.
        fid: u32,
        /// Authentication fid, or `!0` if none.
        afid: u32,
        /// User name.
        uname: &'a str,
        /// Attach name (namespace selector).
        aname: &'a str,
        /// Numeric user id.
        n_uname: u32,
    },
    /// Cancel an in-flight request.
    Flush {
        /// Tag of the request being cancelled.
        oldtag: u16,
    },
    /// Walk from `fid` through `wnames`, binding the result to `newfid`.
    Walk {
        /// Starting fid.
        fid: u32,
        /// Fid to bind the walk result to.
        newfid: u32,
        /// Path components to walk through, at most [`crate::P9_MAXWELEM`].
        wnames: Vec<&'a str>,
    },
    /// Read a byte range from an open fid.
    Read {
        /// Fid to read from.
        fid: u32,
        /// Starting offset.
        offset: u64,
        /// Maximum bytes to return.
        count: u32,
    },
    /// Write bytes to an open fid at the given offset.
    Write {
        /// Fid to write to.
        fid: u32,
        /// Starting offset.
        offset: u64,
        /// Bytes to write.
        data: &'a [u8],
    },
    /// Release a fid.
    Clunk {
        /// Fid to release.
        fid: u32,
    },
    /// Remove the file associated with a fid and release it.
    Remove {
        /// Fid of the file to remove.
        fid: u32,
    },
    /// Query filesystem-level statistics for a fid.
    Statfs {
        /// Fid identifying the filesystem to query.
        fid: u32,
    },
    /// Open a fid for I/O, POSIX-style.
    Lopen {
        /// Fid to open.
        fid: u32,
        /// POSIX `open(2)`-style flags.
        mode: u32,
    },
    /// Create and open a new file under `fid`.
    Lcreate {
        /// Parent directory fid; rebound to the new file on success.
        fid: u32,
        /// Name of the file to create.
        name: &'a str,
        /// POSIX `open(2)`-style flags.
        flags: u32,
        /// Creation mode bits.
        mode: u32,
        /// Group id to own the new file.
        gid: u32,
    },
    /// Create a symbolic link under `fid`.
    Symlink {
        /// Parent directory fid.
        fid: u32,
        /// Name of the link to create.
        name: &'a str,
        /// Link target text.
        symtgt: &'a str,
        /// Group id to own the new link.
        gid: u32,
    },
    /// Create a device node, FIFO, or socket under `fid`.
    Mknod {
        /// Parent directory fid.
        fid: u32,
        /// Name of the node to create.
        name: &'a str,
        /// Mode bits, including the node type.
        mode: u32,
        /// Device major number.
        major: u32,
        /// Device minor number.
        minor: u32,
        /// Group id to own the new node.
        gid: u32,
    },
    /// Rename the file at `fid` to `name` under `dfid`.
    Rename {
        /// Fid of the file being renamed.
        fid: u32,
        /// Destination directory fid.
        dfid: u32,
        /// New name within the destination directory.
        name: &'a str,
    },
    /// Read the target of a symbolic link.
    Readlink {
        /// Fid of the symbolic link.
        fid: u32,
    },
    /// Fetch POSIX-style file attributes for a fid.
    Getattr {
        /// Fid to query.
        fid: u32,
        /// Bitmask of attribute groups the client wants populated.
        request_mask: u64,
    },
    /// Set POSIX-style file attributes for a fid.
    Setattr {
        /// Fid to modify.
        fid: u32,
        /// Bitmask of which fields below are meaningful.
        valid: u32,
        /// New mode bits.
        mode: u32,
        /// New owning user id.
        uid: u32,
        /// New owning group id.
        gid: u32,
        /// New size in bytes.
        size: u64,
        /// New access time, seconds.
        atime_sec: u64,
        /// New access time, nanoseconds.
        atime_nsec: u64,
        /// New modification time, seconds.
        mtime_sec: u64,
        /// New modification time, nanoseconds.
        mtime_nsec: u64,
    },
    /// Begin an extended-attribute read walk.
    Xattrwalk {
        /// Fid of the file whose attribute is being read.
        fid: u32,
        /// Fid to bind to the attribute value.
        newfid: u32,
        /// Extended attribute name.
        name: &'a str,
    },
    /// Begin an extended-attribute create/replace.
    Xattrcreate {
        /// Fid of the file to attach the attribute to.
        fid: u32,
        /// Extended attribute name.
        name: &'a str,
        /// Size in bytes of the value that will follow over `fid`.
        attr_size: u64,
        /// `setxattr(2)`-style flags.
        flags: u32,
    },
    /// Read a range of directory entries.
    Readdir {
        /// Fid of the open directory.
        fid: u32,
        /// Opaque offset from a previous `Rreaddir`, or 0 to start over.
        offset: u64,
        /// Maximum bytes of dirent data to return.
        count: u32,
    },
    /// Flush a fid's data to stable storage.
    Fsync {
        /// Fid to sync.
        fid: u32,
    },
    /// Acquire or release a POSIX record lock.
    Lock {
        /// Fid to lock.
        fid: u32,
        /// Lock type (`F_RDLCK`/`F_WRLCK`/`F_UNLCK`).
        ltype: u8,
        /// `fcntl(2)`-style lock flags.
        flags: u32,
        /// Start offset of the locked range.
        start: u64,
        /// Length of the locked range (0 means "to EOF").
        length: u64,
        /// Client process id, for diagnostics.
        proc_id: u32,
        /// Opaque client identifier string.
        client_id: &'a str,
    },
    /// Query the lock that would conflict with a proposed lock.
    Getlock {
        /// Fid to query.
        fid: u32,
        /// Lock type being tested.
        ltype: u8,
        /// Start offset of the proposed range.
        start: u64,
        /// Length of the proposed range.
        length: u64,
        /// Client process id, for diagnostics.
        proc_id: u32,
        /// Opaque client identifier string.
        client_id: &'a str,
    },
    /// Create a hard link.
    Link {
        /// Destination directory fid.
        dfid: u32,
        /// Fid of the file to link.
        fid: u32,
        /// Name of the new link within `dfid`.
        name: &'a str,
    },
    /// Create a directory.
    Mkdir {
        /// Parent directory fid.
        fid: u32,
        /// Name of the directory to create.
        name: &'a str,
        /// Creation mode bits.
        mode: u32,
        /// Group id to own the new directory.
        gid: u32,
    },
    /// Optional large-I/O read, checksummed on request.
    #[cfg(feature = "large-io")]
    Aread {
        /// Fid to read from.
        fid: u32,
        /// Requested checksum algorithm (`P9_CHECK_NONE`/`P9_CHECK_ADLER32`).
        datacheck: u8,
        /// Starting offset.
        offset: u64,
        /// Maximum bytes to return.
        count: u32,
        /// Maximum reply size the client can accept.
        rsize: u32,
    },
    /// Optional large-I/O write, checksummed on request.
    #[cfg(feature = "large-io")]
    Awrite {
        /// Fid to write to.
        fid: u32,
        /// Requested checksum algorithm (`P9_CHECK_NONE`/`P9_CHECK_ADLER32`).
        datacheck: u8,
        /// Starting offset.
        offset: u64,
        /// Bytes to write; the trailing `check[u32]` is derived, not stored.
        data: &'a [u8],
    },
}

impl<'a> RequestBody<'a> {
    /// Size in bytes of this body on the wire, not counting the 7-byte
    /// `size`/`type`/`tag` header.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Version { version, .. } => 4 + str_len(version),
            Self::Auth { uname, aname, .. } => 4 + str_len(uname) + str_len(aname) + 4,
            Self::Attach { uname, aname, .. } => 4 + 4 + str_len(uname) + str_len(aname) + 4,
            Self::Flush { .. } => 2,
            Self::Walk { wnames, .. } => {
                4 + 4 + 2 + wnames.iter().map(|w| str_len(w)).sum::<usize>()
            }
            Self::Read { .. } => 4 + 8 + 4,
            Self::Write { data, .. } => 4 + 8 + 4 + data.len(),
            Self::Clunk { .. } | Self::Remove { .. } | Self::Statfs { .. } | Self::Readlink { .. }
            | Self::Fsync { .. } => 4,
            Self::Lopen { .. } => 4 + 4,
            Self::Lcreate { name, .. } => 4 + str_len(name) + 4 + 4 + 4,
            Self::Symlink { name, symtgt, .. } => 4 + str_len(name) + str_len(symtgt) + 4,
            Self::Mknod { name, .. } => 4 + str_len(name) + 4 + 4 + 4 + 4,
            Self::Rename { name, .. } => 4 + 4 + str_len(name),
            Self::Getattr { .. } => 4 + 8,
            Self::Setattr { .. } => 4 + 4 + 4 + 4 + 4 + 8 + 8 + 8 + 8 + 8,
            Self::Xattrwalk { name, .. } => 4 + 4 + str_len(name),
            Self::Xattrcreate { name, .. } => 4 + str_len(name) + 8 + 4,
            Self::Readdir { .. } => 4 + 8 + 4,
            Self::Lock { client_id, .. } => 4 + 1 + 4 + 8 + 8 + 4 + str_len(client_id),
            Self::Getlock { client_id, .. } => 4 + 1 + 8 + 8 + 4 + str_len(client_id),
            Self::Link { name, .. } => 4 + 4 + str_len(name),
            Self::Mkdir { name, .. } => 4 + str_len(name) + 4 + 4,
            #[cfg(feature = "large-io")]
            Self::Aread { .. } => 4 + 1 + 8 + 4 + 4,
            #[cfg(feature = "large-io")]
            Self::Awrite { data, .. } => 4 + 1 + 8 + 4 + data.len() + 4,
        }
    }
}

/// Every R-message body in the 9P2000.L closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody<'a> {
    /// Reply to `Tversion` with the negotiated size and version.
    Version {
        /// Negotiated maximum message size.
        msize: u32,
        /// Negotiated (or downgraded) protocol version string.
        version: &'a str,
    },
    /// Reply to `Tauth` with the qid of the authentication file.
    Auth {
        /// Qid of the authentication file.
        qid: Qid,
    },
    /// Reply to `Tattach` with the root qid.
    Attach {
        /// Qid of the attached root.
        qid: Qid,
    },
    /// Reply to `Tflush`.
    Flush,
    /// Reply to `Twalk` with the qids encountered along the path.
    Walk {
        /// Qids in walk order; fewer than requested means a partial walk.
        qids: Vec<Qid>,
    },
    /// Reply to `Tread` with the bytes read.
    Read {
        /// Payload bytes.
        data: &'a [u8],
    },
    /// Reply to `Twrite` with the number of bytes actually written.
    Write {
        /// Bytes written.
        count: u32,
    },
    /// Reply to `Tclunk`.
    Clunk,
    /// Reply to `Tremove`.
    Remove,
    /// Linux-style error reply, replacing the legacy `Rerror`.
    Lerror {
        /// Linux errno value.
        ecode: u32,
    },
    /// Reply to `Tstatfs` with `statfs(2)`-style filesystem statistics.
    Statfs {
        /// Filesystem type identifier.
        kind: u32,
        /// Optimal transfer block size.
        bsize: u32,
        /// Total blocks.
        blocks: u64,
        /// Free blocks.
        bfree: u64,
        /// Free blocks available to unprivileged users.
        bavail: u64,
        /// Total file nodes.
        files: u64,
        /// Free file nodes.
        ffree: u64,
        /// Filesystem id.
        fsid: u64,
        /// Maximum file name length.
        namelen: u32,
    },
    /// Reply to `Tlopen` with the opened qid and I/O unit hint.
    Lopen {
        /// Qid of the opened file.
        qid: Qid,
        /// Suggested maximum atomic I/O size, or 0 for "use `msize`".
        iounit: u32,
    },
    /// Reply to `Tlcreate` with the created qid and I/O unit hint.
    Lcreate {
        /// Qid of the created file.
        qid: Qid,
        /// Suggested maximum atomic I/O size, or 0 for "use `msize`".
        iounit: u32,
    },
    /// Reply to `Tsymlink` with the created link's qid.
    Symlink {
        /// Qid of the created symbolic link.
        qid: Qid,
    },
    /// Reply to `Tmknod` with the created node's qid.
    Mknod {
        /// Qid of the created node.
        qid: Qid,
    },
    /// Reply to `Trename`.
    Rename,
    /// Reply to `Treadlink` with the link target text.
    Readlink {
        /// Link target.
        target: &'a str,
    },
    /// Reply to `Tgetattr` with the requested POSIX attributes.
    Getattr {
        /// Bitmask of which fields below were actually populated.
        valid: u64,
        /// Qid of the queried file.
        qid: Qid,
        /// Mode bits.
        mode: u32,
        /// Owning user id.
        uid: u32,
        /// Owning group id.
        gid: u32,
        /// Hard link count.
        nlink: u64,
        /// Device id, for device-special files.
        rdev: u64,
        /// Size in bytes.
        size: u64,
        /// Preferred I/O block size.
        blksize: u64,
        /// Blocks allocated (512-byte units).
        blocks: u64,
        /// Access time, seconds.
        atime_sec: u64,
        /// Access time, nanoseconds.
        atime_nsec: u64,
        /// Modification time, seconds.
        mtime_sec: u64,
        /// Modification time, nanoseconds.
        mtime_nsec: u64,
        /// Status-change time, seconds.
        ctime_sec: u64,
        /// Status-change time, nanoseconds.
        ctime_nsec: u64,
        /// Creation time, seconds.
        btime_sec: u64,
        /// Creation time, nanoseconds.
        btime_nsec: u64,
        /// Filesystem generation number.
        gen: u64,
        /// Data version, for cache coherency.
        data_version: u64,
    },
    /// Reply to `Tsetattr`.
    Setattr,
    /// Reply to `Txattrwalk` with the attribute's size.
    Xattrwalk {
        /// Size in bytes of the attribute value.
        size: u64,
    },
    /// Reply to `Txattrcreate`.
    Xattrcreate,
    /// Reply to `Treaddir` with a packed sequence of dirents.
    Readdir {
        /// Dirent payload; walk it with [`crate::dirent::DirentIter`].
        data: &'a [u8],
    },
    /// Reply to `Tfsync`.
    Fsync,
    /// Reply to `Tlock` with the resulting lock status.
    Lock {
        /// `P9_LOCK_SUCCESS`/`P9_LOCK_BLOCKED`/`P9_LOCK_ERROR`/`P9_LOCK_GRACE`.
        status: u8,
    },
    /// Reply to `Tgetlock` describing any conflicting lock.
    Getlock {
        /// Lock type found (`F_UNLCK` if none conflicts).
        ltype: u8,
        /// Start offset of the conflicting range.
        start: u64,
        /// Length of the conflicting range.
        length: u64,
        /// Owning process id.
        proc_id: u32,
        /// Owning client identifier string.
        client_id: &'a str,
    },
    /// Reply to `Tlink`.
    Link,
    /// Reply to `Tmkdir` with the created directory's qid.
    Mkdir {
        /// Qid of the created directory.
        qid: Qid,
    },
    /// Optional large-I/O read reply.
    #[cfg(feature = "large-io")]
    Aread {
        /// Payload bytes.
        data: &'a [u8],
        /// Adler-32 checksum of `data`, or 0 if none was requested.
        check: u32,
    },
    /// Optional large-I/O write reply.
    #[cfg(feature = "large-io")]
    Awrite {
        /// Bytes actually written.
        count: u32,
    },
}

impl<'a> ResponseBody<'a> {
    /// Size in bytes of this body on the wire, not counting the 7-byte
    /// `size`/`type`/`tag` header.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Version { version, .. } => 4 + str_len(version),
            Self::Auth { .. } | Self::Attach { .. } => QID_LEN,
            Self::Flush
            | Self::Clunk
            | Self::Remove
            | Self::Rename
            | Self::Setattr
            | Self::Xattrcreate
            | Self::Fsync
            | Self::Link => 0,
            Self::Walk { qids } => 2 + qids.len() * QID_LEN,
            Self::Read { data } => 4 + data.len(),
            Self::Write { .. } => 4,
            Self::Lerror { .. } => 4,
            Self::Statfs { .. } => 4 + 4 + 8 + 8 + 8 + 8 + 8 + 8 + 4,
            Self::Lopen { .. } | Self::Lcreate { .. } => QID_LEN + 4,
            Self::Symlink { .. } | Self::Mknod { .. } | Self::Mkdir { .. } => QID_LEN,
            Self::Readlink { target } => str_len(target),
            Self::Getattr { .. } => 8 + QID_LEN + 3 * 4 + 15 * 8,
            Self::Xattrwalk { .. } => 8,
            Self::Readdir { data } => 4 + data.len(),
            Self::Lock { .. } => 1,
            Self::Getlock { client_id, .. } => 1 + 8 + 8 + 4 + str_len(client_id),
            #[cfg(feature = "large-io")]
            Self::Aread { data, .. } => 4 + data.len() + 4,
            #[cfg(feature = "large-io")]
            Self::Awrite { .. } => 4,
        }
    }
}
