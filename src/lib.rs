// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A read-only serving layer for immutable sorted key/value files in the
//! HBase HFile v1 format.
//!
//! Quiver loads one or more HFiles ("collections") into a process, keeps
//! them resident in RAM or memory-mapped from disk, and answers point,
//! batch, prefix-range, and scan queries over them.
//!
//! This crate is the core: the HFile reader/scanner/iterator subsystem and
//! the query engine that binds it to an RPC handler. The wire framing for
//! whatever RPC transport a caller wants (thrift, gRPC, ...), remote
//! fetching of files into a local cache, and admin/metrics endpoints are
//! deliberately not part of it.
//!
//! # Example
//!
//! ```
//! use quiver::{CollectionConfig, CollectionSet, LoadMethod};
//! # use quiver::test_support::Writer;
//! #
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("one.hfile");
//! # let mut w = Writer::create(&path, false, 4096)?;
//! # w.write(b"a", b"1")?;
//! # w.close()?;
//!
//! let cfg = CollectionConfig::new("one", path.to_str().unwrap(), LoadMethod::OnDisk);
//! let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap())?;
//!
//! let reader = set.reader_for("one")?;
//! let mut scanner = reader.get_scanner();
//! assert_eq!(scanner.get_first(reader, b"a")?.unwrap().to_vec(), b"1".to_vec());
//! #
//! # Ok::<(), quiver::Error>(())
//! ```

// Unlike the teacher crate, this one cannot forbid unsafe code crate-wide:
// the file loader's mmap-and-lock and off-heap-copy paths need a handful of
// narrowly-scoped `unsafe` calls (see `file.rs`), each carrying its own
// `#[allow(unsafe_code)]` and a safety comment at the call site.
#![allow(clippy::module_name_repetitions)]

mod block;
mod block_index;
mod bloom;
mod collection;
mod error;
mod file;
mod fileinfo;
mod iterator;
mod ordered;
mod pool;
pub mod query;
mod reader;
mod scanner;
mod slice;
mod trailer;
mod vint;

/// A minimal HFile v1 writer used only to build test fixtures; not part of
/// the serving core (see `spec.md`'s Non-goals).
#[doc(hidden)]
pub mod writer;

/// Re-exported for doctests and downstream integration tests that need to
/// build HFile fixtures without vendoring binary blobs. Not part of the
/// supported public API.
#[doc(hidden)]
pub mod test_support {
    pub use crate::writer::Writer;
}

pub use bloom::BloomFilter;
pub use collection::{CollectionConfig, CollectionSet};
pub use error::{Error, Result};
pub use file::LoadMethod;
pub use iterator::Iterator;
pub use reader::Reader;
pub use scanner::Scanner;
pub use slice::Slice;
pub use trailer::{CompressionCodec, Trailer};
