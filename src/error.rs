// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur while loading or serving a collection.
#[derive(Debug)]
pub enum Error {
    /// I/O error while opening, mapping, locking or reading a file.
    Io(std::io::Error),

    /// Malformed file structure: bad magic, bad version, a truncated block
    /// or index entry, a malformed variable-length integer, or an unknown
    /// compression codec id in the trailer.
    Format(String),

    /// Snappy decompression failed, or the decompressed size did not match
    /// the expected block size.
    Decompress(String),

    /// The requested collection name is not present in the `CollectionSet`.
    NotFound(String),

    /// A cursor with order enforcement enabled received a key smaller than
    /// the last key it observed.
    OutOfOrder,

    /// A required RPC-level field was missing or malformed.
    Input(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Decompress(msg) => write!(f, "decompression error: {msg}"),
            Self::NotFound(name) => write!(f, "no such collection: {name}"),
            Self::OutOfOrder => write!(f, "keys requested out of order"),
            Self::Input(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
