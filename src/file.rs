// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Acquiring the bytes of an HFile for the lifetime of a collection.
//!
//! Grounded on `examples/original_source/hfile/load-file.go` (`loadFile`),
//! restated in spec.md §4.1. `memmap2` and `libc` have no teacher precedent —
//! `lsm-tree` reads segment files through a plain `File`/descriptor table and
//! never mmaps them — but spec.md §4.1 requires a memory-mapped load path and
//! the `mlock(2)` call the mem-locked strategy needs (the only unsafe code in
//! this crate), so they are added here as spec-driven dependencies.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// How a collection's bytes are acquired and kept resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMethod {
    /// Memory-map read-only; random reads go through the kernel page cache.
    OnDisk,
    /// Memory-map read-only, then `mlock(2)` every page resident.
    MemLocked,
    /// Read the whole file into a leaked, process-lifetime allocation,
    /// bypassing the mapped page cache entirely.
    CopiedToOffHeap,
}

/// A byte region with a stable address for the lifetime of the process.
///
/// Dropping a `Mapped` region unmaps it; dropping an `Owned` region does
/// nothing — see [`LoadMethod::CopiedToOffHeap`]'s documented, intentional
/// leak.
pub enum FileBytes {
    Mapped(memmap2::Mmap),
    Owned(&'static [u8]),
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Owned(b) => b,
        }
    }
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Acquires the bytes of the file at `path` using `method`.
pub fn load(path: &Path, method: LoadMethod) -> Result<FileBytes> {
    let file = File::open(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("opening {path:?}: {e}"))))?;

    let len = file
        .metadata()
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("stat {path:?}: {e}"))))?
        .len();

    match method {
        LoadMethod::OnDisk => {
            log::debug!("mapping {path:?} read-only ({len} bytes)");
            let mmap = map_read_only(&file)?;
            Ok(FileBytes::Mapped(mmap))
        }
        LoadMethod::MemLocked => {
            log::debug!("mapping and locking {path:?} resident ({len} bytes)");
            let mmap = map_read_only(&file)?;
            lock_resident(&mmap)?;
            Ok(FileBytes::Mapped(mmap))
        }
        LoadMethod::CopiedToOffHeap => {
            log::debug!("copying {path:?} off-heap ({len} bytes)");
            let mut buf = Vec::with_capacity(len as usize);
            let read = (&file).take(len).read_to_end(&mut buf)?;
            if read as u64 != len {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("short read of {path:?}: got {read}, expected {len}"),
                )));
            }
            // Intentional: the copied-to-off-heap path is meant to live for
            // the process's lifetime, same as a memory map would.
            let leaked: &'static [u8] = Box::leak(buf.into_boxed_slice());
            Ok(FileBytes::Owned(leaked))
        }
    }
}

fn map_read_only(file: &File) -> Result<memmap2::Mmap> {
    // SAFETY: the file is not modified out from under the map for the
    // lifetime of the returned `Mmap`; the loaded collection owns it.
    #[allow(unsafe_code)]
    let mmap = unsafe { memmap2::Mmap::map(file)? };
    Ok(mmap)
}

#[cfg(unix)]
fn lock_resident(mmap: &memmap2::Mmap) -> Result<()> {
    // SAFETY: `mmap` outlives this call and its pointer/len describe exactly
    // the mapped region; `mlock` only marks pages resident, it never writes.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::mlock(mmap.as_ptr().cast(), mmap.len()) };
    if rc != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn lock_resident(_mmap: &memmap2::Mmap) -> Result<()> {
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "mem-locked load method is only supported on unix",
    )))
}
