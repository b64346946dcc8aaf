// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Collection configuration and the process-wide collection registry.
//!
//! Grounded on `examples/original_source/hfile/collections.go`
//! (`CollectionConfig`, `CollectionSet`), restated in spec.md §3 and §6.
//! Everything downstream of "already-resolved config" — flag parsing, JSON
//! decoding, HTTP/webhdfs fetch into a cache directory — is out of scope
//! (spec.md §1) and is not modeled here.

use crate::error::{Error, Result};
use crate::file::LoadMethod;
use crate::reader::Reader;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Configuration for one collection, the boundary an out-of-core config
/// layer would construct and hand to [`CollectionSet::load`].
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub name: String,
    /// The file's original location; possibly a remote URL resolved by an
    /// out-of-core fetch step before this config reaches the core.
    pub source_path: String,
    /// The local on-disk path the core actually opens.
    pub local_path: String,
    pub load_method: LoadMethod,
    pub debug: bool,

    /// Sharding metadata, carried only for external service discovery; the
    /// core never reads these back.
    pub parent_name: Option<String>,
    pub shard_function: Option<String>,
    pub partition: Option<String>,
    pub total_partitions: Option<String>,
}

impl CollectionConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, load_method: LoadMethod) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            source_path: path.clone(),
            local_path: path,
            load_method,
            debug: false,
            parent_name: None,
            shard_function: None,
            partition: None,
            total_partitions: None,
        }
    }
}

/// The process-wide registry of loaded collections: name → `Reader`, plus
/// the cache directory an out-of-core fetch step would have used.
///
/// Grounded on `hfile/collections.go`'s `CollectionSet`. Set once at
/// startup; after that, mutated only by admin operations that recompute a
/// single Reader's Bloom filter (spec.md §4.9), never by adding or removing
/// collections.
#[derive(Debug, Default)]
pub struct CollectionSet {
    readers: FxHashMap<String, Arc<Reader>>,
    cache_dir: String,
}

impl CollectionSet {
    /// Opens a `Reader` for every config in `configs`. Fails fast: a single
    /// bad collection aborts the whole load, matching spec.md §7's "Reader
    /// construction errors at startup are fatal for that collection" (and,
    /// transitively, for a startup sequence that loads all configured
    /// collections before serving).
    pub fn load(configs: Vec<CollectionConfig>, cache_dir: impl Into<String>) -> Result<Self> {
        let mut readers = FxHashMap::default();
        for cfg in configs {
            let name = cfg.name.clone();
            log::debug!("loading collection {name} from {}", cfg.local_path);
            let reader = Reader::open(cfg)?;
            readers.insert(name, Arc::new(reader));
        }
        Ok(Self {
            readers,
            cache_dir: cache_dir.into(),
        })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &str {
        &self.cache_dir
    }

    /// Looks up the `Reader` for `name`. Fails with [`Error::NotFound`] if
    /// no such collection is configured.
    pub fn reader_for(&self, name: &str) -> Result<&Arc<Reader>> {
        self.readers
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Iterates over every `(name, Reader)` pair, for `get_info`-style
    /// sweeps over the whole set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Reader>)> {
        self.readers.iter().map(|(k, v)| (k.as_str(), v))
    }
}
