//! Transparent prepared-statement cache.
//!
//! Statements are keyed by SQL text plus the parameter-OID fingerprint,
//! because the server plans per parameter type. An entry is inserted
//! when its statement is first executed and counts committed
//! executions; once it reaches the prepare threshold the engine parses
//! it under a server-side name and later executions skip Parse and
//! Describe entirely. The cache is a plain LRU: committing a successful
//! cycle moves the entry to the most-recent position, and inserting
//! into a full cache evicts the oldest entry, whose server-side
//! statement is closed in the same message flow, ahead of any Parse
//! that could reuse its name.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::protocol::types::{FormatCode, Oid};
use crate::types::DecodeFn;
use crate::value::Field;

/// Identity of a logical prepared statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sql: String,
    // big-endian u32 OIDs of the bound parameter types, in order
    oid_fingerprint: Vec<u8>,
}

impl CacheKey {
    /// Build the key for a statement execution.
    pub fn new(sql: &str, param_oids: &[Oid]) -> Self {
        let mut oid_fingerprint = Vec::with_capacity(param_oids.len() * 4);
        for oid in param_oids {
            oid_fingerprint.extend_from_slice(&oid.to_be_bytes());
        }
        Self {
            sql: sql.to_string(),
            oid_fingerprint,
        }
    }
}

/// Server-side statement descriptor.
#[derive(Debug)]
pub struct Statement {
    index: usize,
    execution_count: u32,
    prepared: bool,
    fields: Option<Arc<[Field]>>,
    decoders: Option<Arc<[DecodeFn]>>,
    // wire format the fields and decoders were described under; the
    // result format is a per-call choice, not part of the cache key
    result_format: FormatCode,
}

impl Statement {
    /// The server-side statement name for this entry.
    pub fn name(&self) -> String {
        format!("_pagio_{:03}", self.index)
    }

    /// The cache index (1-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the server holds a parsed statement under [`Self::name`].
    pub fn prepared(&self) -> bool {
        self.prepared
    }

    /// Number of committed executions while unprepared.
    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }
}

/// Cache outcome for one execution.
#[derive(Debug)]
pub enum Lookup {
    /// Caching disabled, or a fresh entry was just inserted. Inserting
    /// into a full cache evicts the oldest entry; when that entry was
    /// prepared it is handed back so the engine closes it in this same
    /// flow, before any Parse can reuse its name.
    Miss {
        /// Prepared statement displaced by the insertion.
        evicted: Option<Statement>,
    },
    /// Entry exists but is still below the prepare threshold.
    Hit,
    /// Entry just reached the threshold: issue Parse under `name` now.
    Prepare {
        /// Server-side statement name to parse under.
        name: String,
    },
    /// Entry is prepared server-side: skip Parse and Describe.
    Prepared {
        /// Server-side statement name to bind.
        name: String,
        /// Result fields captured when the statement was described.
        fields: Option<Arc<[Field]>>,
        /// Decoders picked for those fields.
        decoders: Option<Arc<[DecodeFn]>>,
        /// Wire format the stored decoders expect; executions under a
        /// different result format must re-derive their decoders.
        result_format: FormatCode,
    },
}

/// Insertion-ordered statement cache with LRU eviction.
pub struct StatementCache {
    entries: Option<LruCache<CacheKey, Statement>>,
    prepare_threshold: u32,
    max_size: usize,
    free_indices: Vec<usize>,
    next_index: usize,
}

impl StatementCache {
    /// Create a cache. A threshold or size of zero disables caching.
    pub fn new(max_size: usize, prepare_threshold: u32) -> Self {
        let entries = NonZeroUsize::new(if prepare_threshold == 0 { 0 } else { max_size })
            .map(LruCache::new);
        Self {
            entries,
            prepare_threshold,
            max_size,
            free_indices: Vec::new(),
            next_index: 0,
        }
    }

    /// Whether statements are being cached at all.
    pub fn enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    /// True when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classify this execution, inserting a fresh entry on a miss.
    ///
    /// Neither entry order nor execution counts change here; that
    /// happens when the cycle commits.
    pub fn lookup_or_insert(&mut self, key: &CacheKey) -> Lookup {
        let Some(entries) = &mut self.entries else {
            return Lookup::Miss { evicted: None };
        };

        match entries.peek(key) {
            Some(stmt) if stmt.prepared => {
                return Lookup::Prepared {
                    name: stmt.name(),
                    fields: stmt.fields.clone(),
                    decoders: stmt.decoders.clone(),
                    result_format: stmt.result_format,
                };
            }
            Some(stmt) if stmt.execution_count >= self.prepare_threshold => {
                return Lookup::Prepare { name: stmt.name() };
            }
            Some(_) => return Lookup::Hit,
            None => {}
        }

        let evicted = if entries.len() == self.max_size {
            entries.pop_lru()
        } else {
            None
        };
        let index = match &evicted {
            Some((_, stmt)) => stmt.index,
            None => self.free_indices.pop().unwrap_or_else(|| {
                self.next_index += 1;
                self.next_index
            }),
        };
        entries.push(
            key.clone(),
            Statement {
                index,
                execution_count: 0,
                prepared: false,
                fields: None,
                decoders: None,
                result_format: FormatCode::default(),
            },
        );
        Lookup::Miss {
            evicted: evicted.and_then(|(_, stmt)| stmt.prepared.then_some(stmt)),
        }
    }

    /// Commit a successful execute cycle.
    ///
    /// Moves the entry to the most-recent position, counts the
    /// execution, and marks it prepared (attaching the described fields
    /// and decoders, together with the result format they were
    /// described under) when the named Parse of this cycle was
    /// acknowledged.
    pub fn commit_success(
        &mut self,
        key: &CacheKey,
        prepared_now: bool,
        fields: Option<Arc<[Field]>>,
        decoders: Option<Arc<[DecodeFn]>>,
        result_format: FormatCode,
    ) {
        let Some(entries) = &mut self.entries else {
            return;
        };
        if let Some(stmt) = entries.get_mut(key) {
            if prepared_now {
                stmt.prepared = true;
                stmt.fields = fields;
                stmt.decoders = decoders;
                stmt.result_format = result_format;
            } else if !stmt.prepared {
                stmt.execution_count += 1;
            }
        }
    }

    /// Commit a failed execute cycle.
    ///
    /// An unprepared entry stays in place. A prepared entry is detached
    /// and returned so the engine can schedule its server-side close;
    /// its index returns to the free pool (any Close is written before
    /// a Parse could reuse the name, so reuse is safe).
    pub fn commit_failure(&mut self, key: &CacheKey) -> Option<Statement> {
        let entries = self.entries.as_mut()?;
        if !entries.peek(key).is_some_and(|stmt| stmt.prepared) {
            return None;
        }
        let stmt = entries.pop(key)?;
        self.free_indices.push(stmt.index);
        Some(stmt)
    }

    /// Wipe the cache (DISCARD ALL / DEALLOCATE ALL committed).
    pub fn clear(&mut self) {
        if let Some(entries) = &mut self.entries {
            entries.clear();
        }
        self.free_indices.clear();
        self.next_index = 0;
    }
}
