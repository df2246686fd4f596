// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the read path and the RocksDB engine.

use std::time::Duration;

/// Default number of `next()` steps tried before falling back to a native seek.
pub const DEFAULT_MAX_NEXTS_TO_AVOID_SEEK: usize = 8;

/// What to do with seek keys that carry a non-canonical hybrid time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekKeyCheck {
    /// Skip the check.
    Off,
    /// Log the offending key and seek anyway.
    Warn,
    /// Refuse the seek with [`DocDbError::InvalidSeekKey`](super::DocDbError::InvalidSeekKey).
    Strict,
}

impl Default for SeekKeyCheck {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            SeekKeyCheck::Strict
        } else {
            SeekKeyCheck::Off
        }
    }
}

/// Tunables threaded into every seek and lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekConfig {
    /// `next()` steps tried before a native seek when the target is ahead of the cursor.
    pub max_nexts_to_avoid_seek: usize,
    pub seek_key_check: SeekKeyCheck,
    /// Emit a trace event for every seek describing how it was performed.
    pub trace_calls: bool,
    /// Table-wide TTL for values stored without one of their own.
    pub default_ttl: Option<Duration>,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            max_nexts_to_avoid_seek: DEFAULT_MAX_NEXTS_TO_AVOID_SEEK,
            seek_key_check: SeekKeyCheck::default(),
            trace_calls: false,
            default_ttl: None,
        }
    }
}

impl SeekConfig {
    pub fn with_max_nexts_to_avoid_seek(mut self, max_nexts: usize) -> Self {
        self.max_nexts_to_avoid_seek = max_nexts;
        self
    }

    pub fn with_seek_key_check(mut self, check: SeekKeyCheck) -> Self {
        self.seek_key_check = check;
        self
    }

    pub fn with_trace_calls(mut self, trace: bool) -> Self {
        self.trace_calls = trace;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Durability mode for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Writes go to the WAL without an fsync.
    /// Durable against process crashes but not power failures.
    #[default]
    WalOnly,
    /// Writes are fsynced on every batch.
    FsyncEveryWrite,
}

/// RocksDB tuning used when opening an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RocksDbConfig {
    pub max_background_flushes: i32,
    pub disable_compactions: bool,
    pub base_background_compactions: i32,
    pub max_background_compactions: i32,
    /// `-1` disables the file-count trigger.
    pub level0_file_num_compaction_trigger: i32,
    pub level0_slowdown_writes_trigger: i32,
    pub level0_stop_writes_trigger: i32,
    /// Percentage up to which larger files are included in a universal compaction.
    pub universal_compaction_size_ratio: i32,
    pub universal_compaction_min_merge_width: i32,
    /// `0` disables the flush/compaction rate limiter.
    pub compact_flush_rate_limit_bytes_per_sec: i64,
    pub block_size_bytes: usize,
    /// `0` means no block cache.
    pub block_cache_size_bytes: usize,
    pub use_bloom_filter: bool,
    pub durability: DurabilityMode,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_background_flushes: 1,
            disable_compactions: false,
            base_background_compactions: 2,
            max_background_compactions: 4,
            level0_file_num_compaction_trigger: 5,
            level0_slowdown_writes_trigger: 24,
            level0_stop_writes_trigger: 48,
            universal_compaction_size_ratio: 20,
            universal_compaction_min_merge_width: 4,
            compact_flush_rate_limit_bytes_per_sec: 100 * 1024 * 1024,
            block_size_bytes: 32 * 1024,
            block_cache_size_bytes: 0,
            use_bloom_filter: true,
            durability: DurabilityMode::default(),
        }
    }
}

impl RocksDbConfig {
    pub fn with_disable_compactions(mut self, disable: bool) -> Self {
        self.disable_compactions = disable;
        self
    }

    pub fn with_block_cache_size(mut self, bytes: usize) -> Self {
        self.block_cache_size_bytes = bytes;
        self
    }

    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size_bytes = bytes;
        self
    }

    pub fn with_bloom_filter(mut self, enabled: bool) -> Self {
        self.use_bloom_filter = enabled;
        self
    }

    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_rate_limit(mut self, bytes_per_sec: i64) -> Self {
        self.compact_flush_rate_limit_bytes_per_sec = bytes_per_sec;
        self
    }
}

/// Top-level configuration of a [`DocDb`](super::DocDb).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocDbConfig {
    pub seek: SeekConfig,
    pub rocksdb: RocksDbConfig,
}

impl DocDbConfig {
    pub fn with_seek(mut self, seek: SeekConfig) -> Self {
        self.seek = seek;
        self
    }

    pub fn with_rocksdb(mut self, rocksdb: RocksDbConfig) -> Self {
        self.rocksdb = rocksdb;
        self
    }

    /// Sets the TTL applied to values written without one.
    pub fn with_table_ttl(mut self, ttl: Duration) -> Self {
        self.seek.default_ttl = Some(ttl);
        self
    }
}
