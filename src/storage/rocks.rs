// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed ordered engine.

use std::path::{Path, PathBuf};

use rocksdb::{
    BlockBasedOptions, Cache, DBCompactionStyle, DBRawIteratorWithThreadMode, DBWithThreadMode,
    MultiThreaded, Options, UniversalCompactOptions, UniversalCompactionStopStyle, WriteBatch,
    WriteOptions,
};
use tracing::{error, info};

use crate::docdb::{DurabilityMode, Result, RocksDbConfig};

use super::options::prefix_successor;
use super::{KvEngine, KvIterator, KvWriteBatch, ReadOptions, WriteOp};

type Db = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed engine.
///
/// Keys are compared with RocksDB's default bytewise comparator, which is the
/// order the document key encoding is designed for.
pub struct RocksEngine {
    db: Db,
    path: PathBuf,
    write_opts: WriteOptions,
}

impl RocksEngine {
    /// Opens or creates a database at `path` with options derived from `config`.
    pub fn open(path: &Path, config: &RocksDbConfig) -> Result<Self> {
        Self::open_with_options(path, Self::build_options(config), config.durability)
    }

    /// Opens a database with caller-built RocksDB options.
    pub fn open_with_options(
        path: &Path,
        opts: Options,
        durability: DurabilityMode,
    ) -> Result<Self> {
        let db = Db::open(&opts, path)?;
        info!(path = %path.display(), ?durability, "opened rocksdb");

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(durability == DurabilityMode::FsyncEveryWrite);

        Ok(Self {
            db,
            path: path.to_path_buf(),
            write_opts,
        })
    }

    /// Translates a [`RocksDbConfig`] into RocksDB options.
    pub fn build_options(config: &RocksDbConfig) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_size(config.block_size_bytes);
        if config.block_cache_size_bytes > 0 {
            let cache = Cache::new_lru_cache(config.block_cache_size_bytes);
            block_opts.set_block_cache(&cache);
            // Keep bloom filters in the block cache too.
            block_opts.set_cache_index_and_filter_blocks(true);
        } else {
            block_opts.disable_cache();
        }
        if config.use_bloom_filter {
            block_opts.set_bloom_filter(10.0, false);
        }
        opts.set_block_based_table_factory(&block_opts);

        if config.disable_compactions {
            opts.set_disable_auto_compactions(true);
        } else {
            opts.set_compaction_style(DBCompactionStyle::Universal);
            opts.set_num_levels(1);
            opts.set_max_background_jobs(
                config.max_background_compactions + config.max_background_flushes,
            );
            opts.set_level_zero_file_num_compaction_trigger(
                config.level0_file_num_compaction_trigger,
            );
            opts.set_level_zero_slowdown_writes_trigger(config.level0_slowdown_writes_trigger);
            opts.set_level_zero_stop_writes_trigger(config.level0_stop_writes_trigger);

            let mut universal = UniversalCompactOptions::default();
            universal.set_stop_style(UniversalCompactionStopStyle::Total);
            universal.set_size_ratio(config.universal_compaction_size_ratio);
            universal.set_min_merge_width(config.universal_compaction_min_merge_width);
            opts.set_universal_compaction_options(&universal);

            if config.compact_flush_rate_limit_bytes_per_sec > 0 {
                opts.set_ratelimiter(config.compact_flush_rate_limit_bytes_per_sec, 100_000, 10);
            }
        }

        opts
    }

    /// Returns the directory the database lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates a database in a fresh temporary directory for testing.
    #[cfg(test)]
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::TempDir::new()?;
        let engine = Self::open(dir.path(), &RocksDbConfig::default())?;
        Ok((engine, dir))
    }
}

impl KvEngine for RocksEngine {
    type Cursor<'a> = RocksCursor<'a>;

    fn raw_iterator(&self, options: &ReadOptions) -> RocksCursor<'_> {
        let mut read_opts = rocksdb::ReadOptions::default();
        if let Some(prefix) = options.restricted_prefix() {
            read_opts.set_iterate_lower_bound(prefix.to_vec());
            if let Some(upper) = prefix_successor(prefix) {
                read_opts.set_iterate_upper_bound(upper);
            }
        }
        RocksCursor {
            inner: self.db.raw_iterator_opt(read_opts),
        }
    }

    fn write(&self, batch: KvWriteBatch) -> Result<()> {
        let mut rocks_batch = WriteBatch::default();
        for op in batch {
            match op {
                WriteOp::Put { key, value } => rocks_batch.put(key, value),
                WriteOp::Delete { key } => rocks_batch.delete(key),
            }
        }

        self.db.write_opt(rocks_batch, &self.write_opts).map_err(|e| {
            error!(error = %e, "failed writing to rocksdb");
            e.into()
        })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        info!(path = %self.path.display(), "flushed rocksdb memtables");
        Ok(())
    }
}

/// Cursor over a [`RocksEngine`].
///
/// Each cursor reads from the implicit snapshot RocksDB takes when it is created.
pub struct RocksCursor<'a> {
    inner: DBRawIteratorWithThreadMode<'a, Db>,
}

impl RocksCursor<'_> {
    fn status(&self) -> Result<()> {
        self.inner.status()?;
        Ok(())
    }
}

impl KvIterator for RocksCursor<'_> {
    fn seek_to_first(&mut self) -> Result<()> {
        self.inner.seek_to_first();
        self.status()
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.inner.seek(key);
        self.status()
    }

    fn next(&mut self) -> Result<()> {
        self.inner.next();
        self.status()
    }

    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn key(&self) -> &[u8] {
        self.inner.key().unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.inner.value().unwrap_or_default()
    }
}
