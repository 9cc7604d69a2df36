//! Grouping a row stream into fixed-size shards.

use crate::metadata::ImageRow;

/// Number of shard files a build will produce.
///
/// A single shard absorbs everything when `per_shard` exceeds the total;
/// otherwise rows split into `ceil(total / per_shard)` files.
///
/// # Panics
/// When `per_shard` is zero. Configuration validation rejects that
/// before any shard math runs.
#[must_use]
pub fn total_shards(total_records: usize, per_shard: usize) -> usize {
    assert!(per_shard > 0, "per_shard must be nonzero");
    if per_shard > total_records {
        1
    } else {
        total_records.div_ceil(per_shard)
    }
}

/// A planned output file: its 1-based id, the planned file count, and
/// the rows it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub id: usize,
    pub total: usize,
    pub rows: Vec<ImageRow>,
}

impl Shard {
    /// On-disk file name, e.g. `train-00001-of-00003`.
    #[must_use]
    pub fn file_name(&self, name: &str) -> String {
        format!("{name}-{:05}-of-{:05}", self.id, self.total)
    }
}

/// Groups rows into [`Shard`]s of `per_shard` rows each.
///
/// Ids start at 1 and are contiguous; only the shard emitted by
/// [`finish`](ShardAccumulator::finish) may be short.
pub struct ShardAccumulator {
    per_shard: usize,
    total: usize,
    next_id: usize,
    rows: Vec<ImageRow>,
}

impl ShardAccumulator {
    /// Plan shards for `total_records` rows.
    ///
    /// # Panics
    /// When `per_shard` is zero.
    #[must_use]
    pub fn new(total_records: usize, per_shard: usize) -> Self {
        Self {
            per_shard,
            total: total_shards(total_records, per_shard),
            next_id: 1,
            rows: Vec::with_capacity(per_shard.min(total_records)),
        }
    }

    /// Add a row, emitting a full shard once `per_shard` rows are held.
    pub fn push(&mut self, row: ImageRow) -> Option<Shard> {
        self.rows.push(row);
        if self.rows.len() < self.per_shard {
            return None;
        }
        Some(self.emit())
    }

    /// Emit the final short shard, if any rows remain.
    #[must_use]
    pub fn finish(mut self) -> Option<Shard> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    fn emit(&mut self) -> Shard {
        let rows = std::mem::take(&mut self.rows);
        let shard = Shard {
            id: self.next_id,
            total: self.total,
            rows,
        };
        self.next_id += 1;
        shard
    }
}
