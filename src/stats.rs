//! Aggregate statistics over record files.

use crate::error::Result;
use crate::record::ImageRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Counters over a set of records.
///
/// Ordered maps keep rendering deterministic. [`merge`](DatasetStats::merge)
/// is commutative and associative with the `Default` value as identity,
/// so per-worker partials can fold in any completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    /// Records seen.
    pub total: u64,
    /// Count per human-readable label.
    pub label_text: BTreeMap<String, u64>,
    /// Count per normalized label class.
    pub label_id: BTreeMap<i64, u64>,
    /// Count per raw label class.
    pub label_raw: BTreeMap<i64, u64>,
    /// Count per source organization.
    pub source: BTreeMap<i64, u64>,
    /// Count per encoded image format.
    pub format: BTreeMap<String, u64>,
    /// Count per colorspace bucket.
    pub colorspace: BTreeMap<String, u64>,
}

impl DatasetStats {
    /// Count one record.
    pub fn observe(&mut self, record: &ImageRecord) {
        self.total += 1;
        *self
            .label_text
            .entry(record.label_text.clone())
            .or_default() += 1;
        *self.label_id.entry(record.label_id).or_default() += 1;
        *self.label_raw.entry(record.label_raw).or_default() += 1;
        *self.source.entry(record.source_id).or_default() += 1;
        *self.format.entry(record.format.clone()).or_default() += 1;
        *self
            .colorspace
            .entry(record.colorspace.clone())
            .or_default() += 1;
    }

    /// Fold another partial into this one.
    pub fn merge(&mut self, other: DatasetStats) {
        self.total += other.total;
        merge_counts(&mut self.label_text, other.label_text);
        merge_counts(&mut self.label_id, other.label_id);
        merge_counts(&mut self.label_raw, other.label_raw);
        merge_counts(&mut self.source, other.source);
        merge_counts(&mut self.format, other.format);
        merge_counts(&mut self.colorspace, other.colorspace);
    }

    /// Pretty JSON rendering of all counters.
    ///
    /// # Errors
    /// Returns any JSON encoding error.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn merge_counts<K: Ord>(into: &mut BTreeMap<K, u64>, from: BTreeMap<K, u64>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}

impl fmt::Display for DatasetStats {
    // The summary text layout. The label section always prints, even
    // when empty; the others only when they have entries.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total: {}", self.total)?;
        writeln!(f, "Label:")?;
        for (label, count) in &self.label_text {
            writeln!(f, "    - {label}: {count}")?;
        }
        section(f, "Source:", &self.source)?;
        section(f, "Label ID:", &self.label_id)?;
        section(f, "Label Raw:", &self.label_raw)?;
        section(f, "Format:", &self.format)?;
        section(f, "Colorspace:", &self.colorspace)?;
        Ok(())
    }
}

fn section<K: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    counts: &BTreeMap<K, u64>,
) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title}")?;
    for (key, count) in counts {
        writeln!(f, "    - {key}: {count}")?;
    }
    Ok(())
}
