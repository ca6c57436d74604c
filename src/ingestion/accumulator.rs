//! Batch Accumulator - buffers mapped records until a flush

use crate::ingestion::mapper::NormalizedRecord;

/// Default number of records per transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// An ordered group of records persisted as one transaction
#[derive(Debug, Clone, Default)]
pub struct Batch {
    records: Vec<NormalizedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.iter()
    }
}

impl From<Vec<NormalizedRecord>> for Batch {
    fn from(records: Vec<NormalizedRecord>) -> Self {
        Self { records }
    }
}

/// Holds the single open batch.
///
/// Not thread-safe by contract: one producer appends and one consumer drains.
#[derive(Debug)]
pub struct BatchAccumulator {
    threshold: usize,
    open: Vec<NormalizedRecord>,
}

impl BatchAccumulator {
    /// `threshold` must be at least 1
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            open: Vec::with_capacity(threshold),
        }
    }

    pub fn append(&mut self, record: NormalizedRecord) {
        self.open.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.open.len() >= self.threshold
    }

    /// Take the open batch, leaving an empty one in its place
    pub fn drain(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.open, Vec::with_capacity(self.threshold));
        Batch { records }
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::mapper::RecordMapper;
    use serde_json::json;

    fn record(i: usize) -> NormalizedRecord {
        RecordMapper::vehicle().map(&json!({ "vin11": format!("VIN{}", i) }))
    }

    #[test]
    fn test_full_at_threshold() {
        let mut acc = BatchAccumulator::new(3);
        acc.append(record(1));
        acc.append(record(2));
        assert!(!acc.is_full());
        acc.append(record(3));
        assert!(acc.is_full());
    }

    #[test]
    fn test_drain_preserves_order_and_resets() {
        let mut acc = BatchAccumulator::new(2);
        acc.append(record(1));
        acc.append(record(2));

        let batch = acc.drain();
        assert_eq!(batch.len(), 2);
        assert_eq!(acc.len(), 0);
        assert!(!acc.is_full());

        let plates: Vec<_> = batch
            .iter()
            .map(|r| r.get("plate").cloned())
            .collect();
        assert_eq!(
            plates,
            vec![
                Some(crate::ingestion::mapper::FieldValue::Text("VIN1".to_string())),
                Some(crate::ingestion::mapper::FieldValue::Text("VIN2".to_string())),
            ]
        );
    }

    #[test]
    fn test_drain_empty() {
        let mut acc = BatchAccumulator::default();
        assert_eq!(acc.threshold(), DEFAULT_BATCH_SIZE);
        assert!(acc.drain().is_empty());
    }
}
