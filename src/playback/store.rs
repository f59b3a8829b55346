use crate::timestep::TimestepRecord;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parsed timestep sequence currently available for playback.
///
/// Replaced wholesale on every successful ingest; never partially updated.
#[derive(Debug, Default)]
pub struct TimestepStore {
    records: Vec<TimestepRecord>,
    load_id: Option<Uuid>,
    loaded_at: Option<DateTime<Utc>>,
}

impl TimestepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new sequence. Returns the time-ordered id tagging this load.
    pub fn replace(&mut self, records: Vec<TimestepRecord>) -> Uuid {
        let load_id = Uuid::now_v7();
        self.records = records;
        self.load_id = Some(load_id);
        self.loaded_at = Some(Utc::now());
        load_id
    }

    pub fn get(&self, index: usize) -> Option<&TimestepRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load_id(&self) -> Option<Uuid> {
        self.load_id
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}
