//! Append-only record buffer
//!
//! Owns the committed records and the last assigned sequence number. It has no
//! locking of its own; the memory store only touches it under the fair lock.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::filter::matches_query;
use crate::types::{Event, EventQuery, EventRecord};

/// Ordered, gap-free sequence of committed records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStream {
    event_records: Vec<EventRecord>,
    last_sequence_number: u64,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a stream from persisted parts, checking its ordering invariants
    pub fn from_parts(event_records: Vec<EventRecord>, last_sequence_number: u64) -> StoreResult<Self> {
        let mut previous = 0u64;
        for record in &event_records {
            if record.sequence_number <= previous {
                return Err(StoreError::invalid_record(format!(
                    "sequence number {} does not follow {}",
                    record.sequence_number, previous
                )));
            }
            previous = record.sequence_number;
        }
        if previous > last_sequence_number {
            return Err(StoreError::invalid_record(format!(
                "last sequence number {last_sequence_number} is behind record {previous}"
            )));
        }

        Ok(Self {
            event_records,
            last_sequence_number,
        })
    }

    pub fn into_parts(self) -> (Vec<EventRecord>, u64) {
        (self.event_records, self.last_sequence_number)
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.event_records
    }

    pub fn len(&self) -> usize {
        self.event_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_records.is_empty()
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }

    /// Commit events in order, assigning the next sequence numbers
    pub fn append(&mut self, events: Vec<Event>, timestamp: DateTime<Utc>) -> Vec<EventRecord> {
        let records: Vec<EventRecord> = events
            .into_iter()
            .map(|event| {
                self.last_sequence_number += 1;
                EventRecord::commit(event, self.last_sequence_number, timestamp)
            })
            .collect();
        self.event_records.extend(records.iter().cloned());
        records
    }

    /// All records matching the query, in ascending sequence order.
    ///
    /// Streams with at least `parallel_threshold` records are scanned in parallel.
    pub fn scan(&self, query: &EventQuery, parallel_threshold: usize) -> Vec<EventRecord> {
        if query.is_match_all() {
            return self.event_records.clone();
        }

        if self.event_records.len() >= parallel_threshold {
            self.event_records
                .par_iter()
                .filter(|record| matches_query(*record, query))
                .cloned()
                .collect()
        } else {
            self.event_records
                .iter()
                .filter(|record| matches_query(*record, query))
                .cloned()
                .collect()
        }
    }

    /// Sequence number of the last record matching the query, or 0
    pub fn max_sequence_number(&self, query: &EventQuery) -> u64 {
        self.event_records
            .iter()
            .rev()
            .find(|record| matches_query(*record, query))
            .map_or(0, |record| record.sequence_number)
    }
}
