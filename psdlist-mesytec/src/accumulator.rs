//! Per-chunk event storage and the merge across chunks.

use psdlist_core::{CompactEvent, PixelIndex, DETECTOR_PIXEL_COUNT};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counters collected while decoding.
///
/// Each worker keeps its own copy; copies are summed after the parallel
/// phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStatistics {
    /// Chunks the block section was split into.
    pub chunks: u64,
    /// Data blocks decoded.
    pub blocks: u64,
    /// Chopper triggers kept.
    pub trigger_events: u64,
    /// Trigger records for other channels or trigger types.
    pub foreign_triggers: u64,
    /// Neutron events stored per pixel.
    pub neutron_events: u64,
    /// Neutron events dropped for an out-of-range pixel index.
    pub bad_pixel_events: u64,
    /// Neutron events dropped because no chopper trigger preceded them.
    pub pre_chopper_discarded: u64,
    /// Time-of-flight values emitted.
    pub emitted_events: u64,
}

impl AddAssign for DecodeStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks += rhs.chunks;
        self.blocks += rhs.blocks;
        self.trigger_events += rhs.trigger_events;
        self.foreign_triggers += rhs.foreign_triggers;
        self.neutron_events += rhs.neutron_events;
        self.bad_pixel_events += rhs.bad_pixel_events;
        self.pre_chopper_discarded += rhs.pre_chopper_discarded;
        self.emitted_events += rhs.emitted_events;
    }
}

impl DecodeStatistics {
    /// Logs recoverable data problems once, as a summary.
    pub fn report(&self) {
        if self.bad_pixel_events > 0 {
            log::warn!(
                "dropped {} neutron events with out-of-range pixel index",
                self.bad_pixel_events
            );
        }
        if self.pre_chopper_discarded > 0 {
            log::info!(
                "discarded {} neutron events recorded before the first chopper trigger",
                self.pre_chopper_discarded
            );
        }
        log::info!(
            "decoded {} blocks in {} chunks: {} chopper triggers, {} neutron events, {} emitted",
            self.blocks,
            self.chunks,
            self.trigger_events,
            self.neutron_events,
            self.emitted_events
        );
    }
}

/// Events collected from one chunk.
#[derive(Debug, Clone)]
pub struct EventAccumulator {
    /// Chopper trigger events.
    pub trigger_events: Vec<CompactEvent>,
    /// Neutron events indexed by pixel.
    pub neutron_events: Vec<Vec<CompactEvent>>,
    /// Counters for this chunk.
    pub statistics: DecodeStatistics,
}

impl Default for EventAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAccumulator {
    /// Creates an empty accumulator with one list per detector pixel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trigger_events: Vec::new(),
            neutron_events: vec![Vec::new(); DETECTOR_PIXEL_COUNT],
            statistics: DecodeStatistics::default(),
        }
    }

    /// Stores a chopper trigger.
    #[inline]
    pub fn add_trigger(&mut self, timestamp: u64) {
        self.trigger_events.push(CompactEvent::new(timestamp));
        self.statistics.trigger_events += 1;
    }

    /// Stores a neutron event for `pixel`.
    #[inline]
    pub fn add_neutron(&mut self, pixel: PixelIndex, timestamp: u64) {
        self.neutron_events[pixel.as_usize()].push(CompactEvent::new(timestamp));
        self.statistics.neutron_events += 1;
    }

    /// Counts a trigger that is not a chopper trigger.
    #[inline]
    pub fn record_foreign_trigger(&mut self) {
        self.statistics.foreign_triggers += 1;
    }

    /// Counts a neutron event with an invalid pixel.
    #[inline]
    pub fn record_bad_pixel(&mut self) {
        self.statistics.bad_pixel_events += 1;
    }

    /// Counts a fully decoded block.
    #[inline]
    pub fn record_block(&mut self) {
        self.statistics.blocks += 1;
    }

    /// Total number of stored neutron events.
    #[must_use]
    pub fn neutron_count(&self) -> usize {
        self.neutron_events.iter().map(Vec::len).sum()
    }

    /// Returns true if the pre-synchronization ordering holds: triggers
    /// descending, every pixel ascending.
    #[must_use]
    pub fn is_sorted_for_sync(&self) -> bool {
        self.trigger_events
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp)
            && self
                .neutron_events
                .par_iter()
                .all(|events| events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp))
    }
}

/// Merges per-chunk accumulators into one.
///
/// Trigger lists are concatenated and sorted descending on the calling
/// thread. Pixel lists are concatenated in chunk order and sorted ascending
/// in parallel over pixel index. Duplicates are kept.
#[must_use]
pub fn merge(accumulators: Vec<EventAccumulator>) -> EventAccumulator {
    let mut iter = accumulators.into_iter();
    let Some(mut merged) = iter.next() else {
        return EventAccumulator::new();
    };
    let rest: Vec<EventAccumulator> = iter.collect();

    let trigger_total =
        merged.trigger_events.len() + rest.iter().map(|a| a.trigger_events.len()).sum::<usize>();
    merged.trigger_events.reserve(trigger_total - merged.trigger_events.len());
    for acc in &rest {
        merged.trigger_events.extend_from_slice(&acc.trigger_events);
        merged.statistics += acc.statistics;
    }
    merged
        .trigger_events
        .sort_unstable_by(|a, b| b.timestamp.cmp(&a.timestamp));

    merged
        .neutron_events
        .par_iter_mut()
        .enumerate()
        .for_each(|(pixel, events)| {
            for acc in &rest {
                events.extend_from_slice(&acc.neutron_events[pixel]);
            }
            events.sort_unstable();
        });

    merged
}
