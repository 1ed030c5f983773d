//! Chopper synchronization of neutron events.

use crate::accumulator::EventAccumulator;
use psdlist_core::{CancellationToken, CompactEvent, Result};

/// Front-end ticks per output time unit.
///
/// Taken as given from the acquisition software; the tick duration is not
/// documented with the data format.
pub const TICKS_PER_TOF_UNIT: f64 = 10.0;

/// Number of processed events between cancellation checks.
pub const EVENTS_PER_CANCEL_CHECK: usize = 100;

/// Finds the most recent trigger at or before `timestamp`.
///
/// `triggers` must be sorted descending. Returns 0 when no trigger precedes
/// the event.
#[inline]
#[must_use]
pub fn chopper_timestamp(triggers: &[CompactEvent], timestamp: u64) -> u64 {
    let idx = triggers.partition_point(|t| t.timestamp > timestamp);
    triggers.get(idx).map_or(0, |t| t.timestamp)
}

/// Converts a tick difference into time-of-flight units.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn time_of_flight(timestamp: u64, chopper_timestamp: u64) -> f64 {
    (timestamp - chopper_timestamp) as f64 / TICKS_PER_TOF_UNIT
}

/// Per-pixel time-of-flight lists produced by [`TimeSynchronizer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutput {
    /// Time-of-flight values per pixel, in event order.
    pub tof: Vec<Vec<f64>>,
    /// Events dropped because no trigger preceded them.
    pub pre_chopper_discarded: u64,
    /// Events emitted.
    pub emitted: u64,
    /// Largest emitted time-of-flight.
    pub max_tof: Option<f64>,
}

/// Matches every neutron event to its preceding chopper trigger.
#[derive(Debug, Clone)]
pub struct TimeSynchronizer {
    discard_pre_chopper_events: bool,
    cancel: CancellationToken,
}

impl TimeSynchronizer {
    /// Creates a synchronizer.
    #[must_use]
    pub fn new(discard_pre_chopper_events: bool, cancel: CancellationToken) -> Self {
        Self {
            discard_pre_chopper_events,
            cancel,
        }
    }

    /// Computes time-of-flight values for all pixels.
    ///
    /// Requires triggers sorted descending and every pixel list sorted
    /// ascending, as produced by [`crate::accumulator::merge`].
    ///
    /// # Errors
    /// Returns [`psdlist_core::Error::Cancelled`] if the token is cancelled;
    /// no partial output is returned.
    pub fn synchronize(&self, events: &EventAccumulator) -> Result<SyncOutput> {
        debug_assert!(events.is_sorted_for_sync());
        let triggers = &events.trigger_events;
        let mut output = SyncOutput {
            tof: Vec::with_capacity(events.neutron_events.len()),
            ..SyncOutput::default()
        };
        let mut processed = 0usize;

        for pixel_events in &events.neutron_events {
            let mut pixel_tof = Vec::with_capacity(pixel_events.len());
            for event in pixel_events {
                processed += 1;
                if processed % EVENTS_PER_CANCEL_CHECK == 0 {
                    self.cancel.check()?;
                }

                let chopper = chopper_timestamp(triggers, event.timestamp);
                if chopper == 0 && self.discard_pre_chopper_events {
                    output.pre_chopper_discarded += 1;
                    continue;
                }

                let tof = time_of_flight(event.timestamp, chopper);
                output.max_tof = Some(output.max_tof.map_or(tof, |m: f64| m.max(tof)));
                pixel_tof.push(tof);
            }
            output.emitted += pixel_tof.len() as u64;
            output.tof.push(pixel_tof);
        }

        self.cancel.check()?;
        Ok(output)
    }
}
