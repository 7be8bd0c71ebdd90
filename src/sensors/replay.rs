//! Replays a recorded sensor trace into a [`SensorHub`] on the tokio clock.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

use super::{SensorEvent, SensorHub};

/// One platform callback at a fixed offset from replay start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub offset_ms: u64,
    pub event: SensorEvent,
}

/// Publishes `events` into `hub` at their recorded offsets.
///
/// The task resolves to the number of events delivered to at least one
/// subscriber.
pub fn spawn_replay(hub: SensorHub, mut events: Vec<RecordedEvent>) -> JoinHandle<usize> {
    events.sort_by_key(|recorded| recorded.offset_ms);
    let start = Instant::now();

    tokio::spawn(async move {
        let mut delivered = 0;
        for recorded in events {
            time::sleep_until(start + Duration::from_millis(recorded.offset_ms)).await;
            if hub.publish(recorded.event) > 0 {
                delivered += 1;
            }
        }
        delivered
    })
}
