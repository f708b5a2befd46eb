//! Simulated sensor producing one reading per interval.

use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SENSOR_MAX_VALUE;
use crate::publisher::ReadingPublisher;

/// Spawns a task that submits a random integer reading in
/// `0..SENSOR_MAX_VALUE` every `interval` until `cancel` fires.
///
/// Returns the number of readings submitted when the task ends.
pub fn spawn_sensor(
    publisher: ReadingPublisher,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        info!("Sensor started, one reading every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; readings start one interval in.
        ticker.tick().await;

        let mut submitted = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let value = rand::rng().random_range(0..SENSOR_MAX_VALUE);
                    if publisher.submit(f64::from(value)).await {
                        submitted += 1;
                    } else {
                        debug!("Sensor reading {} dropped", value);
                    }
                }
            }
        }
        info!("Sensor stopped after {} readings", submitted);
        submitted
    })
}
