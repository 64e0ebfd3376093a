//! Periodic push of projected rates to an upstream receiver. Grounded on
//! `app/owen_poller/sender.py`'s dispatch loop in the original
//! implementation; `reqwest` stands in for `httpx`.

use std::time::Duration;

use serde::Serialize;
use tracing::error;
use url::Url;

use crate::rate::RateProjector;
use crate::registry::SensorRegistry;

const UPLINK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct UplinkEntry {
    sensor: String,
    value: f64,
}

/// Runs forever, POSTing one batch of projected rates every
/// [`UPLINK_INTERVAL`]. Network and decode errors are logged and swallowed;
/// the next cycle supersedes a failed one rather than retrying it
/// (`spec.md` §6).
pub async fn run(registry: &SensorRegistry, receiver_url: Url, receiver_token: String, timeout: Duration) {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build uplink HTTP client, uplink disabled");
            return;
        }
    };
    let projector = RateProjector::new();

    loop {
        tokio::time::sleep(UPLINK_INTERVAL).await;

        let mut batch = Vec::new();
        for sensor in registry.iter() {
            let reading = sensor.last_reading();
            let Some(sample) = projector.project(&sensor.name, &reading) else {
                continue;
            };
            let Some(value) = sample.value else {
                continue;
            };
            batch.push(UplinkEntry {
                sensor: sensor.name.clone(),
                value,
            });
        }

        if batch.is_empty() {
            continue;
        }

        if let Err(e) = dispatch(&client, receiver_url.clone(), &receiver_token, &batch).await {
            error!(error = %e, "uplink dispatch failed");
        }
    }
}

async fn dispatch(
    client: &reqwest::Client,
    url: Url,
    token: &str,
    batch: &[UplinkEntry],
) -> Result<(), reqwest::Error> {
    client
        .post(url)
        .header("Authorization", format!("Token {token}"))
        .json(batch)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
