//! One-shot transient probe used by `GET /test_sensor/{addr}`: opens its own
//! serial handle independent of the shared polling bus, takes a single DCNT
//! reading, and tears the handle back down. Grounded on
//! `sensor_probe.py`'s `Serial(**settings)` / `close()` pattern in the
//! original implementation.

use serde::Serialize;

use crate::bus::{Bus, SerialSettings};
use crate::device::Device;
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Ok,
    Offline,
    Timeout,
}

#[derive(Debug, Serialize)]
pub struct ProbeResult {
    pub addr: u16,
    pub value: Option<f64>,
    pub status: ProbeStatus,
}

/// Opens a transient bus at `addr`, reads DCNT once, and closes it. Never
/// reuses the shared polling `Bus`: a hung probe must not hold up regular
/// polling.
pub async fn probe(serial: SerialSettings, addr: u16) -> Result<ProbeResult, DeviceError> {
    let bus = Bus::open(serial).map_err(|e| DeviceError::Misconfigured(e.to_string()))?;
    let device = Device::new(addr, 8)?;

    match device
        .read_parameter(&bus, crate::device::ParameterId::Dcnt)
        .await
    {
        Ok(value) => Ok(ProbeResult {
            addr,
            value: Some(value.as_f64()),
            status: ProbeStatus::Ok,
        }),
        Err(DeviceError::Timeout) => Ok(ProbeResult {
            addr,
            value: None,
            status: ProbeStatus::Timeout,
        }),
        // Anything else (a bad decode, an address/pid mismatch, ...) is a
        // genuine failure, not a clean offline probe result: propagate it,
        // same as a `Misconfigured` bus, for the caller to map to HTTP 500.
        Err(e) => Err(e),
    }
}
