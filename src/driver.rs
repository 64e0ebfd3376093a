//! Closed set of device drivers a sensor can bind to: a real OWEN-CI8 slave
//! or the `Dummy` simulator (`spec.md` §9's "model devices as a closed
//! variant set").

use serde::Deserialize;

use crate::bus::Bus;
use crate::device::{Device, ParamValue, ParameterId};
use crate::dummy::DummyCounter;
use crate::error::DeviceError;

/// Which driver a configured sensor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    OwenCi8,
    Dummy,
}

pub enum Driver {
    OwenCi8(Device),
    Dummy(DummyCounter),
}

impl Driver {
    /// `Ok(None)` means a successful read whose value is absent (the dummy
    /// driver's scripted offline tick); only an `Err` is an actual failed
    /// transaction. A real OWEN-CI8 read never succeeds without a value.
    pub async fn read_parameter(
        &self,
        bus: &Bus,
        parameter_id: ParameterId,
    ) -> Result<Option<ParamValue>, DeviceError> {
        match self {
            Driver::OwenCi8(device) => device.read_parameter(bus, parameter_id).await.map(Some),
            Driver::Dummy(dummy) => dummy.read_parameter().await,
        }
    }
}
