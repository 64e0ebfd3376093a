//! Ordered set of configured sensors, each binding a logical name to
//! (driver, parameter id, bus), owning the per-sensor latest-reading state.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::bus::Bus;
use crate::device::{Device, ParamValue, ParameterId};
use crate::driver::{Driver, DriverKind};
use crate::dummy::DummyCounter;
use crate::error::{DeviceError, DeviceNotFound};

/// One configured sensor entry, as loaded from `sensors_settings`.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorSettings {
    pub name: String,
    pub driver: DriverKind,
    #[serde(default)]
    pub addr: u16,
    #[serde(default = "default_addr_width")]
    pub addr_width: u8,
    pub parameter: ParameterId,
}

fn default_addr_width() -> u8 {
    8
}

/// The latest (value, time) pair for a sensor. `value` is `None` when the
/// sensor has never been successfully read (`spec.md` §3's "absence
/// marker"); once a value lands it is never cleared by a later failure.
#[derive(Debug, Clone)]
pub struct Reading {
    pub value: Option<ParamValue>,
    pub time: DateTime<Utc>,
}

impl Reading {
    fn absent() -> Self {
        Reading {
            value: None,
            time: Utc::now(),
        }
    }
}

/// A sensor: an immutable binding plus its mutable latest reading. Only the
/// polling engine calls `update`; everyone else only ever reads via
/// `last_reading`, which always observes a complete, atomically-published
/// `(value, time)` pair (`spec.md` §5).
pub struct Sensor {
    pub name: String,
    pub parameter_id: ParameterId,
    driver: Driver,
    reading: ArcSwap<Reading>,
}

impl Sensor {
    pub fn last_reading(&self) -> Arc<Reading> {
        self.reading.load_full()
    }

    /// Performs one transaction and publishes the result on success —
    /// including a successful read whose value is absent (the dummy
    /// driver's offline tick), which still advances `last_reading.time` and
    /// clears its value exactly like a real read would. Only a failed
    /// transaction leaves `last_reading` untouched, with the error returned
    /// for the caller to log (`spec.md` §4.5).
    pub async fn update(&self, bus: &Bus) -> Result<(), DeviceError> {
        let value = self.driver.read_parameter(bus, self.parameter_id).await?;
        self.reading.store(Arc::new(Reading {
            value,
            time: Utc::now(),
        }));
        Ok(())
    }
}

/// Ordered set of configured sensors sharing one bus. Lookup by name is
/// O(1); iteration preserves configuration order.
pub struct SensorRegistry {
    bus: Bus,
    sensors: Vec<Sensor>,
    by_name: HashMap<String, usize>,
}

impl SensorRegistry {
    pub fn new(bus: Bus, settings: Vec<SensorSettings>) -> Result<Self, DeviceError> {
        let mut sensors = Vec::with_capacity(settings.len());
        let mut by_name = HashMap::with_capacity(settings.len());
        for s in settings {
            if by_name.contains_key(&s.name) {
                return Err(DeviceError::Misconfigured(format!(
                    "duplicate sensor name: {}",
                    s.name
                )));
            }
            let driver = match s.driver {
                DriverKind::OwenCi8 => Driver::OwenCi8(Device::new(s.addr, s.addr_width)?),
                DriverKind::Dummy => Driver::Dummy(DummyCounter::new()),
            };
            by_name.insert(s.name.clone(), sensors.len());
            sensors.push(Sensor {
                name: s.name,
                parameter_id: s.parameter,
                driver,
                reading: ArcSwap::from_pointee(Reading::absent()),
            });
        }
        Ok(SensorRegistry {
            bus,
            sensors,
            by_name,
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Sensor, DeviceNotFound> {
        self.by_name
            .get(name)
            .map(|&i| &self.sensors[i])
            .ok_or_else(|| DeviceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::test_support::null_bus;

    #[test]
    fn rejects_duplicate_names() {
        let settings = vec![
            SensorSettings {
                name: "s1".into(),
                driver: DriverKind::Dummy,
                addr: 0,
                addr_width: 8,
                parameter: ParameterId::Dcnt,
            },
            SensorSettings {
                name: "s1".into(),
                driver: DriverKind::Dummy,
                addr: 0,
                addr_width: 8,
                parameter: ParameterId::Dcnt,
            },
        ];
        let err = SensorRegistry::new(null_bus(), settings).unwrap_err();
        assert!(matches!(err, DeviceError::Misconfigured(_)));
    }

    #[test]
    fn unknown_lookup_fails_with_device_not_found() {
        let bus = null_bus();
        let registry = SensorRegistry::new(
            bus,
            vec![SensorSettings {
                name: "s1".into(),
                driver: DriverKind::Dummy,
                addr: 0,
                addr_width: 8,
                parameter: ParameterId::Dcnt,
            }],
        )
        .unwrap();
        assert!(registry.get("s1").is_ok());
        assert_eq!(
            registry.get("nope").unwrap_err(),
            DeviceNotFound("nope".to_string())
        );
    }

    #[test]
    fn preserves_configuration_order() {
        let bus = null_bus();
        let names = ["c", "a", "b"];
        let settings = names
            .iter()
            .map(|n| SensorSettings {
                name: n.to_string(),
                driver: DriverKind::Dummy,
                addr: 0,
                addr_width: 8,
                parameter: ParameterId::Dcnt,
            })
            .collect();
        let registry = SensorRegistry::new(bus, settings).unwrap();
        let observed: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(observed, names);
    }
}
