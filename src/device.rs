//! A single addressed slave on the bus: binds an address and address width
//! to the codec, and performs one request/response transaction per call.

use std::time::Duration;

use crate::bus::Bus;
use crate::codec;
use crate::error::DeviceError;

/// A readable device quantity. See `spec.md` §3 for the parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterId {
    /// Pulse count.
    Dcnt,
    /// Speed.
    Dspd,
    /// Elapsed-time timer.
    Dtmr,
}

/// A value decoded from a device response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Count(u64),
    Elapsed(Duration),
}

impl ParamValue {
    /// Numeric projection used by the rate projector; durations are
    /// expressed in whole seconds as an `f64`, counts as-is.
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Count(v) => *v as f64,
            ParamValue::Elapsed(d) => d.as_secs_f64(),
        }
    }
}

/// Maximum displayable counter value, per `spec.md` §3.
pub const MAX_COUNTER_VALUE: u64 = 9_999_999;

impl ParameterId {
    pub const fn id_bytes(self) -> [u8; 2] {
        match self {
            ParameterId::Dcnt => [0xC1, 0x73],
            ParameterId::Dspd => [0x8F, 0xC2],
            ParameterId::Dtmr => [0xE6, 0x9C],
        }
    }

    /// Expected ASCII response length in bytes, per `spec.md` §3.
    pub const fn expected_ascii_len(self) -> usize {
        match self {
            ParameterId::Dcnt => 22,
            ParameterId::Dspd => 22,
            ParameterId::Dtmr => 28,
        }
    }

    fn decode(self, payload: &[u8]) -> Result<ParamValue, DeviceError> {
        match self {
            ParameterId::Dcnt | ParameterId::Dspd => {
                Ok(ParamValue::Count(codec::bcd_to_int(payload)?))
            }
            ParameterId::Dtmr => Ok(ParamValue::Elapsed(codec::clock_to_duration(payload)?)),
        }
    }
}

/// Valid slave address widths, in bits.
const ADDR_WIDTHS: [u8; 2] = [8, 11];

/// A configured OWEN-CI8 slave: an address, an address width, and the
/// precomputed on-wire address.
#[derive(Debug, Clone, Copy)]
pub struct Device {
    wire_addr: [u8; 2],
}

impl Device {
    /// Validates `addr_width` and `addr`, precomputes the wire address.
    /// Fails with `Misconfigured` (construction-time, per `spec.md` §7)
    /// rather than at first use.
    pub fn new(addr: u16, addr_width: u8) -> Result<Self, DeviceError> {
        if !ADDR_WIDTHS.contains(&addr_width) {
            return Err(DeviceError::Misconfigured(format!(
                "address width must be one of {ADDR_WIDTHS:?}, got {addr_width}"
            )));
        }
        let max_addr = (1u32 << addr_width) - 1;
        if addr as u32 > max_addr {
            return Err(DeviceError::Misconfigured(format!(
                "address {addr} out of range 0..={max_addr} for width {addr_width}"
            )));
        }
        let wire = (addr as u32) << (16 - addr_width as u32);
        let wire_addr = (wire as u16).to_be_bytes();
        Ok(Device { wire_addr })
    }

    pub fn wire_addr(&self) -> [u8; 2] {
        self.wire_addr
    }

    /// Performs one request/response transaction over `bus` and returns the
    /// decoded value. See `spec.md` §4.2 for the transaction steps.
    pub async fn read_parameter(
        &self,
        bus: &Bus,
        parameter_id: ParameterId,
    ) -> Result<ParamValue, DeviceError> {
        let id_bytes = parameter_id.id_bytes();
        let request = codec::encode_request(self.wire_addr, &id_bytes)?;
        let ascii_request = codec::encode_ascii(&request);

        let ascii_response = bus
            .transact(ascii_request, parameter_id.expected_ascii_len())
            .await
            .map_err(|e| DeviceError::Bus(e.to_string()))?;

        if ascii_response.is_empty() {
            return Err(DeviceError::Timeout);
        }

        let binary = codec::decode_ascii(&ascii_response)?;
        let payload = codec::validate_response(&binary, self.wire_addr, &id_bytes)?;
        if payload.is_empty() {
            return Err(DeviceError::Codec(crate::error::CodecError::BadLength));
        }

        parameter_id.decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_encoding_vectors() {
        assert_eq!(Device::new(0x7FF, 11).unwrap().wire_addr(), [0xFF, 0xE0]);
        assert_eq!(Device::new(0x555, 11).unwrap().wire_addr(), [0xAA, 0xA0]);
        assert_eq!(Device::new(0xA3, 8).unwrap().wire_addr(), [0xA3, 0x00]);
    }

    #[test]
    fn rejects_bad_address_width() {
        assert!(matches!(
            Device::new(0, 7),
            Err(DeviceError::Misconfigured(_))
        ));
    }

    #[test]
    fn rejects_address_out_of_range() {
        assert!(matches!(
            Device::new(256, 8),
            Err(DeviceError::Misconfigured(_))
        ));
        assert!(matches!(
            Device::new(2048, 11),
            Err(DeviceError::Misconfigured(_))
        ));
    }

    #[test]
    fn accepts_boundary_addresses() {
        assert!(Device::new(255, 8).is_ok());
        assert!(Device::new(2047, 11).is_ok());
        assert!(Device::new(0, 8).is_ok());
    }
}
