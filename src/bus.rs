//! A single serial line shared by every device addressed on it.
//!
//! Mutual exclusion and the blocking write-then-read transaction are
//! confined to a dedicated worker thread so that the async polling engine
//! never blocks its executor for the duration of `read_timeout`, while still
//! guaranteeing only one transaction is ever in flight on the wire (`spec.md`
//! §5, "the serial endpoint is shared across all sensors on one bus;
//! transactions must be serialized").

use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Parity {
    N,
    E,
    O,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::N => serialport::Parity::None,
            Parity::E => serialport::Parity::Even,
            Parity::O => serialport::Parity::Odd,
        }
    }
}

/// Bus configuration, mirroring `infra/settings.py`'s `serial_settings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    #[serde(default = "default_byte_size")]
    pub byte_size: u8,
    #[serde(default = "default_parity")]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: f64,
}

fn default_byte_size() -> u8 {
    8
}
fn default_parity() -> Parity {
    Parity::N
}
fn default_stop_bits() -> u8 {
    1
}
fn default_read_timeout() -> f64 {
    0.2
}

fn open_port(settings: &SerialSettings) -> io::Result<Box<dyn SerialPort>> {
    let data_bits = match settings.byte_size {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    };
    let stop_bits = match settings.stop_bits {
        2 => serialport::StopBits::Two,
        _ => serialport::StopBits::One,
    };
    serialport::new(&settings.port, settings.baud)
        .data_bits(data_bits)
        .parity(settings.parity.into())
        .stop_bits(stop_bits)
        .timeout(Duration::from_secs_f64(settings.read_timeout_secs))
        .open()
        .map_err(io::Error::from)
}

/// What a transaction actually needs from the transport: written bytes go
/// out, a read either returns data, blocks up to the port's own timeout, or
/// comes back empty/`TimedOut`, and stale input can be discarded before a
/// request is sent. `Box<dyn SerialPort>` satisfies this directly; tests
/// substitute an in-memory stand-in with no real device behind it.
pub trait Transport: io::Read + io::Write + Send {
    fn clear_input(&mut self) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.as_mut().clear(ClearBuffer::Input)
    }
}

struct BusInner {
    port: Box<dyn Transport>,
    settings: SerialSettings,
}

/// One physical serial line. Cheap to clone (shares the underlying port via
/// a mutex); every clone serializes onto the same transaction lock.
#[derive(Clone)]
pub struct Bus {
    inner: std::sync::Arc<Mutex<BusInner>>,
}

impl Bus {
    pub fn open(settings: SerialSettings) -> io::Result<Self> {
        let port: Box<dyn Transport> = Box::new(open_port(&settings)?);
        Ok(Bus {
            inner: std::sync::Arc::new(Mutex::new(BusInner { port, settings })),
        })
    }

    /// Builds a bus over an arbitrary transport, bypassing the OS serial
    /// layer entirely. Used by tests that construct a `SensorRegistry`
    /// without wiring up a real device.
    #[cfg(test)]
    pub(crate) fn from_transport(port: Box<dyn Transport>, settings: SerialSettings) -> Self {
        Bus {
            inner: std::sync::Arc::new(Mutex::new(BusInner { port, settings })),
        }
    }

    /// Closes and reopens the endpoint, clearing any stale OS-level state.
    /// Called once at startup per `spec.md` §4.3.
    pub fn reopen(&self) -> io::Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let port: Box<dyn Transport> = Box::new(open_port(&guard.settings)?);
        guard.port = port;
        Ok(())
    }

    /// Runs one exclusive write-then-read transaction: clears the input
    /// buffer, writes `request`, then reads up to `expected_len` bytes,
    /// stopping early if the read deadline passes. Returns whatever was
    /// read, which may be empty (`spec.md` §4.3 and §5).
    pub async fn transact(&self, request: Vec<u8>, expected_len: usize) -> io::Result<Vec<u8>> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock().unwrap();
            let read_timeout = Duration::from_secs_f64(guard.settings.read_timeout_secs);
            guard.port.clear_input().ok();
            guard.port.write_all(&request)?;
            guard.port.flush()?;

            let deadline = Instant::now() + read_timeout;
            let mut buf = vec![0u8; expected_len];
            let mut filled = 0usize;
            while filled < expected_len {
                if Instant::now() >= deadline {
                    break;
                }
                match guard.port.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                    Err(e) => return Err(e),
                }
            }
            buf.truncate(filled);
            Ok(buf)
        })
        .await
        .unwrap_or_else(|join_err| Err(io::Error::new(io::ErrorKind::Other, join_err)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A transport with nothing on the other end: every write succeeds and
    /// vanishes, every read reports EOF immediately. Good enough for tests
    /// that build a registry of `Dummy`-driven sensors, which never call
    /// `Bus::transact`.
    struct NullPort;

    impl io::Read for NullPort {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl io::Write for NullPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for NullPort {
        fn clear_input(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn null_bus() -> Bus {
        Bus::from_transport(
            Box::new(NullPort),
            SerialSettings {
                port: "(null)".into(),
                baud: 9600,
                byte_size: 8,
                parity: Parity::N,
                stop_bits: 1,
                read_timeout_secs: 0.05,
            },
        )
    }
}
