//! Standalone randomized OWEN-CI8 device simulator (`spec.md` §1's "randomized
//! simulator", out of the gateway's own core budget). Answers OWEN-framed
//! requests on a real or virtual serial line as if it were a СИ8 counter:
//! validates the incoming frame, replies with a plausible DCNT/DSPD/DTMR
//! payload, and occasionally drops a response outright so the gateway's
//! `Timeout` path gets exercised without real hardware.
//!
//! Not part of the gateway's workspace or test suite; built and run as its
//! own binary against a serial port or PTY pair.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use clap::Parser;
use rand::Rng;
use tracing::{info, warn};

use owen_gateway::device::{Device, ParameterId};

#[derive(Parser)]
#[command(about = "Randomized OWEN-CI8 device simulator")]
struct Cli {
    /// Serial port to answer requests on (e.g. /dev/ttyUSB1 or a PTY slave).
    #[arg(long)]
    port: String,

    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Slave address this simulator answers to.
    #[arg(long, default_value_t = 1)]
    addr: u16,

    #[arg(long, default_value_t = 8)]
    addr_width: u8,

    /// Fraction of matched requests answered with no bytes at all, to
    /// exercise the gateway's `Timeout` path.
    #[arg(long, default_value_t = 0.05)]
    drop_rate: f64,
}

/// Encodes `value` as a BCD byte string of exactly `len` bytes: the inverse
/// of `owen_gateway::codec::bcd_to_int` (low nibble of the last byte is the
/// least significant decimal digit).
fn bcd_encode(mut value: u64, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    for byte in out.iter_mut().rev() {
        let lo = (value % 10) as u8;
        value /= 10;
        let hi = (value % 10) as u8;
        value /= 10;
        *byte = (hi << 4) | lo;
    }
    out
}

struct Counter {
    total: u64,
}

impl Counter {
    fn tick(&mut self, rng: &mut impl Rng) -> u64 {
        self.total += rng.gen_range(0..=3);
        self.total = self.total.min(owen_gateway::device::MAX_COUNTER_VALUE);
        self.total
    }
}

/// Reads bytes off `port` until a complete `#...\r` ASCII frame has
/// accumulated, discarding anything before an unmatched `#`.
fn read_frame<T: Read + ?Sized>(port: &mut T, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match port.read(&mut byte) {
            Ok(0) => return None,
            Ok(_) => {
                if byte[0] == b'#' {
                    buf.clear();
                }
                if !buf.is_empty() || byte[0] == b'#' {
                    buf.push(byte[0]);
                }
                if byte[0] == b'\r' && !buf.is_empty() {
                    let frame = buf.clone();
                    buf.clear();
                    return Some(frame);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(_) => return None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let device = Device::new(cli.addr, cli.addr_width)?;
    let wire_addr = device.wire_addr();

    let mut port = serialport::new(&cli.port, cli.baud)
        .timeout(Duration::from_secs(1))
        .open()?;

    info!(port = %cli.port, addr = cli.addr, "simulator listening");

    let mut rng = rand::thread_rng();
    let mut counter = Counter { total: 0 };
    let start = Instant::now();
    let mut buf = Vec::new();

    loop {
        let Some(ascii_request) = read_frame(port.as_mut(), &mut buf) else {
            continue;
        };
        let binary = match owen_gateway::codec::decode_ascii(&ascii_request) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "ignoring malformed request frame");
                continue;
            }
        };
        if binary.len() != 6 {
            continue;
        }
        let (body, crc_bytes) = binary.split_at(4);
        if owen_gateway::codec::crc16(body).to_be_bytes() != crc_bytes {
            warn!("ignoring request with bad CRC");
            continue;
        }
        if binary[0] != wire_addr[0] || (binary[1] & 0xE0) != wire_addr[1] {
            continue; // addressed to a different slave sharing the bus
        }

        let pid = [binary[2], binary[3]];
        let parameter = [ParameterId::Dcnt, ParameterId::Dspd, ParameterId::Dtmr]
            .into_iter()
            .find(|p| p.id_bytes() == pid);
        let Some(parameter) = parameter else {
            warn!(?pid, "request for unrecognized parameter id");
            continue;
        };

        if rng.gen_bool(cli.drop_rate) {
            info!(?parameter, "simulating dropped response");
            continue;
        }

        let binary_len = (parameter.expected_ascii_len() - 2) / 2;
        let payload_len = binary_len - 6;
        let payload = match parameter {
            ParameterId::Dcnt | ParameterId::Dspd => bcd_encode(counter.tick(&mut rng), payload_len),
            ParameterId::Dtmr => {
                let elapsed = start.elapsed();
                let hours = elapsed.as_secs() / 3600;
                let minutes = (elapsed.as_secs() / 60) % 60;
                let seconds = elapsed.as_secs() % 60;
                let hundredths = (elapsed.subsec_millis() / 10) as u64;
                let mut p = bcd_encode(hours, 3);
                p.extend(bcd_encode(minutes, 1));
                p.extend(bcd_encode(seconds, 1));
                p.extend(bcd_encode(hundredths, 1));
                p.push(0); // trailing byte, ignored by the decoder
                p
            }
        };

        let mut response = Vec::with_capacity(4 + payload.len() + 2);
        response.extend_from_slice(&wire_addr);
        response.extend_from_slice(&pid);
        response.extend_from_slice(&payload);
        let crc = owen_gateway::codec::crc16(&response);
        response.extend_from_slice(&crc.to_be_bytes());

        let ascii_response = owen_gateway::codec::encode_ascii(&response);
        if let Err(e) = port.write_all(&ascii_response) {
            warn!(error = %e, "failed writing response");
        }
    }
}
