//! TriDance wire format — the binary IMU sample packet.
//!
//! This type IS the phone→hub protocol. Every field, every size is part of
//! the wire format. All multi-byte fields are little-endian regardless of
//! host byte order.
//!
//! The packet is a fixed-layout zerocopy struct; decoding never allocates
//! and there is no unsafe code in this module. There is no checksum: the
//! data channel below is already lossy, so corruption beyond length/version
//! goes undetected.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, F32, F64, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Sample Packet ────────────────────────────────────────────────────────────

/// One accelerometer + gyroscope reading as sent by a phone.
///
/// Layout: `[u8 version][u8 flags][u16 seq][f64 ts_ms][f32 ax ay az gx gy gz]`.
///
/// Wire size: 36 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct SamplePacket {
    /// Wire format version. Currently 0x01.
    pub version: u8,

    /// Bit flags. No bits are defined yet; receivers carry them through
    /// without interpreting them.
    pub flags: u8,

    /// Producer sequence number. Wraps to 0 after 65535.
    pub sequence: U16<LittleEndian>,

    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_ms: F64<LittleEndian>,

    /// Accelerometer, m/s².
    pub ax: F32<LittleEndian>,
    pub ay: F32<LittleEndian>,
    pub az: F32<LittleEndian>,

    /// Gyroscope, rad/s.
    pub gx: F32<LittleEndian>,
    pub gy: F32<LittleEndian>,
    pub gz: F32<LittleEndian>,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(SamplePacket, [u8; PACKET_LEN]);

// ── Decoded form ─────────────────────────────────────────────────────────────

/// The six IMU scalars, each independently present or absent.
///
/// A producer marks an axis it cannot read by sending NaN; it decodes as
/// `None` so the hub never invents a value for it. Infinities are treated
/// the same way, since JSON cannot carry them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Axes {
    pub ax: Option<f32>,
    pub ay: Option<f32>,
    pub az: Option<f32>,
    pub gx: Option<f32>,
    pub gy: Option<f32>,
    pub gz: Option<f32>,
}

impl Axes {
    /// Non-finite readings become absent axes.
    pub fn from_triplets(accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            ax: finite(accel[0]),
            ay: finite(accel[1]),
            az: finite(accel[2]),
            gx: finite(gyro[0]),
            gy: finite(gyro[1]),
            gz: finite(gyro[2]),
        }
    }

    /// Axes in wire order `ax, ay, az, gx, gy, gz`.
    pub fn to_array(&self) -> [Option<f32>; 6] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }

    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(Option::is_none)
    }
}

/// A decoded sample packet. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMessage {
    pub version: u8,
    pub flags: u8,
    pub sequence: u16,
    pub timestamp_ms: f64,
    pub axes: Axes,
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Current sample packet version.
pub const PACKET_VERSION: u8 = 0x01;

/// Exact sample packet size in bytes.
pub const PACKET_LEN: usize = 36;

/// Label of the data channel the phone opens toward the hub.
pub const DATA_CHANNEL_LABEL: &str = "imu";

/// Interval between `ping` control frames from a producer.
pub const PING_INTERVAL_SECS: u64 = 5;

/// A session with no sample or ping for this long is closed.
pub const LIVENESS_TIMEOUT_SECS: u64 = 15;

/// Upper bound on waiting for local ICE candidate gathering during signaling.
pub const GATHER_TIMEOUT_MS: u64 = 2000;

/// Producer-side backlog above which new samples are dropped, not queued.
pub const MAX_BUFFERED_BYTES: usize = 1_000_000;

// ── Encode / decode ──────────────────────────────────────────────────────────

/// Encode one sample.
///
/// `sequence` is reduced modulo 65536; wrapping is the caller's concern
/// and never an error. Pass `f32::NAN` for an axis that is unavailable.
pub fn encode(
    sequence: u32,
    timestamp_ms: f64,
    accel: [f32; 3],
    gyro: [f32; 3],
) -> [u8; PACKET_LEN] {
    let packet = SamplePacket {
        version: PACKET_VERSION,
        flags: 0,
        sequence: U16::new((sequence % 65536) as u16),
        timestamp_ms: F64::new(timestamp_ms),
        ax: F32::new(accel[0]),
        ay: F32::new(accel[1]),
        az: F32::new(accel[2]),
        gx: F32::new(gyro[0]),
        gy: F32::new(gyro[1]),
        gz: F32::new(gyro[2]),
    };

    let mut out = [0u8; PACKET_LEN];
    out.copy_from_slice(packet.as_bytes());
    out
}

/// Decode one sample packet.
///
/// Rejects anything that is not exactly [`PACKET_LEN`] bytes, then anything
/// whose version is not [`PACKET_VERSION`]. Flags are never grounds for
/// rejection.
pub fn decode(buf: &[u8]) -> Result<SampleMessage, DecodeError> {
    if buf.len() != PACKET_LEN {
        return Err(DecodeError::MalformedLength(buf.len()));
    }
    let packet = SamplePacket::read_from(buf).ok_or(DecodeError::MalformedLength(buf.len()))?;

    if packet.version != PACKET_VERSION {
        return Err(DecodeError::UnsupportedVersion(packet.version));
    }

    Ok(SampleMessage {
        version: packet.version,
        flags: packet.flags,
        sequence: packet.sequence.get(),
        timestamp_ms: packet.timestamp_ms.get(),
        axes: Axes::from_triplets(
            [packet.ax.get(), packet.ay.get(), packet.az.get()],
            [packet.gx.get(), packet.gy.get(), packet.gz.get()],
        ),
    })
}

/// Gyroscope conversion applied by producers before encoding.
pub fn deg_to_rad(deg_per_sec: f32) -> f32 {
    deg_per_sec * (std::f32::consts::PI / 180.0)
}

fn finite(v: f32) -> Option<f32> {
    if !v.is_finite() {
        None
    } else {
        Some(v)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting a sample packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("sample packet is {0} bytes, expected {}", PACKET_LEN)]
    MalformedLength(usize),

    #[error("unsupported sample packet version: 0x{0:02x}")]
    UnsupportedVersion(u8),
}

// ── Tests ────────────────────────────────────────────────────────────────────
