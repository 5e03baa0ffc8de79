//! A synthetic sensor board, for running without hardware.
//!
//! A virtual magnet circles the center chip a little above the board. Every
//! chip sees the field of that magnet expressed in its own (rotated) axes, plus
//! a fixed ambient offset and some uniform noise, which is roughly what the
//! real board reports when someone waves a magnet over it. The offsets are
//! what the baseline is there to remove.

use crate::chip_layout::ChipLayout;
use crate::link::{Connection, ConnectionError, DeviceHandle, Link};
use crate::projector::rotate;
use crate::sensor_frame::{Reading, AXES, CHIPS, FRAME_LEN, GROUPS};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    f64::consts::PI,
    fmt::Write,
    thread,
    time::{Duration, Instant},
};

// The virtual magnet: orbit radius and height in screen units, seconds per
// orbit, and field strength.
const ORBIT_RADIUS: f64 = 45.0;
const MAGNET_HEIGHT: f64 = 20.0;
const ORBIT_PERIOD: f64 = 4.0;
const MAGNET_STRENGTH: f64 = 1.2e5;

const AMBIENT_RANGE: f64 = 30.0;

// Settings outside these bounds are clamped. Above the rate limit the emit
// period rounds towards zero; above the noise limit the sampling range
// overflows.
const MAX_RATE_HZ: f64 = 10_000.0;
const MAX_NOISE: f64 = 1.0e6;

/// Builds a [`SimulatedLink`].
#[derive(Debug, Clone)]
pub struct SimulatedLinkBuilder {
    seed: Option<u64>,
    rate_hz: f64,
    noise: f64,
    malformed_ratio: f64,
}

impl SimulatedLinkBuilder {
    /// Seed the noise so runs are reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Notifications per second while subscribed, between 1 and 10 kHz.
    /// NaN is ignored.
    pub fn rate_hz(mut self, rate_hz: f64) -> Self {
        if rate_hz.is_nan() {
            warn!("Ignoring a NaN notification rate");
        } else {
            self.rate_hz = rate_hz.clamp(1.0, MAX_RATE_HZ);
        }
        self
    }

    /// Peak amplitude of the uniform noise added to every value. NaN is
    /// ignored.
    pub fn noise(mut self, noise: f64) -> Self {
        if noise.is_nan() {
            warn!("Ignoring a NaN noise amplitude");
        } else {
            self.noise = noise.abs().min(MAX_NOISE);
        }
        self
    }

    /// Fraction of payloads that are sent truncated, between 0 and 1. NaN is
    /// ignored.
    pub fn malformed_ratio(mut self, ratio: f64) -> Self {
        if ratio.is_nan() {
            warn!("Ignoring a NaN malformed ratio");
        } else {
            self.malformed_ratio = ratio.clamp(0.0, 1.0);
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> SimulatedLink {
        SimulatedLink { settings: self }
    }
}

impl Default for SimulatedLinkBuilder {
    fn default() -> Self {
        Self {
            seed: None,
            rate_hz: 50.0,
            noise: 0.5,
            malformed_ratio: 0.0,
        }
    }
}

/// A [`Link`] that always finds exactly one simulated board.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    settings: SimulatedLinkBuilder,
}

impl SimulatedLink {
    /// Start configuring a simulated board.
    pub fn builder() -> SimulatedLinkBuilder {
        SimulatedLinkBuilder::default()
    }
}

impl Link for SimulatedLink {
    type Conn = SimulatedConnection;

    fn scan_for_service(&mut self, _service: &str) -> Result<Option<DeviceHandle>, ConnectionError> {
        Ok(Some(DeviceHandle {
            name: "simulated sensor".to_owned(),
            address: "sim://0".to_owned(),
        }))
    }

    fn connect(&mut self, _device: &DeviceHandle) -> Result<SimulatedConnection, ConnectionError> {
        Ok(SimulatedConnection::new(&self.settings))
    }
}

/// A connection to the simulated board.
pub struct SimulatedConnection {
    rng: StdRng,
    layout: ChipLayout,
    offsets: [Reading; CHIPS],
    period: Duration,
    noise: f64,
    malformed_ratio: f64,
    started: Instant,
    next_emit: Option<Instant>,
    sent: u64,
}

impl SimulatedConnection {
    fn new(settings: &SimulatedLinkBuilder) -> Self {
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut offsets = [[0.0; AXES]; CHIPS];
        for value in offsets.iter_mut().flatten() {
            *value = rng.gen_range(-AMBIENT_RANGE..AMBIENT_RANGE);
        }

        Self {
            rng,
            layout: ChipLayout::default(),
            offsets,
            period: Duration::from_secs_f64(1.0 / settings.rate_hz),
            noise: settings.noise,
            malformed_ratio: settings.malformed_ratio,
            started: Instant::now(),
            next_emit: None,
            sent: 0,
        }
    }

    /// Payloads sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// The noiseless field each chip sees `t` seconds into the session, in
    /// the chip's own axes.
    pub fn field_at(&self, t: f64) -> [Reading; CHIPS] {
        let phase = 2.0 * PI * t / ORBIT_PERIOD;
        let center = self.layout.chip(0).position;
        let magnet_x = center.x + ORBIT_RADIUS * phase.cos();
        let magnet_y = center.y + ORBIT_RADIUS * phase.sin();

        let mut field = [[0.0; AXES]; CHIPS];
        for (reading, chip) in field.iter_mut().zip(self.layout.chips()) {
            let dx = chip.position.x - magnet_x;
            let dy = chip.position.y - magnet_y;
            let r2 = dx * dx + dy * dy + MAGNET_HEIGHT * MAGNET_HEIGHT;
            let k = MAGNET_STRENGTH / (r2 * r2.sqrt());

            // Undo the mounting rotation so the projector's rotation brings
            // the arrow back into the screen frame.
            let (x, y) = rotate(-chip.rotation, k * dx, k * dy);
            *reading = [x, y, k * MAGNET_HEIGHT];
        }
        field
    }

    /// Render the payload the board would send `t` seconds into the session.
    pub fn payload_at(&mut self, t: f64) -> String {
        let field = self.field_at(t);
        let offsets = self.offsets;
        let mut values = Vec::with_capacity(FRAME_LEN);
        for _ in 0..GROUPS {
            for (reading, offset) in field.iter().zip(&offsets) {
                for (v, o) in reading.iter().zip(offset) {
                    values.push(v + o + self.jitter());
                }
            }
        }

        if self.malformed_ratio > 0.0 && self.rng.gen_bool(self.malformed_ratio) {
            let keep = self.rng.gen_range(1..FRAME_LEN);
            debug!("Simulating a truncated payload ({} of {} values)", keep, FRAME_LEN);
            values.truncate(keep);
        }

        let mut payload = String::new();
        for v in values {
            // Writing to a String cannot fail.
            let _ = write!(payload, "{:.3},", v);
        }
        payload
    }

    fn jitter(&mut self) -> f64 {
        if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..self.noise)
        } else {
            0.0
        }
    }
}

impl Connection for SimulatedConnection {
    fn subscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        self.next_emit = Some(Instant::now());
        Ok(())
    }

    fn listen(
        &mut self,
        dwell: Duration,
        on_payload: &mut dyn FnMut(&[u8]),
    ) -> Result<(), ConnectionError> {
        let deadline = Instant::now() + dwell;

        while let Some(next) = self.next_emit {
            if next > deadline {
                break;
            }
            thread::sleep(next.saturating_duration_since(Instant::now()));

            let t = next.duration_since(self.started).as_secs_f64();
            let payload = self.payload_at(t);
            on_payload(payload.as_bytes());
            self.sent += 1;
            self.next_emit = Some(next + self.period);
        }

        thread::sleep(deadline.saturating_duration_since(Instant::now()));
        Ok(())
    }

    fn unsubscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        self.next_emit = None;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.next_emit = None;
        Ok(())
    }
}
