/// Radio command packet buffer and stick decoder.
///
/// The radio receiver pushes bytes into a packet-sized ring from its own
/// context; the control loop copies the whole ring once per cycle. Both
/// sides go through one critical-section mutex, and a receive burst is
/// written inside a single critical section, so a snapshot always holds
/// whole writer passes.
///
/// The decoder treats four bytes of the packet as three-state sticks:
/// low nudges a setpoint down by one step, high nudges it up, anything in
/// between leaves it alone.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::{SetpointConfig, PACKET_LENGTH};
use crate::drivers::controller::ControllerState;

pub type Packet = [u8; PACKET_LENGTH];

/// Centre of the stick range; inside every deadzone
pub const NEUTRAL: u8 = 128;

struct Ring {
    bytes: Packet,
    cursor: usize,
}

impl Ring {
    fn push(&mut self, b: u8) {
        self.bytes[self.cursor] = b;
        self.cursor = (self.cursor + 1) % PACKET_LENGTH;
    }
}

pub struct SetpointBuffer {
    ring: Mutex<CriticalSectionRawMutex, RefCell<Ring>>,
}

impl SetpointBuffer {
    /// All sticks neutral until the first packet arrives.
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring {
                bytes: [NEUTRAL; PACKET_LENGTH],
                cursor: 0,
            })),
        }
    }

    /// Append one byte, overwriting the oldest when full.
    pub fn push_byte(&self, b: u8) {
        self.ring.lock(|r| r.borrow_mut().push(b));
    }

    /// Append a receive burst as one writer pass.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.ring.lock(|r| {
            let mut ring = r.borrow_mut();
            for &b in bytes {
                ring.push(b);
            }
        });
    }

    /// Copy of the whole ring, in storage order.
    pub fn snapshot(&self) -> Packet {
        self.ring.lock(|r| r.borrow().bytes)
    }
}

impl Default for SetpointBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Decoder ──────────────────────────────────────────────────────────────────

// floor first, then ceiling: defined even for inverted bounds
fn nudge(value: f32, byte: u8, cfg: &SetpointConfig, step: f32, lo: f32, hi: f32) -> f32 {
    if byte < cfg.low_threshold {
        (value - step).max(lo).min(hi)
    } else if byte > cfg.high_threshold {
        (value + step).max(lo).min(hi)
    } else {
        value
    }
}

fn channel(packet: &Packet, offset: usize) -> u8 {
    packet.get(offset).copied().unwrap_or(NEUTRAL)
}

/// Integrate one packet's stick positions into the controller setpoint.
///
/// `cfg` is expected to pass `SetpointConfig::validate`. A channel offset
/// outside the packet reads as neutral rather than panicking.
pub fn decode(packet: &Packet, cfg: &SetpointConfig, controller: &mut ControllerState) {
    controller.desired_thrust = nudge(
        controller.desired_thrust,
        channel(packet, cfg.thrust_offset),
        cfg,
        cfg.thrust_step,
        cfg.thrust_min,
        cfg.thrust_max,
    );

    let lim = cfg.attitude_limit;
    // (axis, offset): roll, pitch, yaw
    let axes = [
        (0, cfg.roll_offset),
        (1, cfg.pitch_offset),
        (2, cfg.yaw_offset),
    ];
    for &(axis, offset) in axes.iter() {
        controller.desired_attitude[axis] = nudge(
            controller.desired_attitude[axis],
            channel(packet, offset),
            cfg,
            cfg.attitude_step,
            -lim,
            lim,
        );
    }
}
