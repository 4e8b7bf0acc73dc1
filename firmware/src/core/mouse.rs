//! Mouse acceleration (§4.6): one ramp for raw USB mouse deltas, a second
//! per-key ramp for arrow-to-mouse motion.

use super::Tick;

/// Idle gap after which the USB-path ramp resets to base speed.
const USB_IDLE_RESET_MS: u64 = 200;
/// Below this hold duration the USB-path ramp holds at base speed.
const USB_RAMP_FLOOR_MS: u64 = 50;
/// Above this hold duration the USB-path ramp is pinned at its ceiling.
const USB_RAMP_CEILING_MS: u64 = 1_000;

const USB_BASE_SPEED: i32 = 5;
const USB_RAMP_START_SPEED: i32 = 10;
const USB_RAMP_SPAN: i32 = 30;
const USB_MAX_SPEED: i32 = 40;

/// Time-based speed ramp applied to raw USB mouse deltas (§4.6 USB path).
#[derive(Debug, Default)]
pub struct UsbMouseAccelerator {
    accel_start_tick: Option<Tick>,
    last_move_tick: Option<Tick>,
}

impl UsbMouseAccelerator {
    /// Builds a freshly-reset accelerator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the speed ramp to one raw `(dx, dy)` USB mouse delta,
    /// preserving each axis's sign and zeroing axes that were already zero.
    pub fn accelerate(&mut self, dx: i8, dy: i8, now: Tick) -> (i8, i8) {
        if dx == 0 && dy == 0 {
            self.accel_start_tick = None;
            self.last_move_tick = Some(now);
            return (0, 0);
        }

        let idle = match self.last_move_tick {
            Some(last) => now.since(last) > USB_IDLE_RESET_MS,
            None => true,
        };
        if idle {
            self.accel_start_tick = Some(now);
        }
        let ramp_start = self.accel_start_tick.unwrap_or(now);
        let held_ms = now.since(ramp_start);

        let speed = if idle || held_ms < USB_RAMP_FLOOR_MS {
            USB_BASE_SPEED
        } else if held_ms < USB_RAMP_CEILING_MS {
            let span = i32::try_from(held_ms - USB_RAMP_FLOOR_MS).unwrap_or(0);
            USB_RAMP_START_SPEED + USB_RAMP_SPAN * span / 950
        } else {
            USB_MAX_SPEED
        };

        self.last_move_tick = Some(now);

        (apply_speed(dx, speed), apply_speed(dy, speed))
    }
}

fn apply_speed(delta: i8, speed: i32) -> i8 {
    if delta == 0 {
        return 0;
    }
    let signed = if delta > 0 { speed } else { -speed };
    i8::try_from(signed.clamp(i32::from(i8::MIN), i32::from(i8::MAX))).unwrap_or(delta.signum())
}

/// Usage codes mapped to arrow-to-mouse motion (§9 Open Question: resolved
/// as configurable, defaulting to the Escape/Backspace/Slash/Period set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowUsageCodes {
    /// Usage code that moves the pointer up.
    pub up: u8,
    /// Usage code that moves the pointer down.
    pub down: u8,
    /// Usage code that moves the pointer left.
    pub left: u8,
    /// Usage code that moves the pointer right.
    pub right: u8,
}

impl Default for ArrowUsageCodes {
    fn default() -> Self {
        Self {
            up: 0x29,   // Escape
            down: 0x2A, // Backspace
            left: 0x38, // Slash
            right: 0x2E, // Period
        }
    }
}

/// Tuning for the arrow-to-mouse ramp (§4.6 Arrow path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowMouseConfig {
    /// Speed while the key has just been pressed.
    pub base: i16,
    /// Additional speed per `interval_ms` held.
    pub step: i16,
    /// Ramp granularity, in milliseconds.
    pub interval_ms: u64,
    /// Speed ceiling.
    pub max: i16,
}

impl Default for ArrowMouseConfig {
    fn default() -> Self {
        Self {
            base: 5,
            step: 3,
            interval_ms: 100,
            max: 40,
        }
    }
}

#[derive(Debug, Default)]
struct Held {
    since: Option<Tick>,
}

/// Per-arrow-key time-held acceleration (§4.6 Arrow path).
#[derive(Debug, Default)]
pub struct ArrowMouseAccelerator {
    up: Held,
    down: Held,
    left: Held,
    right: Held,
}

impl ArrowMouseAccelerator {
    /// Builds an accelerator with no arrow currently held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `keys` for the configured arrow usage codes, accumulates a
    /// speed-scaled `(dx, dy)` delta for whichever are present, and returns
    /// that delta plus a mask of which entries in `keys` were arrows (the
    /// caller removes those from the keyboard portion of the report).
    pub fn accumulate(
        &mut self,
        keys: &[u8; 6],
        codes: ArrowUsageCodes,
        cfg: &ArrowMouseConfig,
        now: Tick,
    ) -> (i16, i16, [bool; 6]) {
        let mut is_arrow = [false; 6];
        let mut present = (false, false, false, false); // up, down, left, right

        for (i, &key) in keys.iter().enumerate() {
            if key == 0 {
                continue;
            }
            if key == codes.up {
                is_arrow[i] = true;
                present.0 = true;
            } else if key == codes.down {
                is_arrow[i] = true;
                present.1 = true;
            } else if key == codes.left {
                is_arrow[i] = true;
                present.2 = true;
            } else if key == codes.right {
                is_arrow[i] = true;
                present.3 = true;
            }
        }

        let up_speed = Self::track(&mut self.up, present.0, cfg, now);
        let down_speed = Self::track(&mut self.down, present.1, cfg, now);
        let left_speed = Self::track(&mut self.left, present.2, cfg, now);
        let right_speed = Self::track(&mut self.right, present.3, cfg, now);

        let dy = down_speed - up_speed;
        let dx = right_speed - left_speed;

        (dx, dy, is_arrow)
    }

    fn track(held: &mut Held, is_pressed: bool, cfg: &ArrowMouseConfig, now: Tick) -> i16 {
        if !is_pressed {
            held.since = None;
            return 0;
        }
        let since = *held.since.get_or_insert(now);
        let held_ms = now.since(since);
        let steps = i16::try_from(held_ms / cfg.interval_ms).unwrap_or(i16::MAX);
        (cfg.base + cfg.step.saturating_mul(steps)).min(cfg.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_path_resets_on_zero_delta() {
        let mut accel = UsbMouseAccelerator::new();
        assert_eq!(accel.accelerate(0, 0, Tick(0)), (0, 0));
    }

    #[test]
    fn usb_path_starts_at_base_speed() {
        let mut accel = UsbMouseAccelerator::new();
        assert_eq!(accel.accelerate(1, 0, Tick(0)), (5, 0));
    }

    #[test]
    fn usb_path_ramps_over_time_and_preserves_sign() {
        let mut accel = UsbMouseAccelerator::new();
        accel.accelerate(-1, 1, Tick(0));
        let (dx, dy) = accel.accelerate(-1, 1, Tick(500));
        assert!(dx < 0);
        assert!(dy > 0);
        assert!(dx.unsigned_abs() > 5);
    }

    #[test]
    fn usb_path_pins_at_ceiling() {
        let mut accel = UsbMouseAccelerator::new();
        accel.accelerate(1, 0, Tick(0));
        let (dx, _) = accel.accelerate(1, 0, Tick(2_000));
        assert_eq!(dx, 40);
    }

    #[test]
    fn usb_path_resets_after_idle_gap() {
        let mut accel = UsbMouseAccelerator::new();
        accel.accelerate(1, 0, Tick(0));
        accel.accelerate(1, 0, Tick(900));
        let (dx, _) = accel.accelerate(1, 0, Tick(1_200));
        assert_eq!(dx, 5);
    }

    #[test]
    fn arrow_path_ramps_while_held_and_resets_on_release() {
        let mut accel = ArrowMouseAccelerator::new();
        let codes = ArrowUsageCodes::default();
        let cfg = ArrowMouseConfig::default();

        let keys = [codes.right, 0, 0, 0, 0, 0];
        let (dx0, dy0, mask0) = accel.accumulate(&keys, codes, &cfg, Tick(0));
        assert_eq!((dx0, dy0), (5, 0));
        assert!(mask0[0]);

        let (dx1, _, _) = accel.accumulate(&keys, codes, &cfg, Tick(350));
        assert_eq!(dx1, 5 + 3 * 3);

        let released = [0u8; 6];
        accel.accumulate(&released, codes, &cfg, Tick(400));
        let (dx2, _, _) = accel.accumulate(&keys, codes, &cfg, Tick(401));
        assert_eq!(dx2, 5);
    }

    #[test]
    fn arrow_path_clamps_to_max() {
        let mut accel = ArrowMouseAccelerator::new();
        let codes = ArrowUsageCodes::default();
        let cfg = ArrowMouseConfig::default();
        let keys = [codes.down, 0, 0, 0, 0, 0];
        accel.accumulate(&keys, codes, &cfg, Tick(0));
        let (_, dy, _) = accel.accumulate(&keys, codes, &cfg, Tick(5_000));
        assert_eq!(dy, cfg.max);
    }
}
