//! Key-repeat engine (§4.7): replays a held key as release+press pairs once
//! it has been down long enough, either via the normal single-key arming
//! path or by seizing a single-key chord buffer that never turned into a
//! chord.

use super::Tick;

/// A key held long enough to warrant synthetic repeats.
#[derive(Debug, Default)]
pub struct RepeatEngine {
    armed_key: Option<u8>,
    press_tick: Option<Tick>,
    repeating: bool,
    next_due: Option<Tick>,
    /// Re-entrancy guard: set while the engine's own emission is in flight
    /// so the emitter's post-emission arming logic does not observe it.
    in_repeat_emit: bool,
}

impl RepeatEngine {
    /// Builds a disarmed engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is currently armed (used by the FSM's IDLE/no-activity
    /// branch to decide whether to let this engine own the release).
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed_key.is_some()
    }

    /// Whether the engine is in the middle of emitting its own report
    /// (guards against the emitter re-arming from a repeat-driven report).
    #[must_use]
    pub fn in_repeat_emit(&self) -> bool {
        self.in_repeat_emit
    }

    /// Called by the emitter after every non-repeat emission (§4.5): arms,
    /// re-arms, preserves, or disarms based on the keys just sent.
    pub fn update_arming(&mut self, keys: &[u8], now: Tick) {
        if self.in_repeat_emit {
            return;
        }
        let mut non_zero = keys.iter().copied().filter(|&k| k != 0);
        let first = non_zero.next();
        let has_more = non_zero.next().is_some();
        match (first, has_more) {
            (Some(key), false) => {
                if self.armed_key == Some(key) {
                    // Same key still down: keep the original press tick.
                } else {
                    self.armed_key = Some(key);
                    self.press_tick = Some(now);
                    self.repeating = false;
                    self.next_due = None;
                }
            }
            _ => self.disarm(),
        }
    }

    /// Directly arms `key` with `press_tick` backdated to `collect_start_tick`
    /// — used when the FSM hands over a single-key chord buffer (seize, or
    /// the COLLECTING→EXPECTING_OUTPUT single-key branch).
    pub fn arm_from_collect(&mut self, key: u8, collect_start_tick: Tick) {
        self.armed_key = Some(key);
        self.press_tick = Some(collect_start_tick);
        self.repeating = false;
        self.next_due = None;
    }

    /// Clears any armed key, e.g. when a fresh chord attempt begins.
    pub fn disarm(&mut self) {
        self.armed_key = None;
        self.press_tick = None;
        self.repeating = false;
        self.next_due = None;
    }

    /// Stops repeating and returns the bare release the caller should emit,
    /// if the engine was armed (IDLE, no activity, repeat armed — §4.4).
    pub fn release(&mut self) -> Option<u8> {
        let key = self.armed_key?;
        self.disarm();
        Some(key)
    }

    /// Polled from the periodic tick. Returns the key to emit a release+press
    /// pair for, once the hold has crossed `delay_ms` and every `rate_ms`
    /// thereafter.
    pub fn tick(&mut self, now: Tick, delay_ms: u64, rate_ms: u64) -> Option<u8> {
        let key = self.armed_key?;
        let press_tick = self.press_tick?;

        if !self.repeating {
            if now.since(press_tick) >= delay_ms {
                self.repeating = true;
                self.next_due = Some(now);
            } else {
                return None;
            }
        }

        let due = self.next_due?;
        if now >= due {
            self.next_due = Some(Tick(due.0 + rate_ms));
            Some(key)
        } else {
            None
        }
    }

    /// Marks the start/end of a repeat-driven emission, so
    /// [`Self::update_arming`] ignores it.
    pub fn set_in_repeat_emit(&mut self, value: bool) {
        self.in_repeat_emit = value;
    }
}
