//! Post-chord cleanup filter (§4.2 Key Filter).
//!
//! Two unrelated rules live here: HID error/rollover sentinels are always
//! dropped, and Backspace is dropped from chording-device reports while the
//! filter is armed by a just-released multi-key chord.

use super::Tick;

/// HID usage codes the filter always drops, per the keyboard usage table's
/// error/rollover reserved range.
const ERROR_CODES: [u8; 3] = [0x01, 0x02, 0x03];

/// Backspace, dropped from chording-device reports while armed.
const BACKSPACE: u8 = 0x2A;

/// How long an arm from a chord release lasts before it lapses on its own
/// (§4.2: "500 ms or until the FSM leaves EXPECTING_OUTPUT").
const ARM_DURATION_MS: u64 = 500;

/// Filters HID error codes always, and Backspace from chording-device
/// reports while armed by a recently-released chord.
#[derive(Debug, Default)]
pub struct KeyFilter {
    armed_until: Option<Tick>,
    filtered_backspace_edge: bool,
}

impl KeyFilter {
    /// Builds a disarmed filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the backspace filter for [`ARM_DURATION_MS`] from `now`.
    pub fn arm(&mut self, now: Tick) {
        self.armed_until = Some(Tick(now.0 + ARM_DURATION_MS));
    }

    /// Disarms the filter immediately (FSM left `EXPECTING_OUTPUT`).
    pub fn disarm(&mut self) {
        self.armed_until = None;
    }

    fn is_armed(&self, now: Tick) -> bool {
        self.armed_until.is_some_and(|until| now <= until)
    }

    /// Filters `keys` in place: error codes always, Backspace from chording
    /// devices while armed. Non-dropped entries are compacted to the front
    /// and the remainder zero-padded, preserving the invariant that the
    /// reserved/padding bytes stay zero.
    pub fn apply(&mut self, keys: &mut [u8; 6], is_chording_device: bool, now: Tick) {
        let armed = is_chording_device && self.is_armed(now);
        let mut out = [0u8; 6];
        let mut n = 0;
        for &key in keys.iter() {
            if key == 0 {
                continue;
            }
            if ERROR_CODES.contains(&key) {
                continue;
            }
            if armed && key == BACKSPACE {
                self.filtered_backspace_edge = true;
                continue;
            }
            out[n] = key;
            n += 1;
        }
        *keys = out;
    }

    /// Consumes and clears the one-shot "a backspace was just filtered"
    /// flag the chord FSM uses to extend its output grace window.
    pub fn take_filtered_backspace_edge(&mut self) -> bool {
        std::mem::take(&mut self.filtered_backspace_edge)
    }
}
