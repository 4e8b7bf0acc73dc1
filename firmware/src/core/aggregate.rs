//! Merges all present USB slots into one logical device state (§4.3 State
//! Aggregator).

use super::mouse::{ArrowMouseAccelerator, ArrowMouseConfig, ArrowUsageCodes};
use super::slot::{SlotState, MAX_SLOTS};
use super::Tick;

/// Union of every present slot's modifiers and keys, with arrow-to-mouse
/// motion already extracted (§3 Aggregated state).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatedState {
    /// Bitwise OR of every present slot's modifier byte.
    pub modifiers: u8,
    /// Deduplicated union of active usage codes, truncated to 6, with any
    /// arrow-to-mouse usages already removed.
    pub keys: [u8; 6],
    /// Number of non-zero entries in [`Self::keys`].
    pub key_count: usize,
    /// True if at least one contributing slot is chording-capable.
    pub any_chording: bool,
    /// Horizontal mouse delta synthesized from held arrow keys.
    pub mouse_dx: i16,
    /// Vertical mouse delta synthesized from held arrow keys.
    pub mouse_dy: i16,
}

/// Stateless merge step; the only state it touches is the caller-owned
/// [`ArrowMouseAccelerator`], since arrow ramps must persist across cycles.
pub struct Aggregator;

impl Aggregator {
    /// Merges `slots` into one [`AggregatedState`]. When `arrow_mouse_enabled`
    /// is set, arrow usages in `codes` are converted to `mouse_dx`/`mouse_dy`
    /// and removed from the returned keys.
    pub fn aggregate(
        slots: &[SlotState; MAX_SLOTS],
        arrow_mouse_enabled: bool,
        codes: ArrowUsageCodes,
        arrow_cfg: &ArrowMouseConfig,
        arrow_accel: &mut ArrowMouseAccelerator,
        now: Tick,
    ) -> AggregatedState {
        let mut modifiers = 0u8;
        let mut merged = [0u8; 6];
        let mut merged_len = 0usize;
        let mut any_chording = false;

        for slot in slots {
            if !slot.present {
                continue;
            }
            modifiers |= slot.modifiers;
            any_chording |= slot.is_chording_device;
            for &key in &slot.keys {
                if key == 0 {
                    continue;
                }
                if merged_len >= merged.len() {
                    break;
                }
                if !merged[..merged_len].contains(&key) {
                    merged[merged_len] = key;
                    merged_len += 1;
                }
            }
        }

        let (mouse_dx, mouse_dy) = if arrow_mouse_enabled {
            let (dx, dy, is_arrow) = arrow_accel.accumulate(&merged, codes, arrow_cfg, now);
            if dx != 0 || dy != 0 {
                let mut compacted = [0u8; 6];
                let mut n = 0;
                for (i, &key) in merged.iter().enumerate().take(merged_len) {
                    if !is_arrow[i] {
                        compacted[n] = key;
                        n += 1;
                    }
                }
                merged = compacted;
                merged_len = n;
            }
            (dx, dy)
        } else {
            (0, 0)
        };

        AggregatedState {
            modifiers,
            keys: merged,
            key_count: merged_len,
            any_chording,
            mouse_dx,
            mouse_dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(present: bool, chording: bool, modifiers: u8, keys: [u8; 6]) -> SlotState {
        SlotState {
            present,
            is_chording_device: chording,
            modifiers,
            keys,
        }
    }

    #[test]
    fn merges_modifiers_and_dedups_keys() {
        let slots = [
            slot(true, false, 0x02, [0x04, 0x05, 0, 0, 0, 0]),
            slot(true, true, 0x01, [0x05, 0x06, 0, 0, 0, 0]),
            SlotState::default(),
            SlotState::default(),
        ];
        let mut accel = ArrowMouseAccelerator::new();
        let agg = Aggregator::aggregate(
            &slots,
            false,
            ArrowUsageCodes::default(),
            &ArrowMouseConfig::default(),
            &mut accel,
            Tick(0),
        );
        assert_eq!(agg.modifiers, 0x03);
        assert!(agg.any_chording);
        assert_eq!(agg.key_count, 3);
        assert!(agg.keys[..3].contains(&0x04));
        assert!(agg.keys[..3].contains(&0x05));
        assert!(agg.keys[..3].contains(&0x06));
    }

    #[test]
    fn aggregation_is_commutative_over_slot_order() {
        let a = [
            slot(true, false, 0x02, [0x04, 0, 0, 0, 0, 0]),
            slot(true, false, 0x00, [0x05, 0, 0, 0, 0, 0]),
            SlotState::default(),
            SlotState::default(),
        ];
        let b = [
            slot(true, false, 0x00, [0x05, 0, 0, 0, 0, 0]),
            slot(true, false, 0x02, [0x04, 0, 0, 0, 0, 0]),
            SlotState::default(),
            SlotState::default(),
        ];
        let mut accel_a = ArrowMouseAccelerator::new();
        let mut accel_b = ArrowMouseAccelerator::new();
        let agg_a = Aggregator::aggregate(
            &a,
            false,
            ArrowUsageCodes::default(),
            &ArrowMouseConfig::default(),
            &mut accel_a,
            Tick(0),
        );
        let agg_b = Aggregator::aggregate(
            &b,
            false,
            ArrowUsageCodes::default(),
            &ArrowMouseConfig::default(),
            &mut accel_b,
            Tick(0),
        );
        assert_eq!(agg_a.modifiers, agg_b.modifiers);
        assert_eq!(agg_a.key_count, agg_b.key_count);
        for key in agg_a.keys {
            if key != 0 {
                assert!(agg_b.keys.contains(&key));
            }
        }
    }

    #[test]
    fn arrow_keys_removed_from_keyboard_portion_when_enabled() {
        let codes = ArrowUsageCodes::default();
        let slots = [
            slot(true, false, 0, [codes.right, 0x04, 0, 0, 0, 0]),
            SlotState::default(),
            SlotState::default(),
            SlotState::default(),
        ];
        let mut accel = ArrowMouseAccelerator::new();
        let agg = Aggregator::aggregate(
            &slots,
            true,
            codes,
            &ArrowMouseConfig::default(),
            &mut accel,
            Tick(0),
        );
        assert_eq!(agg.key_count, 1);
        assert_eq!(agg.keys[0], 0x04);
        assert!(agg.mouse_dx > 0);
        assert_eq!(agg.mouse_dy, 0);
    }
}
