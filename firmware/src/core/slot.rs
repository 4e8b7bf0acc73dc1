//! Per-USB-slot state storage (§4.1 Slot Registry).

/// Number of USB input slots the registry tracks: two local USB HID
/// interfaces plus headroom for one peer-link slot (§6 Peer link) and one
/// spare.
pub const MAX_SLOTS: usize = 4;

/// Snapshot of the most recent keyboard report from one USB input slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotState {
    /// The slot has produced at least one report since its last reset.
    pub present: bool,
    /// The originating device is a half of the chording keyboard.
    pub is_chording_device: bool,
    /// Current HID modifier byte.
    pub modifiers: u8,
    /// Current active usage codes, zero-padded, order insignificant.
    pub keys: [u8; 6],
}

/// Fixed-size table of [`SlotState`] indexed by slot id.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: [SlotState; MAX_SLOTS],
}

impl SlotRegistry {
    /// Builds an empty registry; every slot starts absent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a keyboard observation into `slot_id`. Returns `false` (and
    /// leaves the registry untouched) when `slot_id` is out of range.
    pub fn update_keyboard(
        &mut self,
        slot_id: u8,
        is_chording_device: bool,
        modifiers: u8,
        keys: [u8; 6],
    ) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(slot_id)) else {
            return false;
        };
        slot.present = true;
        slot.is_chording_device = is_chording_device;
        slot.modifiers = modifiers;
        slot.keys = keys;
        true
    }

    /// Clears `slot_id`. Returns whether the slot was previously present
    /// (the caller uses this to decide whether a release needs forcing).
    pub fn reset(&mut self, slot_id: u8) -> bool {
        let Some(slot) = self.slots.get_mut(usize::from(slot_id)) else {
            return false;
        };
        let was_present = slot.present;
        *slot = SlotState::default();
        was_present
    }

    /// All tracked slots, in id order.
    #[must_use]
    pub fn slots(&self) -> &[SlotState; MAX_SLOTS] {
        &self.slots
    }
}
