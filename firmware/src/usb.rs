//! USB host collaborator: maps enumerated HID interfaces to slot ids and
//! chording-device status, then forwards each interrupt-transfer report
//! into [`crate::core::Core::ingest`]. The actual enumeration/transfer
//! mechanics are out of scope (spec.md §1's USB host stack collaborator)
//! and live entirely behind [`UsbTransport`]; this module owns only the
//! slot-assignment and dispatch policy, so it is host-testable.

use crate::core::{BleSink, ChordDeviceStatus, Clock, Core, Settings, Tick};

/// Maximum concurrently tracked USB HID interfaces (mirrors
/// `crate::core::MAX_SLOTS`, since every USB slot is also a core slot).
pub const MAX_INTERFACES: usize = crate::core::MAX_SLOTS;

/// One enumerated USB HID keyboard/mouse interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidInterface {
    /// Host-assigned address distinguishing this interface from others.
    pub address: u8,
    /// Whether this interface identifies as a chording device (matched on
    /// USB vendor/product id by the transport layer).
    pub is_chording_device: bool,
}

/// Boundary to the real USB host stack: enumeration state and raw
/// interrupt-transfer polling. Implemented against `esp_idf_svc`'s USB host
/// support at the board level; entirely mockable here.
pub trait UsbTransport {
    /// Interfaces currently enumerated, in host-assigned order.
    fn active_interfaces(&self) -> &[HidInterface];

    /// Polls `interface` once for a new interrupt-transfer report, if any
    /// arrived since the last poll.
    fn poll_report<'b>(&mut self, interface: HidInterface, buf: &'b mut [u8]) -> Option<&'b [u8]>;
}

/// One address-to-slot assignment.
#[derive(Debug, Clone, Copy)]
struct Assignment {
    address: u8,
    slot: u8,
}

/// Assigns a stable local slot id per [`HidInterface`] address and routes
/// every polled report into [`Core::ingest`].
#[derive(Debug, Default)]
pub struct UsbReportRouter {
    assignments: [Option<Assignment>; MAX_INTERFACES],
    next_slot: u8,
}

impl UsbReportRouter {
    /// Builds a router with no interfaces assigned yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently-enumerated HID interfaces, for the startup
    /// diagnostic dump.
    #[must_use]
    pub fn active_hid_count(&self, transport: &dyn UsbTransport) -> usize {
        transport.active_interfaces().len()
    }

    fn slot_for(&mut self, address: u8) -> Option<u8> {
        if let Some(existing) = self
            .assignments
            .iter()
            .flatten()
            .find(|assignment| assignment.address == address)
        {
            return Some(existing.slot);
        }
        let free_index = self.assignments.iter().position(Option::is_none)?;
        let slot = self.next_slot;
        self.next_slot = self.next_slot.wrapping_add(1);
        self.assignments[free_index] = Some(Assignment { address, slot });
        Some(slot)
    }

    /// Polls every enumerated interface once and feeds any new report into
    /// `core`.
    pub fn poll(
        &mut self,
        transport: &mut dyn UsbTransport,
        core: &mut Core,
        now_source: &dyn Clock,
        settings: &dyn Settings,
        status: &dyn ChordDeviceStatus,
        sink: &mut dyn BleSink,
    ) {
        let interfaces: heapless_interfaces::Interfaces = transport.active_interfaces().iter().copied().collect();
        for interface in interfaces.iter() {
            let Some(slot_id) = self.slot_for(interface.address) else {
                continue;
            };
            let mut buf = [0u8; 16];
            if let Some(report) = transport.poll_report(*interface, &mut buf) {
                let now: Tick = now_source.now_ms();
                core.ingest(slot_id, report, interface.is_chording_device, now, settings, status, sink);
            }
        }
    }
}

mod heapless_interfaces {
    use super::{HidInterface, MAX_INTERFACES};

    /// Fixed-capacity copy of the transport's active-interface list, taken
    /// up front so polling doesn't hold a borrow of `transport` across the
    /// `Core::ingest` call.
    #[derive(Default)]
    pub struct Interfaces {
        items: [Option<HidInterface>; MAX_INTERFACES],
        len: usize,
    }

    impl FromIterator<HidInterface> for Interfaces {
        fn from_iter<I: IntoIterator<Item = HidInterface>>(iter: I) -> Self {
            let mut interfaces = Self::default();
            for item in iter.into_iter().take(MAX_INTERFACES) {
                interfaces.items[interfaces.len] = Some(item);
                interfaces.len += 1;
            }
            interfaces
        }
    }

    impl Interfaces {
        pub fn iter(&self) -> impl Iterator<Item = &HidInterface> {
            self.items[..self.len].iter().filter_map(Option::as_ref)
        }
    }
}
