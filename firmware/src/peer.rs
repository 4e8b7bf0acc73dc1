//! Split-keyboard peer link (grounded in `m4g_espnow.h`/`.c` and
//! `main_left.c`'s `espnow_rx_cb`): decodes HID reports relayed from the
//! other half of a split keyboard over a radio link, counts lost packets
//! from sequence gaps, and feeds decoded reports into [`crate::core::Core`]
//! under the slot id this receiver assigns the remote half.
//!
//! The radio itself (pairing, channel, encryption) is out of scope and
//! represented as [`PeerTransport`]; this module owns only the wire framing
//! and loss accounting, so it can be tested without any radio hardware.

/// Maximum HID report payload a peer packet can carry.
pub const MAX_REPORT_LEN: usize = 64;

/// Distinguishes the three payload kinds a peer link carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// A relayed HID report (keyboard or mouse) from the peer's USB slot.
    HidReport,
    /// Keepalive with no payload.
    Heartbeat,
    /// A status update (unused by the core pipeline, logged only).
    Status,
}

impl PacketType {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::HidReport),
            0x02 => Some(Self::Heartbeat),
            0x03 => Some(Self::Status),
            _ => None,
        }
    }
}

/// One decoded peer-link packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPacket {
    /// Payload kind.
    pub packet_type: PacketType,
    /// The peer's own idea of which of its USB slots this came from (0-1);
    /// remapped to a local slot id by [`PeerLink::on_received`], since the
    /// receiver owns slot-id assignment for the remote half.
    pub remote_slot: u8,
    /// Whether the originating device is a chording device.
    pub is_chording: bool,
    /// HID report bytes, `report_len` long (empty for heartbeat/status).
    pub payload: heapless_payload::Payload,
    /// Sender-side monotonically increasing counter, used to detect gaps.
    pub sequence: u32,
}

/// A small fixed-capacity byte buffer, avoiding a heap allocation per
/// packet on the decode hot path.
pub mod heapless_payload {
    use super::MAX_REPORT_LEN;

    /// Up to [`MAX_REPORT_LEN`] bytes, with an explicit length.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Payload {
        bytes: [u8; MAX_REPORT_LEN],
        len: usize,
    }

    impl Payload {
        /// Copies `data` in, truncating to [`MAX_REPORT_LEN`] if longer.
        #[must_use]
        pub fn from_slice(data: &[u8]) -> Self {
            let len = data.len().min(MAX_REPORT_LEN);
            let mut bytes = [0u8; MAX_REPORT_LEN];
            bytes[..len].copy_from_slice(&data[..len]);
            Self { bytes, len }
        }

        /// The payload bytes.
        #[must_use]
        pub fn as_slice(&self) -> &[u8] {
            &self.bytes[..self.len]
        }
    }
}

/// Wire offsets within a peer packet, mirroring the C struct's packed
/// layout: `{type: u8, slot: u8, is_chording: u8, report_len: u8,
/// report: [u8; 64], sequence: u32 (little-endian)}`.
const HEADER_LEN: usize = 4;
const SEQUENCE_LEN: usize = 4;

/// Decodes one wire-format packet. Returns `None` for a truncated buffer,
/// an unknown type byte, or a `report_len` that claims more than
/// [`MAX_REPORT_LEN`] or overruns the buffer.
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<PeerPacket> {
    if bytes.len() < HEADER_LEN + MAX_REPORT_LEN + SEQUENCE_LEN {
        return None;
    }
    let packet_type = PacketType::from_byte(bytes[0])?;
    let remote_slot = bytes[1];
    let is_chording = bytes[2] != 0;
    let report_len = bytes[3] as usize;
    if report_len > MAX_REPORT_LEN {
        return None;
    }
    let report_start = HEADER_LEN;
    let payload = heapless_payload::Payload::from_slice(&bytes[report_start..report_start + report_len]);
    let seq_start = HEADER_LEN + MAX_REPORT_LEN;
    let sequence = u32::from_le_bytes(bytes[seq_start..seq_start + SEQUENCE_LEN].try_into().ok()?);

    Some(PeerPacket {
        packet_type,
        remote_slot,
        is_chording,
        payload,
        sequence,
    })
}

/// Radio transport boundary: send/receive raw frames. Pairing, channel
/// selection, and encryption live entirely behind this trait.
pub trait PeerTransport {
    /// Sends a raw encoded packet to the paired peer.
    fn send(&mut self, bytes: &[u8]) -> bool;
}

/// Packet-loss and sequencing statistics for the peer link (exposed
/// alongside [`crate::core::Stats`] for on-device diagnostics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// HID-report packets successfully decoded and dispatched.
    pub packets_received: u32,
    /// Heartbeat packets received.
    pub heartbeats_received: u32,
    /// Packets that failed to decode (truncated, bad type, bad length).
    pub decode_failures: u32,
    /// Estimated packets lost, from gaps in `sequence`.
    pub packets_lost: u32,
}

/// Local slot id assigned to the remote half of a split keyboard. The
/// receiver owns this assignment; it must be disjoint from any local USB
/// slot id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteSlotId(pub u8);

/// Tracks the peer link's sequence counter and loss/decode statistics, and
/// remaps each decoded packet's `remote_slot` to the fixed local slot id
/// this receiver has assigned the peer.
#[derive(Debug)]
pub struct PeerLink {
    local_slot: RemoteSlotId,
    last_sequence: Option<u32>,
    stats: PeerStats,
}

/// One decoded, slot-remapped report ready for [`crate::core::Core::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedReport {
    /// The local slot id this report should be ingested under.
    pub slot_id: u8,
    /// Raw HID report bytes to hand to `Core::ingest`.
    pub payload: heapless_payload::Payload,
    /// Whether the originating device is a chording device.
    pub is_chording_device: bool,
}

impl PeerLink {
    /// Builds a peer link that remaps every HID-report packet to
    /// `local_slot`.
    #[must_use]
    pub fn new(local_slot: RemoteSlotId) -> Self {
        Self {
            local_slot,
            last_sequence: None,
            stats: PeerStats::default(),
        }
    }

    /// Statistics accumulated so far.
    #[must_use]
    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    /// Decodes one raw frame, updates loss/sequence accounting, and
    /// returns a [`DispatchedReport`] ready for `Core::ingest` if it was a
    /// HID-report packet. Heartbeats and status packets update sequence
    /// tracking but never produce a dispatch.
    pub fn on_received(&mut self, bytes: &[u8]) -> Option<DispatchedReport> {
        let Some(packet) = decode(bytes) else {
            self.stats.decode_failures += 1;
            return None;
        };

        self.account_sequence(packet.sequence);

        match packet.packet_type {
            PacketType::Heartbeat => {
                self.stats.heartbeats_received += 1;
                None
            }
            PacketType::Status => None,
            PacketType::HidReport => {
                self.stats.packets_received += 1;
                Some(DispatchedReport {
                    slot_id: self.local_slot.0,
                    payload: packet.payload,
                    is_chording_device: packet.is_chording,
                })
            }
        }
    }

    fn account_sequence(&mut self, sequence: u32) {
        if let Some(last) = self.last_sequence {
            let gap = sequence.wrapping_sub(last).wrapping_sub(1);
            if sequence > last {
                self.stats.packets_lost = self.stats.packets_lost.saturating_add(gap);
            }
        }
        self.last_sequence = Some(sequence);
    }
}
