//! The chord-aware input core: everything between "a USB report arrived" and
//! "a BLE HID report went out" lives here, with no dependency on
//! `esp-idf-svc` or any concrete transport. `Core` owns a single mutable
//! state machine and is driven from exactly two call sites in the enclosing
//! firmware — the USB report callback and a periodic tick — both of which
//! serialize access with a mutex (see `crate::app`).

mod aggregate;
mod chord;
mod emit;
mod filter;
mod mouse;
mod repeat;
mod slot;

pub use chord::DeviationLabel;
pub use emit::Stats;
pub use mouse::{ArrowMouseConfig, ArrowUsageCodes};
pub use slot::MAX_SLOTS;

use aggregate::Aggregator;
use chord::{ChordEmission, ChordFsm};
use emit::Emitter;
use filter::KeyFilter;
use mouse::{ArrowMouseAccelerator, UsbMouseAccelerator};
use repeat::RepeatEngine;
use slot::SlotRegistry;

/// How long between identical "unknown slot" warnings, to keep a misbehaving
/// collaborator from flooding the log (§7 error kind 2 is "warned once").
const INVALID_SLOT_COOLDOWN_MS: u64 = 60_000;
/// How long between malformed-report warnings (§7 error kind 1).
const MALFORMED_REPORT_COOLDOWN_MS: u64 = 1_000;

/// A monotonic millisecond timestamp. The core never reads wall time
/// directly; every entry point takes one of these so tests can drive the
/// core deterministically (§9: "deterministic unit tests with injected
/// clock").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Milliseconds elapsed between `earlier` and `self`, saturating at zero
    /// if `earlier` is actually later (defensive against a misbehaving
    /// clock collaborator).
    #[must_use]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Supplies the core with the current time, at least 10 ms resolution
/// (§6 Monotonic clock). Implemented over `embassy_time::Instant` at the
/// board level; tests use a fake that advances on command.
pub trait Clock {
    /// Returns the current tick.
    fn now_ms(&self) -> Tick;
}

/// The outbound side of the BLE HID collaborator. A `false` return means the
/// send was dropped (no connected central, queue full, notify failed); the
/// core counts and logs this but never retries (§4.5, §7 error kind 3).
pub trait BleSink {
    /// Sends an 8-byte `[mod, reserved, k0..k5]` keyboard report.
    fn send_keyboard(&mut self, report: &[u8; 8]) -> bool;
    /// Sends a 3-byte `[buttons, dx, dy]` mouse report.
    fn send_mouse(&mut self, report: &[u8; 3]) -> bool;
}

/// Read-only knowledge of the chording device's presence, owned by whatever
/// collaborator tracks USB/peer-link connection state.
pub trait ChordDeviceStatus {
    /// Whether any chording-capable slot has ever reported in.
    fn chording_device_present(&self) -> bool;
    /// Whether both halves of a split chording keyboard are present.
    fn both_halves_present(&self) -> bool;
}

/// Read-only settings the core consults every cycle. All values are assumed
/// already range-validated by the settings boundary (§7 error kind 4) — the
/// core never second-guesses them.
pub trait Settings {
    /// Raw mode disables chord recognition entirely; every report is
    /// forwarded as-is.
    fn raw_mode_enabled(&self) -> bool;
    /// Skip re-sending a report byte-identical to the last one sent.
    fn duplicate_suppression_enabled(&self) -> bool;
    /// Master switch for the key-repeat engine.
    fn key_repeat_enabled(&self) -> bool;
    /// Hold duration before a key starts repeating.
    fn key_repeat_delay_ms(&self) -> u64;
    /// Interval between repeat pairs once repeating.
    fn key_repeat_rate_ms(&self) -> u64;
    /// Grace window after a chord releases, waiting for the chord word.
    fn chord_delay_ms(&self) -> u64;
    /// How long a single key may be held before it stops being a chord
    /// candidate.
    fn chord_timeout_ms(&self) -> u64;
    /// Cutoff above which a chord's press spread is labeled `Poor`.
    fn chord_press_deviation_max_ms(&self) -> u64;
    /// Whether to compute and log chord timing-quality labels.
    fn deviation_tracking_enabled(&self) -> bool;
    /// Whether the required-halves policy gates chord recognition.
    fn required_halves_policy_enabled(&self) -> bool;
    /// Whether held arrow keys synthesize mouse motion.
    fn arrow_mouse_enabled(&self) -> bool;
    /// Usage codes recognized as arrow-to-mouse motion.
    fn arrow_usage_codes(&self) -> ArrowUsageCodes;
    /// Tuning for the arrow-to-mouse ramp.
    fn arrow_mouse_config(&self) -> ArrowMouseConfig;
}

/// One parsed USB HID report, with any report-id prefix already stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedReport {
    Keyboard { modifiers: u8, keys: [u8; 6] },
    Mouse { buttons: u8, dx: i8, dy: i8 },
}

fn keyboard_from_payload(payload: &[u8]) -> ParsedReport {
    let mut keys = [0u8; 6];
    keys.copy_from_slice(&payload[2..8]);
    ParsedReport::Keyboard {
        modifiers: payload[0],
        keys,
    }
}

#[allow(clippy::cast_possible_wrap)]
fn mouse_from_payload(payload: &[u8]) -> ParsedReport {
    ParsedReport::Mouse {
        buttons: payload[0],
        dx: payload[1] as i8,
        dy: payload[2] as i8,
    }
}

/// Parses a raw USB report per §6's wire layout, rejecting malformed input
/// (§7 error kind 1).
fn parse_report(bytes: &[u8]) -> Option<ParsedReport> {
    if bytes.len() > 15 && bytes[0] == 0x01 && bytes.get(4) == Some(&0x01) {
        return None;
    }
    match bytes.len() {
        8 => Some(keyboard_from_payload(bytes)),
        9 if bytes[0] == 0x01 => Some(keyboard_from_payload(&bytes[1..])),
        3 => Some(mouse_from_payload(bytes)),
        4 if bytes[0] == 0x02 => Some(mouse_from_payload(&bytes[1..])),
        _ => None,
    }
}

/// Owns every piece of mutable state between report ingestion and report
/// emission. Reached from exactly two call sites; see the module doc.
#[derive(Debug, Default)]
pub struct Core {
    slot_registry: SlotRegistry,
    key_filter: KeyFilter,
    chord_fsm: ChordFsm,
    repeat_engine: RepeatEngine,
    emitter: Emitter,
    usb_mouse_accel: UsbMouseAccelerator,
    arrow_mouse_accel: ArrowMouseAccelerator,
    last_invalid_slot_warn: Option<(u8, Tick)>,
    last_malformed_warn: Option<Tick>,
}

impl Core {
    /// Builds a fresh core: every slot absent, FSM idle, no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current diagnostic counters (§4.9).
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.emitter.stats()
    }

    /// Last keyboard report actually sent over the air.
    #[must_use]
    pub fn last_keyboard_report(&self) -> [u8; 8] {
        self.emitter.last_keyboard_report()
    }

    /// Last mouse report actually sent over the air.
    #[must_use]
    pub fn last_mouse_report(&self) -> [u8; 3] {
        self.emitter.last_mouse_report()
    }

    /// Re-sends the last keyboard report verbatim as a stall-detection
    /// keepalive; a benign duplicate that does not disturb dedup state.
    pub fn resend_last_keyboard(&mut self, sink: &mut dyn BleSink) {
        self.emitter.resend_last_keyboard(sink);
    }

    /// Feeds one raw USB (or decoded peer-link) report into the pipeline.
    /// `slot_id` identifies which tracked input this came from; peer-link
    /// packets use a slot id disjoint from local USB slots (§9).
    pub fn ingest(
        &mut self,
        slot_id: u8,
        bytes: &[u8],
        is_chording_device: bool,
        now: Tick,
        settings: &dyn Settings,
        status: &dyn ChordDeviceStatus,
        sink: &mut dyn BleSink,
    ) {
        let Some(parsed) = parse_report(bytes) else {
            self.warn_malformed(now);
            return;
        };

        match parsed {
            ParsedReport::Keyboard { modifiers, keys } => {
                self.handle_keyboard(slot_id, modifiers, keys, is_chording_device, now, settings, status, sink);
            }
            ParsedReport::Mouse { buttons, dx, dy } => {
                let (adx, ady) = self.usb_mouse_accel.accelerate(dx, dy, now);
                if adx != 0 || ady != 0 {
                    self.emitter.emit_usb_mouse(
                        buttons,
                        adx,
                        ady,
                        settings.duplicate_suppression_enabled(),
                        sink,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_keyboard(
        &mut self,
        slot_id: u8,
        modifiers: u8,
        mut keys: [u8; 6],
        is_chording_device: bool,
        now: Tick,
        settings: &dyn Settings,
        status: &dyn ChordDeviceStatus,
        sink: &mut dyn BleSink,
    ) {
        self.key_filter.apply(&mut keys, is_chording_device, now);
        if self.key_filter.take_filtered_backspace_edge() {
            self.chord_fsm.extend_grace_on_backspace(now);
        }

        if !self
            .slot_registry
            .update_keyboard(slot_id, is_chording_device, modifiers, keys)
        {
            self.warn_invalid_slot(slot_id, now);
            return;
        }

        let arrow_cfg = settings.arrow_mouse_config();
        let agg = Aggregator::aggregate(
            self.slot_registry.slots(),
            settings.arrow_mouse_enabled(),
            settings.arrow_usage_codes(),
            &arrow_cfg,
            &mut self.arrow_mouse_accel,
            now,
        );

        if agg.mouse_dx != 0 || agg.mouse_dy != 0 {
            self.emitter.emit_mouse(
                0,
                agg.mouse_dx,
                agg.mouse_dy,
                settings.duplicate_suppression_enabled(),
                sink,
            );
        }

        let has_activity = agg.key_count > 0 || agg.modifiers != 0;
        let use_chord = !settings.raw_mode_enabled()
            && status.chording_device_present()
            && (agg.any_chording
                || status.both_halves_present()
                || !settings.required_halves_policy_enabled());
        let repeat_armed = self.repeat_engine.is_armed();

        let result = self.chord_fsm.step(
            has_activity,
            agg.modifiers,
            agg.keys,
            agg.key_count,
            use_chord,
            repeat_armed,
            now,
            settings.chord_timeout_ms(),
            settings.deviation_tracking_enabled(),
            settings.chord_press_deviation_max_ms(),
        );

        self.apply_step_side_effects(&result, now);

        if result.request_repeat_release {
            if self.repeat_engine.release().is_some() {
                self.emitter
                    .emit_keyboard(0, [0; 6], settings.duplicate_suppression_enabled(), sink);
            }
            return;
        }

        match result.emission {
            Some(ChordEmission::Immediate(snapshot)) => {
                let report = self.emitter.emit_keyboard(
                    snapshot.modifiers,
                    snapshot.keys,
                    settings.duplicate_suppression_enabled(),
                    sink,
                );
                self.repeat_engine.update_arming(&report[2..8], now);
            }
            Some(ChordEmission::PressRelease { modifiers, key }) => {
                let mut press = [0u8; 6];
                press[0] = key;
                self.emitter.emit_keyboard(modifiers, press, false, sink);
                self.emitter.emit_keyboard(0, [0; 6], false, sink);
                self.repeat_engine.disarm();
            }
            None => {}
        }
    }

    fn apply_step_side_effects(&mut self, result: &chord::ChordStepResult, now: Tick) {
        if result.disarm_backspace_filter {
            self.key_filter.disarm();
        }
        if result.arm_backspace_filter {
            self.key_filter.arm(now);
        }
        if result.disarm_repeat {
            self.repeat_engine.disarm();
        }
        if let Some((key, collect_start_tick)) = result.arm_repeat_from_buffer {
            self.repeat_engine.arm_from_collect(key, collect_start_tick);
        }
        if result.chord_processed {
            self.emitter.record_chord_processed();
        }
        if result.chord_delayed {
            self.emitter.record_chord_delayed();
        }
        if let Some(label) = result.deviation_label {
            log::info!("chord deviation: {label:?}");
        }
    }

    /// Drives time-based work that isn't triggered by an incoming report:
    /// the `EXPECTING_OUTPUT` timeout and the key-repeat engine. Must be
    /// called at least every 10 ms (§5).
    pub fn tick(&mut self, now: Tick, settings: &dyn Settings, sink: &mut dyn BleSink) {
        let timeout_result = self.chord_fsm.poll_timeout(now, settings.chord_delay_ms());
        if timeout_result.disarm_backspace_filter {
            self.key_filter.disarm();
        }

        if !settings.key_repeat_enabled() {
            return;
        }

        if let Some((key, collect_start_tick)) =
            self.chord_fsm.try_seize(now, settings.key_repeat_delay_ms())
        {
            self.repeat_engine.arm_from_collect(key, collect_start_tick);
            self.repeat_engine.set_in_repeat_emit(true);
            let mut press = [0u8; 6];
            press[0] = key;
            self.emitter.emit_keyboard(0, press, false, sink);
            self.repeat_engine.set_in_repeat_emit(false);
        }

        if let Some(key) = self.repeat_engine.tick(
            now,
            settings.key_repeat_delay_ms(),
            settings.key_repeat_rate_ms(),
        ) {
            self.repeat_engine.set_in_repeat_emit(true);
            self.emitter.emit_keyboard(0, [0; 6], false, sink);
            let mut press = [0u8; 6];
            press[0] = key;
            self.emitter.emit_keyboard(0, press, false, sink);
            self.repeat_engine.set_in_repeat_emit(false);
        }
    }

    /// Clears `slot_id`, resets the FSM/filter/repeat to their idle states,
    /// and always emits an all-zero keyboard report when the slot had been
    /// present (§4.8). Called when the USB collaborator reports the device
    /// gone, an endpoint stalls beyond recovery, or a malformed pattern
    /// forces a hard reset.
    pub fn reset_slot(&mut self, slot_id: u8, sink: &mut dyn BleSink) {
        let was_present = self.slot_registry.reset(slot_id);
        self.chord_fsm.force_idle();
        self.key_filter.disarm();
        self.repeat_engine.disarm();
        if was_present {
            self.emitter.emit_keyboard_forced(sink);
        }
    }

    fn warn_invalid_slot(&mut self, slot_id: u8, now: Tick) {
        let should_warn = match self.last_invalid_slot_warn {
            Some((last_slot, last_tick)) => {
                last_slot != slot_id || now.since(last_tick) > INVALID_SLOT_COOLDOWN_MS
            }
            None => true,
        };
        if should_warn {
            log::warn!("ingest: slot {slot_id} is out of range");
            self.last_invalid_slot_warn = Some((slot_id, now));
        }
    }

    fn warn_malformed(&mut self, now: Tick) {
        let should_warn = match self.last_malformed_warn {
            Some(last) => now.since(last) > MALFORMED_REPORT_COOLDOWN_MS,
            None => true,
        };
        if should_warn {
            log::warn!("ingest: dropping malformed report");
            self.last_malformed_warn = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSettings {
        raw_mode: bool,
        dedup: bool,
        key_repeat_enabled: bool,
        key_repeat_delay_ms: u64,
        key_repeat_rate_ms: u64,
        chord_delay_ms: u64,
        chord_timeout_ms: u64,
        deviation_tracking_enabled: bool,
        chord_press_deviation_max_ms: u64,
        required_halves_policy_enabled: bool,
        arrow_mouse_enabled: bool,
    }

    impl Default for FixedSettings {
        fn default() -> Self {
            Self {
                raw_mode: false,
                dedup: true,
                key_repeat_enabled: true,
                key_repeat_delay_ms: 500,
                key_repeat_rate_ms: 50,
                chord_delay_ms: 15,
                chord_timeout_ms: 500,
                deviation_tracking_enabled: false,
                chord_press_deviation_max_ms: 40,
                required_halves_policy_enabled: false,
                arrow_mouse_enabled: false,
            }
        }
    }

    impl Settings for FixedSettings {
        fn raw_mode_enabled(&self) -> bool {
            self.raw_mode
        }
        fn duplicate_suppression_enabled(&self) -> bool {
            self.dedup
        }
        fn key_repeat_enabled(&self) -> bool {
            self.key_repeat_enabled
        }
        fn key_repeat_delay_ms(&self) -> u64 {
            self.key_repeat_delay_ms
        }
        fn key_repeat_rate_ms(&self) -> u64 {
            self.key_repeat_rate_ms
        }
        fn chord_delay_ms(&self) -> u64 {
            self.chord_delay_ms
        }
        fn chord_timeout_ms(&self) -> u64 {
            self.chord_timeout_ms
        }
        fn chord_press_deviation_max_ms(&self) -> u64 {
            self.chord_press_deviation_max_ms
        }
        fn deviation_tracking_enabled(&self) -> bool {
            self.deviation_tracking_enabled
        }
        fn required_halves_policy_enabled(&self) -> bool {
            self.required_halves_policy_enabled
        }
        fn arrow_mouse_enabled(&self) -> bool {
            self.arrow_mouse_enabled
        }
        fn arrow_usage_codes(&self) -> ArrowUsageCodes {
            ArrowUsageCodes::default()
        }
        fn arrow_mouse_config(&self) -> ArrowMouseConfig {
            ArrowMouseConfig::default()
        }
    }

    struct AlwaysPresent;
    impl ChordDeviceStatus for AlwaysPresent {
        fn chording_device_present(&self) -> bool {
            true
        }
        fn both_halves_present(&self) -> bool {
            true
        }
    }

    struct NeverPresent;
    impl ChordDeviceStatus for NeverPresent {
        fn chording_device_present(&self) -> bool {
            false
        }
        fn both_halves_present(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        keyboard: Vec<[u8; 8]>,
        mouse: Vec<[u8; 3]>,
    }

    impl BleSink for RecordingSink {
        fn send_keyboard(&mut self, report: &[u8; 8]) -> bool {
            self.keyboard.push(*report);
            true
        }
        fn send_mouse(&mut self, report: &[u8; 3]) -> bool {
            self.mouse.push(*report);
            true
        }
    }

    fn kb_report(modifiers: u8, keys: [u8; 6]) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0] = modifiers;
        out[2..8].copy_from_slice(&keys);
        out
    }

    #[test]
    fn s1_plain_key_on_non_chording_slot() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        core.ingest(
            0,
            &[0, 0, 0x04, 0, 0, 0, 0, 0],
            false,
            Tick(0),
            &settings,
            &status,
            &mut sink,
        );
        core.ingest(
            0,
            &[0, 0, 0, 0, 0, 0, 0, 0],
            false,
            Tick(1),
            &settings,
            &status,
            &mut sink,
        );

        assert_eq!(
            sink.keyboard,
            vec![kb_report(0, [0x04, 0, 0, 0, 0, 0]), kb_report(0, [0; 6])]
        );
    }

    #[test]
    fn s2_duplicate_suppression() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        for tick in 0..2 {
            core.ingest(
                0,
                &[0, 0, 0x04, 0, 0, 0, 0, 0],
                false,
                Tick(tick),
                &settings,
                &status,
                &mut sink,
            );
        }
        core.ingest(
            0,
            &[0; 8],
            false,
            Tick(2),
            &settings,
            &status,
            &mut sink,
        );

        assert_eq!(sink.keyboard.len(), 2);
        assert_eq!(core.stats().suppressed_duplicates_keyboard, 1);
    }

    #[test]
    fn s3_single_key_on_chording_slot_released_before_timeout() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = AlwaysPresent;
        let mut sink = RecordingSink::default();

        core.ingest(
            0,
            &[0, 0, 0x04, 0, 0, 0, 0, 0],
            true,
            Tick(0),
            &settings,
            &status,
            &mut sink,
        );
        assert!(sink.keyboard.is_empty());

        core.ingest(0, &[0; 8], true, Tick(100), &settings, &status, &mut sink);

        assert_eq!(
            sink.keyboard,
            vec![kb_report(0, [0x04, 0, 0, 0, 0, 0]), kb_report(0, [0; 6])]
        );
    }

    #[test]
    fn s4_two_key_chord_forwards_chord_word_then_release() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = AlwaysPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0, 0, 0x04, 0, 0, 0, 0, 0], true, Tick(0), &settings, &status, &mut sink);
        core.ingest(
            0,
            &[0, 0, 0x04, 0x05, 0, 0, 0, 0],
            true,
            Tick(5),
            &settings,
            &status,
            &mut sink,
        );
        core.ingest(0, &[0; 8], true, Tick(30), &settings, &status, &mut sink);
        assert!(sink.keyboard.is_empty());

        core.ingest(
            0,
            &[0, 0, 0x09, 0, 0, 0, 0, 0],
            true,
            Tick(40),
            &settings,
            &status,
            &mut sink,
        );
        assert_eq!(sink.keyboard, vec![kb_report(0, [0x09, 0, 0, 0, 0, 0])]);
        assert_eq!(core.stats().chord_reports_processed, 1);

        core.ingest(0, &[0; 8], true, Tick(41), &settings, &status, &mut sink);
        assert_eq!(
            sink.keyboard,
            vec![kb_report(0, [0x09, 0, 0, 0, 0, 0]), kb_report(0, [0; 6])]
        );
    }

    #[test]
    fn s5_failed_chord_times_out_with_no_emission() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = AlwaysPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0, 0, 0x04, 0, 0, 0, 0, 0], true, Tick(0), &settings, &status, &mut sink);
        core.ingest(
            0,
            &[0, 0, 0x04, 0x05, 0, 0, 0, 0],
            true,
            Tick(5),
            &settings,
            &status,
            &mut sink,
        );
        core.ingest(0, &[0; 8], true, Tick(30), &settings, &status, &mut sink);

        core.tick(Tick(45), &settings, &mut sink);

        assert!(sink.keyboard.is_empty());
        assert_eq!(core.stats().chord_reports_processed, 0);

        core.ingest(
            0,
            &[0, 0, 0x07, 0, 0, 0, 0, 0],
            true,
            Tick(50),
            &settings,
            &status,
            &mut sink,
        );
        assert!(sink.keyboard.is_empty());
    }

    #[test]
    fn s6_key_repeat_seizes_and_repeats_every_rate_interval() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = AlwaysPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0, 0, 0x04, 0, 0, 0, 0, 0], true, Tick(0), &settings, &status, &mut sink);

        for t in (10..500).step_by(10) {
            core.tick(Tick(t), &settings, &mut sink);
        }
        assert!(sink.keyboard.is_empty());

        core.tick(Tick(500), &settings, &mut sink);
        assert_eq!(
            sink.keyboard,
            vec![
                kb_report(0, [0x04, 0, 0, 0, 0, 0]),
                kb_report(0, [0; 6]),
                kb_report(0, [0x04, 0, 0, 0, 0, 0]),
            ]
        );

        sink.keyboard.clear();
        core.tick(Tick(550), &settings, &mut sink);
        assert_eq!(
            sink.keyboard,
            vec![kb_report(0, [0; 6]), kb_report(0, [0x04, 0, 0, 0, 0, 0])]
        );
    }

    #[test]
    fn reset_slot_emits_zero_report_exactly_once() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0, 0, 0x04, 0, 0, 0, 0, 0], false, Tick(0), &settings, &status, &mut sink);
        sink.keyboard.clear();

        core.reset_slot(0, &mut sink);
        assert_eq!(sink.keyboard, vec![kb_report(0, [0; 6])]);

        sink.keyboard.clear();
        core.reset_slot(0, &mut sink);
        assert!(sink.keyboard.is_empty());
    }

    #[test]
    fn malformed_short_report_is_dropped_without_state_change() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0; 7], false, Tick(0), &settings, &status, &mut sink);
        assert!(sink.keyboard.is_empty());
        assert_eq!(core.last_keyboard_report(), [0; 8]);
    }

    #[test]
    fn prefixed_keyboard_report_parses_same_as_unprefixed() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        core.ingest(
            0,
            &[0x01, 0, 0, 0x04, 0, 0, 0, 0, 0],
            false,
            Tick(0),
            &settings,
            &status,
            &mut sink,
        );
        assert_eq!(sink.keyboard, vec![kb_report(0, [0x04, 0, 0, 0, 0, 0])]);
    }

    #[test]
    fn usb_mouse_report_ramps_through_core_ingest() {
        let mut core = Core::new();
        let settings = FixedSettings::default();
        let status = NeverPresent;
        let mut sink = RecordingSink::default();

        core.ingest(0, &[0, 1, 0], false, Tick(0), &settings, &status, &mut sink);
        assert_eq!(sink.mouse[0][1] as i8, 5);
    }
}
