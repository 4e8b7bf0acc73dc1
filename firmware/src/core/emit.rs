//! Emitter & deduplication (§4.5): builds wire-format reports, forwards them
//! through the `BleSink` collaborator, and tracks the counters in §4.9.

use super::BleSink;

/// Diagnostic counters exposed to the host system (§4.9).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Keyboard reports successfully handed to the sink.
    pub keyboard_reports_sent: u32,
    /// Mouse reports successfully handed to the sink.
    pub mouse_reports_sent: u32,
    /// Chord words successfully forwarded (EXPECTING_OUTPUT → PASSING_OUTPUT).
    pub chord_reports_processed: u32,
    /// Cycles where the FSM entered `EXPECTING_OUTPUT` with a multi-key
    /// buffer (§9 adopted definition).
    pub chord_reports_delayed: u32,
    /// Keyboard reports skipped because they duplicated the last sent one.
    pub suppressed_duplicates_keyboard: u32,
    /// Mouse reports skipped because they duplicated the last sent one.
    pub suppressed_duplicates_mouse: u32,
    /// Keyboard sends the sink rejected.
    pub keyboard_send_failures: u32,
    /// Mouse sends the sink rejected.
    pub mouse_send_failures: u32,
}

/// Builds and deduplicates outbound reports, remembering the last of each
/// kind actually sent.
#[derive(Debug, Default)]
pub struct Emitter {
    last_keyboard: [u8; 8],
    last_mouse: [u8; 3],
    stats: Stats,
}

impl Emitter {
    /// Builds an emitter with no prior report history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Last keyboard report actually sent (or all-zero if none yet).
    #[must_use]
    pub fn last_keyboard_report(&self) -> [u8; 8] {
        self.last_keyboard
    }

    /// Last mouse report actually sent (or all-zero if none yet).
    #[must_use]
    pub fn last_mouse_report(&self) -> [u8; 3] {
        self.last_mouse
    }

    /// Builds `[mod, 0, k0..k5]`, deduplicates against the last sent report
    /// when `dedup` is set, and forwards to `sink`. Returns the report that
    /// was (or would have been) sent, for callers that also drive key-repeat
    /// arming from it.
    pub fn emit_keyboard(
        &mut self,
        modifiers: u8,
        keys: [u8; 6],
        dedup: bool,
        sink: &mut dyn BleSink,
    ) -> [u8; 8] {
        let mut report = [0u8; 8];
        report[0] = modifiers;
        report[2..8].copy_from_slice(&keys);

        if dedup && report == self.last_keyboard {
            self.stats.suppressed_duplicates_keyboard += 1;
            return report;
        }

        if sink.send_keyboard(&report) {
            self.stats.keyboard_reports_sent += 1;
            self.last_keyboard = report;
        } else {
            self.stats.keyboard_send_failures += 1;
        }
        report
    }

    /// Forces a keyboard emission even if it duplicates the last sent
    /// report — used for `reset_slot`'s unconditional release (§4.8).
    pub fn emit_keyboard_forced(&mut self, sink: &mut dyn BleSink) {
        let report = [0u8; 8];
        if sink.send_keyboard(&report) {
            self.stats.keyboard_reports_sent += 1;
        } else {
            self.stats.keyboard_send_failures += 1;
        }
        self.last_keyboard = report;
    }

    /// Re-sends the last keyboard report verbatim, bypassing deduplication
    /// and leaving `last_keyboard` unchanged — a benign duplicate used as a
    /// stall-detection keepalive (`m4g_diag.c`'s periodic task re-sends the
    /// last keyboard report every 30s while connected).
    pub fn resend_last_keyboard(&mut self, sink: &mut dyn BleSink) {
        if sink.send_keyboard(&self.last_keyboard) {
            self.stats.keyboard_reports_sent += 1;
        } else {
            self.stats.keyboard_send_failures += 1;
        }
    }

    /// Builds `[buttons, dx, dy]` from i16 deltas (the arrow-mouse path),
    /// saturating each axis to ±127, deduplicates, and forwards.
    pub fn emit_mouse(
        &mut self,
        buttons: u8,
        dx: i16,
        dy: i16,
        dedup: bool,
        sink: &mut dyn BleSink,
    ) -> [u8; 3] {
        let clamped_dx = i8::try_from(dx.clamp(-127, 127)).unwrap_or(0);
        let clamped_dy = i8::try_from(dy.clamp(-127, 127)).unwrap_or(0);
        self.emit_mouse_raw(buttons, clamped_dx, clamped_dy, dedup, sink)
    }

    /// Builds `[buttons, dx, dy]` directly from raw USB mouse deltas, with no
    /// clamping (an `i8::MIN` delta is forwarded as `i8::MIN`).
    pub fn emit_usb_mouse(
        &mut self,
        buttons: u8,
        dx: i8,
        dy: i8,
        dedup: bool,
        sink: &mut dyn BleSink,
    ) -> [u8; 3] {
        self.emit_mouse_raw(buttons, dx, dy, dedup, sink)
    }

    fn emit_mouse_raw(
        &mut self,
        buttons: u8,
        dx: i8,
        dy: i8,
        dedup: bool,
        sink: &mut dyn BleSink,
    ) -> [u8; 3] {
        #[allow(clippy::cast_sign_loss)]
        let report = [buttons, dx as u8, dy as u8];

        if dedup && report == self.last_mouse {
            self.stats.suppressed_duplicates_mouse += 1;
            return report;
        }

        if sink.send_mouse(&report) {
            self.stats.mouse_reports_sent += 1;
            self.last_mouse = report;
        } else {
            self.stats.mouse_send_failures += 1;
        }
        report
    }

    /// Records a successfully forwarded chord word.
    pub fn record_chord_processed(&mut self) {
        self.stats.chord_reports_processed += 1;
    }

    /// Records a cycle that entered `EXPECTING_OUTPUT` with a multi-key
    /// buffer.
    pub fn record_chord_delayed(&mut self) {
        self.stats.chord_reports_delayed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeSink {
        keyboard_sends: Vec<[u8; 8]>,
        mouse_sends: Vec<[u8; 3]>,
        fail_keyboard: bool,
        fail_mouse: bool,
    }

    impl BleSink for FakeSink {
        fn send_keyboard(&mut self, report: &[u8; 8]) -> bool {
            self.keyboard_sends.push(*report);
            !self.fail_keyboard
        }
        fn send_mouse(&mut self, report: &[u8; 3]) -> bool {
            self.mouse_sends.push(*report);
            !self.fail_mouse
        }
    }

    #[test]
    fn keyboard_reserved_byte_is_always_zero() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        let report = emitter.emit_keyboard(0x02, [0x04, 0, 0, 0, 0, 0], false, &mut sink);
        assert_eq!(report[1], 0);
        assert_eq!(report, [0x02, 0, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(emitter.stats().keyboard_reports_sent, 1);
    }

    #[test]
    fn duplicate_keyboard_reports_are_suppressed() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        emitter.emit_keyboard(0, [0x04, 0, 0, 0, 0, 0], true, &mut sink);
        emitter.emit_keyboard(0, [0x04, 0, 0, 0, 0, 0], true, &mut sink);
        assert_eq!(sink.keyboard_sends.len(), 1);
        assert_eq!(emitter.stats().suppressed_duplicates_keyboard, 1);
    }

    #[test]
    fn send_failure_counts_but_does_not_retry() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink {
            fail_keyboard: true,
            ..FakeSink::default()
        };
        emitter.emit_keyboard(0, [0x04, 0, 0, 0, 0, 0], false, &mut sink);
        assert_eq!(sink.keyboard_sends.len(), 1);
        assert_eq!(emitter.stats().keyboard_send_failures, 1);
        assert_eq!(emitter.stats().keyboard_reports_sent, 0);
    }

    #[test]
    fn arrow_path_mouse_clamps_to_127_not_min() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        let report = emitter.emit_mouse(0, -400, 400, false, &mut sink);
        assert_eq!(report[1] as i8, -127);
        assert_eq!(report[2] as i8, 127);
    }

    #[test]
    fn usb_path_mouse_preserves_i8_min() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        let report = emitter.emit_usb_mouse(0, i8::MIN, 0, false, &mut sink);
        assert_eq!(report[1] as i8, i8::MIN);
    }

    #[test]
    fn reset_forces_zero_report_even_if_identical_to_last() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        emitter.emit_keyboard(0, [0; 6], true, &mut sink);
        emitter.emit_keyboard_forced(&mut sink);
        assert_eq!(sink.keyboard_sends.len(), 2);
    }

    #[test]
    fn keepalive_resends_last_report_without_clearing_it() {
        let mut emitter = Emitter::new();
        let mut sink = FakeSink::default();
        let held = emitter.emit_keyboard(0, [0x04, 0, 0, 0, 0, 0], true, &mut sink);
        emitter.resend_last_keyboard(&mut sink);
        assert_eq!(sink.keyboard_sends, vec![held, held]);
        assert_eq!(emitter.last_keyboard_report(), held);
    }
}
