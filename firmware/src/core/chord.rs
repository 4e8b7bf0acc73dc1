//! Chord state machine (§4.4): recognizes a chording device's simultaneous
//! multi-key press/release pattern and withholds keyboard emission until the
//! device's own chord-word output arrives (or the attempt times out).

use super::Tick;

/// The four FSM states from the transition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChordState {
    /// No chord in progress; activity passes straight through (or is armed
    /// for repeat).
    #[default]
    Idle,
    /// Accumulating a candidate chord while keys are held.
    Collecting,
    /// All chord keys released; waiting for the chording device's own
    /// chord-word report within `chord_delay_ms`.
    ExpectingOutput,
    /// The chord word itself is being forwarded.
    PassingOutput,
}

/// Subjective chord-timing quality, logged (not emitted) on chord release
/// when deviation tracking is enabled (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationLabel {
    /// `last_press - first_press <= 10*(n-1) ms`.
    Perfect,
    /// `<= 25*(n-1) ms`.
    Good,
    /// `> chord_press_deviation_max_ms`.
    Poor,
    /// Everything between `Good` and `Poor`.
    Acceptable,
}

fn classify_deviation(spread_ms: u64, n: usize, press_deviation_max_ms: u64) -> DeviationLabel {
    let n_minus_1 = u64::try_from(n.saturating_sub(1)).unwrap_or(u64::MAX);
    if spread_ms <= 10 * n_minus_1 {
        DeviationLabel::Perfect
    } else if spread_ms <= 25 * n_minus_1 {
        DeviationLabel::Good
    } else if spread_ms > press_deviation_max_ms {
        DeviationLabel::Poor
    } else {
        DeviationLabel::Acceptable
    }
}

#[derive(Debug, Default)]
struct Buffer {
    key_count: usize,
    first_key: u8,
    modifiers: u8,
    collect_start_tick: Tick,
    first_press_tick: Tick,
    last_press_tick: Tick,
    peak_simultaneous: usize,
}

impl Buffer {
    fn begin(&mut self, key_count: usize, first_key: u8, modifiers: u8, now: Tick) {
        self.key_count = key_count;
        self.first_key = first_key;
        self.modifiers = modifiers;
        self.collect_start_tick = now;
        self.first_press_tick = now;
        self.last_press_tick = now;
        self.peak_simultaneous = key_count;
    }

    fn add(&mut self, key_count: usize, modifiers: u8, now: Tick) {
        if key_count > self.peak_simultaneous {
            self.peak_simultaneous = key_count;
            self.last_press_tick = now;
        }
        self.key_count = key_count;
        self.modifiers |= modifiers;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One aggregated-state snapshot the FSM asks the caller to emit verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordSnapshot {
    /// HID modifier byte to emit.
    pub modifiers: u8,
    /// Usage codes to emit, zero-padded.
    pub keys: [u8; 6],
}

/// What the FSM wants the emitter to do this cycle, in addition to its
/// internal bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordEmission {
    /// Forward the aggregated state (press, release, or chord word) as-is.
    Immediate(ChordSnapshot),
    /// Emit a press of `key` immediately followed by its release — the
    /// single-key, non-chord fast path.
    PressRelease {
        /// Modifier byte in effect while the key was held.
        modifiers: u8,
        /// The one usage code that was held.
        key: u8,
    },
}

/// Everything the FSM wants `Core` to do as a result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChordStepResult {
    /// Report(s) to send, if any.
    pub emission: Option<ChordEmission>,
    /// Disarm the key-repeat engine (a fresh chord attempt began).
    pub disarm_repeat: bool,
    /// Arm the single overheld key directly into key-repeat, using the
    /// original press tick, without emitting its initial press.
    pub arm_repeat_from_buffer: Option<(u8, Tick)>,
    /// Arm the backspace filter (chord output is expected imminently).
    pub arm_backspace_filter: bool,
    /// Disarm the backspace filter (the chord attempt failed).
    pub disarm_backspace_filter: bool,
    /// A chord word was successfully forwarded this cycle.
    pub chord_processed: bool,
    /// The FSM just entered `EXPECTING_OUTPUT` with a multi-key buffer.
    pub chord_delayed: bool,
    /// Tell the caller to ask the repeat engine to emit the final release
    /// for an already-armed key (IDLE, no activity, repeat armed).
    pub request_repeat_release: bool,
    /// Chord-timing quality, when deviation tracking produced one.
    pub deviation_label: Option<DeviationLabel>,
}

impl ChordStepResult {
    fn immediate(modifiers: u8, keys: [u8; 6]) -> Self {
        Self {
            emission: Some(ChordEmission::Immediate(ChordSnapshot { modifiers, keys })),
            ..Self::default()
        }
    }

    fn none() -> Self {
        Self::default()
    }
}

/// The chord-aware gate between the state aggregator and the emitter.
#[derive(Debug, Default)]
pub struct ChordFsm {
    state: ChordState,
    buffer: Buffer,
    expect_tick: Tick,
}

impl ChordFsm {
    /// Builds a fresh FSM in `IDLE`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, for diagnostics/tests.
    #[must_use]
    pub fn state(&self) -> ChordState {
        self.state
    }

    /// Forces the FSM back to `IDLE` and clears its buffer, used by
    /// `reset_slot` and by the key-repeat engine's seize.
    pub fn force_idle(&mut self) {
        self.state = ChordState::Idle;
        self.buffer.clear();
    }

    /// Drives one ingest-triggered cycle through the transition table.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        has_activity: bool,
        modifiers: u8,
        keys: [u8; 6],
        key_count: usize,
        use_chord: bool,
        repeat_armed: bool,
        now: Tick,
        chord_timeout_ms: u64,
        deviation_tracking_enabled: bool,
        chord_press_deviation_max_ms: u64,
    ) -> ChordStepResult {
        match self.state {
            ChordState::Idle => {
                if has_activity {
                    if use_chord {
                        self.state = ChordState::Collecting;
                        self.buffer.begin(key_count, keys[0], modifiers, now);
                        ChordStepResult {
                            disarm_repeat: true,
                            ..ChordStepResult::none()
                        }
                    } else {
                        ChordStepResult::immediate(modifiers, keys)
                    }
                } else if repeat_armed {
                    ChordStepResult {
                        request_repeat_release: true,
                        ..ChordStepResult::none()
                    }
                } else {
                    ChordStepResult::immediate(0, [0; 6])
                }
            }
            ChordState::Collecting => {
                if has_activity {
                    self.buffer.add(key_count, modifiers, now);
                    ChordStepResult::none()
                } else {
                    let held_ms = now.since(self.buffer.collect_start_tick);
                    let label = if self.buffer.peak_simultaneous >= 2 && deviation_tracking_enabled
                    {
                        let spread = self
                            .buffer
                            .last_press_tick
                            .since(self.buffer.first_press_tick);
                        Some(classify_deviation(
                            spread,
                            self.buffer.peak_simultaneous,
                            chord_press_deviation_max_ms,
                        ))
                    } else {
                        None
                    };
                    if self.buffer.peak_simultaneous == 1 && held_ms < chord_timeout_ms {
                        let key = self.buffer.first_key;
                        let modifiers_held = self.buffer.modifiers;
                        self.state = ChordState::Idle;
                        self.buffer.clear();
                        ChordStepResult {
                            emission: Some(ChordEmission::PressRelease {
                                modifiers: modifiers_held,
                                key,
                            }),
                            disarm_repeat: true,
                            deviation_label: label,
                            ..ChordStepResult::none()
                        }
                    } else {
                        let single = self.buffer.peak_simultaneous == 1;
                        let arm_from_buffer = if single {
                            Some((self.buffer.first_key, self.buffer.collect_start_tick))
                        } else {
                            None
                        };
                        let delayed = !single;
                        self.state = ChordState::ExpectingOutput;
                        self.expect_tick = now;
                        ChordStepResult {
                            arm_backspace_filter: !single,
                            arm_repeat_from_buffer: arm_from_buffer,
                            chord_delayed: delayed,
                            deviation_label: label,
                            ..ChordStepResult::none()
                        }
                    }
                }
            }
            ChordState::ExpectingOutput => {
                if has_activity {
                    self.state = ChordState::PassingOutput;
                    self.buffer.clear();
                    ChordStepResult {
                        chord_processed: true,
                        ..ChordStepResult::immediate(modifiers, keys)
                    }
                } else {
                    // No-activity cycles while waiting are silent; the timeout
                    // itself is discovered by `poll_timeout`, not here.
                    ChordStepResult::none()
                }
            }
            ChordState::PassingOutput => {
                if has_activity {
                    ChordStepResult::immediate(modifiers, keys)
                } else {
                    self.state = ChordState::ExpectingOutput;
                    self.expect_tick = now;
                    ChordStepResult::immediate(0, [0; 6])
                }
            }
        }
    }

    /// Extends the `EXPECTING_OUTPUT` grace window when the key filter just
    /// swallowed a backspace (the chording device's own cleanup keystroke).
    pub fn extend_grace_on_backspace(&mut self, now: Tick) {
        if self.state == ChordState::ExpectingOutput {
            self.expect_tick = now;
        }
    }

    /// Polled from the periodic tick: discards a chord attempt that has sat
    /// in `EXPECTING_OUTPUT` past `chord_delay_ms` with no chord word
    /// arriving (§8 scenario S5).
    pub fn poll_timeout(&mut self, now: Tick, chord_delay_ms: u64) -> ChordStepResult {
        if self.state == ChordState::ExpectingOutput
            && now.since(self.expect_tick) > chord_delay_ms
        {
            self.state = ChordState::Idle;
            self.buffer.clear();
            ChordStepResult {
                disarm_backspace_filter: true,
                ..ChordStepResult::none()
            }
        } else {
            ChordStepResult::none()
        }
    }

    /// Polled from the periodic tick: hands a single-key chord buffer over
    /// to the key-repeat engine once it has been held for `key_repeat_delay_ms`,
    /// per §4.7's seize rule. Returns `(key, collect_start_tick)`.
    pub fn try_seize(&mut self, now: Tick, key_repeat_delay_ms: u64) -> Option<(u8, Tick)> {
        if self.state != ChordState::Collecting || self.buffer.peak_simultaneous != 1 {
            return None;
        }
        if now.since(self.buffer.collect_start_tick) < key_repeat_delay_ms {
            return None;
        }
        let result = (self.buffer.first_key, self.buffer.collect_start_tick);
        self.force_idle();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHORD_TIMEOUT_MS: u64 = 500;
    const CHORD_DELAY_MS: u64 = 15;

    fn step_activity(
        fsm: &mut ChordFsm,
        keys: [u8; 6],
        key_count: usize,
        now: Tick,
    ) -> ChordStepResult {
        fsm.step(
            key_count > 0,
            0,
            keys,
            key_count,
            true,
            false,
            now,
            CHORD_TIMEOUT_MS,
            false,
            0,
        )
    }

    #[test]
    fn non_chord_bypass_emits_immediately() {
        let mut fsm = ChordFsm::new();
        let result = fsm.step(
            true,
            0,
            [0x04, 0, 0, 0, 0, 0],
            1,
            false,
            false,
            Tick(0),
            CHORD_TIMEOUT_MS,
            false,
            0,
        );
        assert_eq!(
            result.emission,
            Some(ChordEmission::Immediate(ChordSnapshot {
                modifiers: 0,
                keys: [0x04, 0, 0, 0, 0, 0]
            }))
        );
        assert_eq!(fsm.state(), ChordState::Idle);
    }

    #[test]
    fn single_key_under_timeout_emits_press_then_release() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        assert_eq!(fsm.state(), ChordState::Collecting);
        let result = step_activity(&mut fsm, [0; 6], 0, Tick(100));
        assert_eq!(
            result.emission,
            Some(ChordEmission::PressRelease {
                modifiers: 0,
                key: 0x04
            })
        );
        assert_eq!(fsm.state(), ChordState::Idle);
    }

    #[test]
    fn single_key_held_past_timeout_does_not_arm_backspace_filter() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        let release = step_activity(&mut fsm, [0; 6], 0, Tick(CHORD_TIMEOUT_MS));
        assert!(release.emission.is_none());
        assert!(!release.arm_backspace_filter);
        assert!(!release.chord_delayed);
        assert!(release.arm_repeat_from_buffer.is_some());
        assert_eq!(fsm.state(), ChordState::ExpectingOutput);
    }

    #[test]
    fn two_key_chord_waits_then_forwards_chord_word() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        let add = step_activity(&mut fsm, [0x04, 0x05, 0, 0, 0, 0], 2, Tick(5));
        assert!(add.emission.is_none());
        let release = step_activity(&mut fsm, [0; 6], 0, Tick(30));
        assert!(release.emission.is_none());
        assert!(release.arm_backspace_filter);
        assert!(release.chord_delayed);
        assert_eq!(fsm.state(), ChordState::ExpectingOutput);

        let word = fsm.step(
            true,
            0,
            [0x09, 0, 0, 0, 0, 0],
            1,
            true,
            false,
            Tick(40),
            CHORD_TIMEOUT_MS,
            false,
            0,
        );
        assert!(word.chord_processed);
        assert_eq!(
            word.emission,
            Some(ChordEmission::Immediate(ChordSnapshot {
                modifiers: 0,
                keys: [0x09, 0, 0, 0, 0, 0]
            }))
        );
        assert_eq!(fsm.state(), ChordState::PassingOutput);

        let release_of_word = fsm.step(
            false,
            0,
            [0; 6],
            0,
            true,
            false,
            Tick(45),
            CHORD_TIMEOUT_MS,
            false,
            0,
        );
        assert_eq!(
            release_of_word.emission,
            Some(ChordEmission::Immediate(ChordSnapshot {
                modifiers: 0,
                keys: [0; 6]
            }))
        );
        assert_eq!(fsm.state(), ChordState::ExpectingOutput);
    }

    #[test]
    fn expecting_output_times_out_and_discards_silently() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        step_activity(&mut fsm, [0x04, 0x05, 0, 0, 0, 0], 2, Tick(5));
        step_activity(&mut fsm, [0; 6], 0, Tick(30));
        assert_eq!(fsm.state(), ChordState::ExpectingOutput);

        let before = fsm.poll_timeout(Tick(44), CHORD_DELAY_MS);
        assert!(before.emission.is_none());
        assert_eq!(fsm.state(), ChordState::ExpectingOutput);

        let after = fsm.poll_timeout(Tick(46), CHORD_DELAY_MS);
        assert!(after.emission.is_none());
        assert!(after.disarm_backspace_filter);
        assert_eq!(fsm.state(), ChordState::Idle);
    }

    #[test]
    fn seize_requires_delay_elapsed_and_single_key_buffer() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        assert!(fsm.try_seize(Tick(100), 500).is_none());
        let seized = fsm.try_seize(Tick(500), 500);
        assert_eq!(seized, Some((0x04, Tick(0))));
        assert_eq!(fsm.state(), ChordState::Idle);
    }

    #[test]
    fn seize_does_not_fire_for_multi_key_buffer() {
        let mut fsm = ChordFsm::new();
        step_activity(&mut fsm, [0x04, 0, 0, 0, 0, 0], 1, Tick(0));
        step_activity(&mut fsm, [0x04, 0x05, 0, 0, 0, 0], 2, Tick(5));
        assert!(fsm.try_seize(Tick(600), 500).is_none());
    }

    #[test]
    fn deviation_label_reported_on_tight_chord() {
        let mut fsm = ChordFsm::new();
        fsm.step(
            true,
            0,
            [0x04, 0, 0, 0, 0, 0],
            1,
            true,
            false,
            Tick(0),
            CHORD_TIMEOUT_MS,
            true,
            40,
        );
        fsm.step(
            true,
            0,
            [0x04, 0x05, 0, 0, 0, 0],
            2,
            true,
            false,
            Tick(5),
            CHORD_TIMEOUT_MS,
            true,
            40,
        );
        let release = fsm.step(
            false,
            0,
            [0; 6],
            0,
            true,
            false,
            Tick(30),
            CHORD_TIMEOUT_MS,
            true,
            40,
        );
        assert_eq!(release.deviation_label, Some(DeviationLabel::Perfect));
    }
}
