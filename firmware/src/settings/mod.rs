//! Runtime-adjustable settings (grounded in `m4g_settings.c`/`.h`): a
//! metadata table of ranged integer/boolean values addressable by a small
//! id enum, backing the [`crate::core::Settings`] accessor trait the core
//! pipeline reads from.
//!
//! Values live in RAM and are changed in-place by [`RuntimeSettings::set`];
//! persistence to NVS is a separate, explicit step (see [`nvs`]).

pub mod nvs;

use crate::core::{ArrowMouseConfig, ArrowUsageCodes};

/// Identifies one runtime setting for `get`/`set`, mirroring
/// `m4g_setting_id_t`'s numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SettingId {
    /// Grace window after a chord releases, waiting for the chord word.
    ChordDelayMs = 0x01,
    /// How long a single key may be held before it stops being a chord
    /// candidate.
    ChordTimeoutMs = 0x02,
    /// Cutoff above which a chord's press spread is labeled `Poor`.
    ChordPressDeviationMaxMs = 0x03,
    /// Master switch for the key-repeat engine.
    KeyRepeatEnabled = 0x10,
    /// Hold duration before a key starts repeating.
    KeyRepeatDelayMs = 0x11,
    /// Interval between repeat pairs once repeating.
    KeyRepeatRateMs = 0x12,
    /// Raw mode disables chord recognition entirely.
    RawModeEnabled = 0x20,
    /// Skip re-sending a report byte-identical to the last one sent.
    DuplicateSuppressionEnabled = 0x21,
    /// Whether to compute and log chord timing-quality labels.
    DeviationTrackingEnabled = 0x22,
    /// Enables arrow-key-to-mouse-motion translation.
    ArrowMouseEnabled = 0x23,
    /// Requires both halves of a split chording keyboard to be present
    /// before chord recognition arms.
    RequiredHalvesPolicyEnabled = 0x24,
}

/// Metadata for one [`SettingId`]: display name, value kind, and bounds
/// used to validate [`RuntimeSettings::set`].
#[derive(Debug, Clone, Copy)]
pub struct SettingMetadata {
    /// The setting this entry describes.
    pub id: SettingId,
    /// Human-readable name for a future UI.
    pub name: &'static str,
    /// True for on/off settings, false for ranged integers.
    pub is_boolean: bool,
    /// Minimum accepted value (ignored for booleans, which are coerced to
    /// 0/1).
    pub min_value: u32,
    /// Maximum accepted value (ignored for booleans).
    pub max_value: u32,
    /// Value used by [`RuntimeSettings::reset_to_defaults`].
    pub default_value: u32,
    /// Unit suffix for display (`"ms"` or empty).
    pub unit: &'static str,
}

const METADATA: [SettingMetadata; 11] = [
    SettingMetadata {
        id: SettingId::ChordDelayMs,
        name: "Chord Delay",
        is_boolean: false,
        min_value: 10,
        max_value: 50,
        default_value: 15,
        unit: "ms",
    },
    SettingMetadata {
        id: SettingId::ChordTimeoutMs,
        name: "Chord Timeout",
        is_boolean: false,
        min_value: 100,
        max_value: 2000,
        default_value: 500,
        unit: "ms",
    },
    SettingMetadata {
        id: SettingId::ChordPressDeviationMaxMs,
        name: "Press Deviation Max",
        is_boolean: false,
        min_value: 20,
        max_value: 500,
        default_value: 120,
        unit: "ms",
    },
    SettingMetadata {
        id: SettingId::KeyRepeatEnabled,
        name: "Key Repeat",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 1,
        unit: "",
    },
    SettingMetadata {
        id: SettingId::KeyRepeatDelayMs,
        name: "Repeat Delay",
        is_boolean: false,
        min_value: 250,
        max_value: 2000,
        default_value: 500,
        unit: "ms",
    },
    SettingMetadata {
        id: SettingId::KeyRepeatRateMs,
        name: "Repeat Rate",
        is_boolean: false,
        min_value: 16,
        max_value: 200,
        default_value: 50,
        unit: "ms",
    },
    SettingMetadata {
        id: SettingId::RawModeEnabled,
        name: "Raw Mode",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 0,
        unit: "",
    },
    SettingMetadata {
        id: SettingId::DuplicateSuppressionEnabled,
        name: "Duplicate Suppression",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 1,
        unit: "",
    },
    SettingMetadata {
        id: SettingId::DeviationTrackingEnabled,
        name: "Chord Deviation Tracking",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 0,
        unit: "",
    },
    SettingMetadata {
        id: SettingId::ArrowMouseEnabled,
        name: "Arrow Mouse",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 0,
        unit: "",
    },
    SettingMetadata {
        id: SettingId::RequiredHalvesPolicyEnabled,
        name: "Require Both Halves",
        is_boolean: true,
        min_value: 0,
        max_value: 1,
        default_value: 1,
        unit: "",
    },
];

/// Looks up the metadata entry for `id`.
#[must_use]
pub fn metadata(id: SettingId) -> &'static SettingMetadata {
    METADATA
        .iter()
        .find(|m| m.id == id)
        .expect("every SettingId has a metadata entry")
}

/// All setting metadata, for a future UI or `dump`-style diagnostic.
#[must_use]
pub fn all_metadata() -> &'static [SettingMetadata] {
    &METADATA
}

fn index_of(id: SettingId) -> usize {
    METADATA
        .iter()
        .position(|m| m.id == id)
        .expect("every SettingId has a metadata entry")
}

/// Error returned by [`RuntimeSettings::set`] when a value falls outside a
/// setting's declared range (spec error kind 4: settings write rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    /// The setting that rejected the value.
    pub id: SettingId,
    /// The rejected value.
    pub value: u32,
    /// The accepted range, inclusive.
    pub range: (u32, u32),
}

/// In-RAM runtime settings plus the handful of Rust-native extensions
/// (arrow-to-mouse usage codes and acceleration tuning) that have no
/// counterpart in the original numeric setting table — these are richer
/// than a single ranged `u32` and so are plain fields rather than
/// NVS-addressable ids. Every plain on/off setting, including the
/// required-halves policy and the arrow-mouse master switch, lives in the
/// `values` table like everything else, so it persists through
/// [`nvs::NvsSettingsStore`] along with the rest.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    values: [u32; METADATA.len()],
    arrow_usage_codes: ArrowUsageCodes,
    arrow_mouse_config: ArrowMouseConfig,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        let mut values = [0u32; METADATA.len()];
        for (slot, meta) in values.iter_mut().zip(METADATA.iter()) {
            *slot = meta.default_value;
        }
        Self {
            values,
            arrow_usage_codes: ArrowUsageCodes::default(),
            arrow_mouse_config: ArrowMouseConfig::default(),
        }
    }
}

impl RuntimeSettings {
    /// Builds a settings table at its Kconfig-equivalent defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value currently held for `id`.
    #[must_use]
    pub fn get(&self, id: SettingId) -> u32 {
        self.values[index_of(id)]
    }

    /// Sets `id` to `value`, validating against its declared range (or
    /// coercing to 0/1 for booleans). Changes are RAM-only; call
    /// [`nvs::NvsSettingsStore::commit`] to persist.
    pub fn set(&mut self, id: SettingId, value: u32) -> Result<(), OutOfRange> {
        let meta = metadata(id);
        let coerced = if meta.is_boolean {
            u32::from(value != 0)
        } else if value < meta.min_value || value > meta.max_value {
            return Err(OutOfRange {
                id,
                value,
                range: (meta.min_value, meta.max_value),
            });
        } else {
            value
        };
        self.values[index_of(id)] = coerced;
        Ok(())
    }

    /// Enables or disables the required-halves chord-recognition policy.
    pub fn set_required_halves_policy_enabled(&mut self, enabled: bool) {
        self.values[index_of(SettingId::RequiredHalvesPolicyEnabled)] = u32::from(enabled);
    }

    /// Enables or disables arrow-key-to-mouse-motion translation.
    pub fn set_arrow_mouse_enabled(&mut self, enabled: bool) {
        self.values[index_of(SettingId::ArrowMouseEnabled)] = u32::from(enabled);
    }

    /// Replaces the usage codes recognized as arrow-to-mouse motion.
    pub fn set_arrow_usage_codes(&mut self, codes: ArrowUsageCodes) {
        self.arrow_usage_codes = codes;
    }

    /// Replaces the arrow-to-mouse acceleration tuning.
    pub fn set_arrow_mouse_config(&mut self, config: ArrowMouseConfig) {
        self.arrow_mouse_config = config;
    }

    /// Resets every numeric setting to its table default; the
    /// Rust-native extensions reset to their own defaults too.
    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }
}

impl crate::core::Settings for RuntimeSettings {
    fn raw_mode_enabled(&self) -> bool {
        self.get(SettingId::RawModeEnabled) != 0
    }

    fn duplicate_suppression_enabled(&self) -> bool {
        self.get(SettingId::DuplicateSuppressionEnabled) != 0
    }

    fn key_repeat_enabled(&self) -> bool {
        self.get(SettingId::KeyRepeatEnabled) != 0
    }

    fn key_repeat_delay_ms(&self) -> u64 {
        u64::from(self.get(SettingId::KeyRepeatDelayMs))
    }

    fn key_repeat_rate_ms(&self) -> u64 {
        u64::from(self.get(SettingId::KeyRepeatRateMs))
    }

    fn chord_delay_ms(&self) -> u64 {
        u64::from(self.get(SettingId::ChordDelayMs))
    }

    fn chord_timeout_ms(&self) -> u64 {
        u64::from(self.get(SettingId::ChordTimeoutMs))
    }

    fn chord_press_deviation_max_ms(&self) -> u64 {
        u64::from(self.get(SettingId::ChordPressDeviationMaxMs))
    }

    fn deviation_tracking_enabled(&self) -> bool {
        self.get(SettingId::DeviationTrackingEnabled) != 0
    }

    fn required_halves_policy_enabled(&self) -> bool {
        self.get(SettingId::RequiredHalvesPolicyEnabled) != 0
    }

    fn arrow_mouse_enabled(&self) -> bool {
        self.get(SettingId::ArrowMouseEnabled) != 0
    }

    fn arrow_usage_codes(&self) -> ArrowUsageCodes {
        self.arrow_usage_codes
    }

    fn arrow_mouse_config(&self) -> ArrowMouseConfig {
        self.arrow_mouse_config
    }
}
