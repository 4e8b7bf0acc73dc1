//! NVS persistence for [`RuntimeSettings`] (grounded in `m4g_settings.c`'s
//! `load_setting_from_nvs`/`save_setting_to_nvs`/`m4g_settings_commit`): one
//! `u32` per [`SettingId`], keyed `"setting_%02X"`, written only on an
//! explicit [`NvsSettingsStore::commit`] — never on every `set` — since NVS
//! write cycles are finite.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use super::{all_metadata, RuntimeSettings, SettingId};

const NAMESPACE: &str = "m4g_settings";

fn nvs_key(id: SettingId) -> String {
    format!("setting_{:02X}", id as u8)
}

/// Owns the NVS namespace settings are persisted under.
pub struct NvsSettingsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsSettingsStore {
    /// Opens (creating if absent) the settings namespace on `partition`.
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    /// Loads every setting found in NVS into `settings`, leaving entries
    /// absent from NVS at their current (default) value — mirrors
    /// `m4g_settings_init`'s "not found, use default" fallback.
    pub fn load(&self, settings: &mut RuntimeSettings) -> anyhow::Result<()> {
        for meta in all_metadata() {
            let key = nvs_key(meta.id);
            match self.nvs.get_u32(&key)? {
                Some(value) => {
                    if settings.set(meta.id, value).is_err() {
                        log::warn!(
                            "settings: stored value for {:?} out of range, keeping default",
                            meta.id
                        );
                    }
                }
                None => log::debug!("settings: {:?} not in NVS, using default", meta.id),
            }
        }
        Ok(())
    }

    /// Writes every current setting value to NVS and commits the write.
    /// CAUTION: NVS endurance is roughly 100k writes per key; callers
    /// should only invoke this on an explicit user save, never per change.
    pub fn commit(&mut self, settings: &RuntimeSettings) -> anyhow::Result<()> {
        for meta in all_metadata() {
            let key = nvs_key(meta.id);
            self.nvs.set_u32(&key, settings.get(meta.id))?;
        }
        log::info!("settings: committed to NVS");
        Ok(())
    }

    /// Resets `settings` to defaults in RAM, and if `erase` is set also
    /// removes every persisted key from NVS.
    pub fn reset_to_defaults(&mut self, settings: &mut RuntimeSettings, erase: bool) -> anyhow::Result<()> {
        settings.reset_to_defaults();
        if erase {
            for meta in all_metadata() {
                let key = nvs_key(meta.id);
                if self.nvs.contains(&key)? {
                    self.nvs.remove(&key)?;
                }
            }
            log::warn!("settings: erased persisted NVS entries");
        }
        Ok(())
    }
}
