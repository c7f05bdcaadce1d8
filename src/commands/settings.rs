use crate::config::{mask_secret, API_KEY_SETTING, ASSISTANT_ID_SETTING, BASE_URL_SETTING};
use crate::db::Database;
use std::collections::BTreeMap;

const SETTING_KEYS: &[&str] = &[API_KEY_SETTING, ASSISTANT_ID_SETTING, BASE_URL_SETTING];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub fn get_settings(db: &Database) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            // Mask API keys for display
            if key.ends_with("_api_key") {
                map.insert(key.to_string(), mask_secret(&value));
            } else {
                map.insert(key.to_string(), value);
            }
        }
    }
    Ok(map)
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), SettingsError> {
    check_key(key)?;
    db.set_setting(key, value.trim())?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<(), SettingsError> {
    check_key(key)?;
    db.delete_setting(key)?;
    Ok(())
}

fn check_key(key: &str) -> Result<(), SettingsError> {
    if SETTING_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(SettingsError::UnknownKey(key.to_string()))
    }
}
