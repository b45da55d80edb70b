//! User-managed allow-list of Bluetooth service-class UUIDs.
//!
//! Entries are stored in canonical lowercase form under the
//! `bluetooth_uuids` key of the settings store. Short 16/32-bit forms such as
//! `0x1101` are expanded onto the Bluetooth base UUID.

use crate::config::ConfigResult;
use crate::prompt::{Outcome, Prompter};
use crate::store::{SettingsStore, SettingsStoreExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Settings key holding the list.
pub const STORE_KEY: &str = "bluetooth_uuids";

/// Pattern offered to the prompt: a full UUID or a short hex form.
pub const VALIDATION_PATTERN: &str =
    r"^([0-9a-fA-F]{8}(-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}|(0x)?[0-9a-fA-F]{1,8})$";

const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

static SHORT_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0x)?([0-9a-f]{1,8})$").expect("Invalid SHORT_FORM regex"));

static CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("Invalid CANONICAL regex")
});

/// Turn user input into a canonical UUID string, if it is one.
///
/// ```
/// use serial_console::allowlist::normalize;
///
/// assert_eq!(
///     normalize(" 0x0003 ").as_deref(),
///     Some("00030000-0000-1000-8000-00805f9b34fb")
/// );
/// assert_eq!(normalize("not-a-uuid"), None);
/// ```
pub fn normalize(input: &str) -> Option<String> {
    let lowered = input.trim().to_ascii_lowercase();
    let candidate = match SHORT_FORM.captures(&lowered) {
        Some(caps) => format!("{:0<8}{BASE_UUID_SUFFIX}", &caps[2]),
        None => lowered,
    };

    if !CANONICAL.is_match(&candidate) {
        return None;
    }
    // Formatting through the uuid crate keeps the canonical hyphenated form.
    Uuid::parse_str(&candidate)
        .ok()
        .map(|uuid| uuid.hyphenated().to_string())
}

/// Result of an add attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    Added(String),
    Duplicate(String),
    Invalid,
}

/// The allow-list, backed by a settings store.
pub struct BluetoothAllowList {
    store: Arc<dyn SettingsStore>,
    uuids: Vec<String>,
}

impl BluetoothAllowList {
    /// Load the list, dropping invalid entries and duplicates.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let stored: Vec<String> = store.get(STORE_KEY);
        let mut uuids: Vec<String> = stored
            .iter()
            .filter_map(|entry| {
                let normalized = normalize(entry);
                if normalized.is_none() {
                    warn!(entry = %entry, "dropping invalid stored Bluetooth UUID");
                }
                normalized
            })
            .collect();
        uuids.sort();
        uuids.dedup();
        debug!(count = uuids.len(), "loaded Bluetooth allow-list");
        Self { store, uuids }
    }

    pub fn uuids(&self) -> &[String] {
        &self.uuids
    }

    pub fn contains(&self, uuid: &str) -> bool {
        normalize(uuid).is_some_and(|u| self.uuids.contains(&u))
    }

    /// Add an entry and persist the list.
    pub fn add(&mut self, input: &str) -> ConfigResult<AddResult> {
        let Some(uuid) = normalize(input) else {
            return Ok(AddResult::Invalid);
        };
        if self.uuids.contains(&uuid) {
            return Ok(AddResult::Duplicate(uuid));
        }
        self.uuids.push(uuid.clone());
        self.uuids.sort();
        self.save()?;
        Ok(AddResult::Added(uuid))
    }

    /// Ask the user for an entry and add it.
    pub fn add_interactive(&mut self, prompter: &dyn Prompter) -> ConfigResult<Outcome<AddResult>> {
        match prompter.prompt_user("Bluetooth service class UUID", VALIDATION_PATTERN) {
            Outcome::Value(input) => self.add(&input).map(Outcome::Value),
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&mut self, uuid: &str) -> ConfigResult<bool> {
        let Some(uuid) = normalize(uuid) else {
            return Ok(false);
        };
        let before = self.uuids.len();
        self.uuids.retain(|u| *u != uuid);
        if self.uuids.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> ConfigResult<()> {
        self.store.set(STORE_KEY, &self.uuids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use crate::store::MemorySettingsStore;

    fn empty() -> (Arc<MemorySettingsStore>, BluetoothAllowList) {
        let store = Arc::new(MemorySettingsStore::new());
        let list = BluetoothAllowList::load(store.clone());
        (store, list)
    }

    #[test]
    fn test_normalize_short_forms() {
        assert_eq!(
            normalize("0x1101").unwrap(),
            "11010000-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            normalize("ABCD").unwrap(),
            "abcd0000-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            normalize("12345678").unwrap(),
            "12345678-0000-1000-8000-00805f9b34fb"
        );
        assert!(normalize("0x123456789").is_none());
        assert!(normalize("").is_none());
    }

    #[test]
    fn test_normalize_full_uuid() {
        assert_eq!(
            normalize("0000110A-0000-1000-8000-00805F9B34FB").unwrap(),
            "0000110a-0000-1000-8000-00805f9b34fb"
        );
        assert!(normalize("0000110a00001000800000805f9b34fb").is_none());
    }

    #[test]
    fn test_add_and_duplicate() {
        let (store, mut list) = empty();
        assert!(matches!(list.add("0x0003").unwrap(), AddResult::Added(_)));
        assert!(matches!(list.add("0003").unwrap(), AddResult::Duplicate(_)));
        assert_eq!(list.add("zz").unwrap(), AddResult::Invalid);

        let stored: Vec<String> = store.get(STORE_KEY);
        assert_eq!(stored, vec!["00030000-0000-1000-8000-00805f9b34fb".to_string()]);
    }

    #[test]
    fn test_load_cleans_stored_entries() {
        let store = Arc::new(MemorySettingsStore::new());
        store
            .set(
                STORE_KEY,
                &vec![
                    "garbage",
                    "0000110A-0000-1000-8000-00805F9B34FB",
                    "0000110a-0000-1000-8000-00805f9b34fb",
                    "00000001-0000-1000-8000-00805f9b34fb",
                ],
            )
            .unwrap();

        let list = BluetoothAllowList::load(store);
        assert_eq!(
            list.uuids(),
            &[
                "00000001-0000-1000-8000-00805f9b34fb".to_string(),
                "0000110a-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
    }

    #[test]
    fn test_remove() {
        let (_store, mut list) = empty();
        list.add("0x0003").unwrap();
        assert!(list.remove("0x0003").unwrap());
        assert!(!list.remove("0x0003").unwrap());
        assert!(list.uuids().is_empty());
    }

    #[test]
    fn test_add_interactive() {
        let (_store, mut list) = empty();
        let prompter = ScriptedPrompter::new([Some("0x1101")]);
        let outcome = list.add_interactive(&prompter).unwrap();
        assert!(matches!(outcome, Outcome::Value(AddResult::Added(_))));
        assert!(list.contains("1101"));

        let cancelled = ScriptedPrompter::new([None::<&str>]);
        assert!(list.add_interactive(&cancelled).unwrap().is_cancelled());
    }
}
