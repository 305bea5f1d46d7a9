use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CodecError;

/// Free-form per-sync options. Each codec validates the keys it understands
/// when it is built from a config.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncConfig(BTreeMap<String, String>);

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rejects any key outside `allowed`.
    pub fn ensure_keys(&self, allowed: &[&str]) -> Result<(), CodecError> {
        match self.0.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(CodecError::UnknownOption(key.clone())),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SyncConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Host mode name to a bemfa integer, e.g. `auto:0,low:1,high:2`.
///
/// Keeps insertion order so reverse lookups pick the first mode mapped to a
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupTable<V> {
    entries: Vec<(String, V)>,
}

impl<V: PartialEq + Copy> LookupTable<V> {
    pub fn parse(
        key: &str,
        raw: &str,
        value: impl Fn(&str) -> Option<V>,
    ) -> Result<Self, CodecError> {
        let mut entries = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (mode, encoded) = entry
                .split_once(':')
                .map(|(m, v)| (m.trim(), v.trim()))
                .filter(|(m, _)| !m.is_empty())
                .ok_or_else(|| {
                    CodecError::InvalidOption(format!("{}: expected mode:value, got '{}'", key, entry))
                })?;
            let encoded = value(encoded).ok_or_else(|| {
                CodecError::InvalidOption(format!("{}: bad value in '{}'", key, entry))
            })?;
            entries.push((mode.to_string(), encoded));
        }
        Ok(Self { entries })
    }

    pub fn encode(&self, mode: &str) -> Option<V> {
        self.entries
            .iter()
            .find(|(m, _)| m == mode)
            .map(|(_, v)| *v)
    }

    pub fn decode(&self, value: V) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(m, _)| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(raw: &str) -> Option<i64> {
        raw.parse().ok()
    }

    #[test]
    fn lookup_table_maps_both_ways() {
        let table = LookupTable::parse("fan_modes", "auto:0, low:1,high:2", int).unwrap();
        assert_eq!(table.encode("low"), Some(1));
        assert_eq!(table.decode(2), Some("high"));
        assert_eq!(table.decode(7), None);
    }

    #[test]
    fn lookup_table_rejects_malformed_entries() {
        assert!(matches!(
            LookupTable::parse("fan_modes", "auto", int),
            Err(CodecError::InvalidOption(_))
        ));
        assert!(matches!(
            LookupTable::parse("fan_modes", "auto:x", int),
            Err(CodecError::InvalidOption(_))
        ));
    }

    #[test]
    fn ensure_keys_reports_the_first_unknown_key() {
        let config = SyncConfig::new().with("fan_modes", "auto:0").with("colour", "red");
        assert!(matches!(
            config.ensure_keys(&["fan_modes"]),
            Err(CodecError::UnknownOption(key)) if key == "colour"
        ));
    }
}
