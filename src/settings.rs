//! Server settings snapshots and the diff between shipped defaults and the
//! live file.
//!
//! Both files carry a single `OptionSettings=(...)` line whose body is a
//! comma-separated `key=value` list. Values may be quoted, and a quoted value
//! may contain commas.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AdminError, Result};

pub const OPTION_MARKER: &str = "OptionSettings=";
pub const SENSITIVE_KEY: &str = "AdminPassword";
pub const MASK: &str = "****";

/// Settings in file order. Later duplicates overwrite earlier values in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: Vec<(String, String)>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        for (k, v) in iter {
            snapshot.insert(k.into(), v.into());
        }
        snapshot
    }
}

/// Active settings that differ from the defaults, already masked.
pub type ConfigDiff = ConfigSnapshot;

/// Parse the text of a settings file. `None` when the marker line is absent.
pub fn parse_option_settings(text: &str) -> Option<ConfigSnapshot> {
    let line = text.lines().find(|line| line.contains(OPTION_MARKER))?;
    let (_, body) = line.split_once(OPTION_MARKER)?;
    let body = body
        .trim()
        .trim_matches(|c| c == '(' || c == ')' || c == '\r' || c == '\n');

    let mut snapshot = ConfigSnapshot::default();
    for field in split_fields(body) {
        let (key, value) = match field.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim().trim_matches('"')),
            None => (field.trim(), ""),
        };
        if key.is_empty() {
            continue;
        }
        snapshot.insert(key.to_string(), value.to_string());
    }
    Some(snapshot)
}

/// Split on commas outside double quotes.
fn split_fields(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&body[start..]);
    fields
}

pub fn load_snapshot(path: &Path) -> Result<ConfigSnapshot> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AdminError::ResourceNotFound {
                what: "settings file",
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    parse_option_settings(&text).ok_or_else(|| AdminError::ConfigFormat {
        path: path.to_path_buf(),
        reason: format!("no line containing '{}'", OPTION_MARKER),
    })
}

/// Every active key whose value is absent from or different in the defaults.
/// Keys only present in the defaults are not reported.
pub fn diff(defaults: &ConfigSnapshot, active: &ConfigSnapshot) -> ConfigDiff {
    let baseline: HashMap<&str, &str> = defaults.iter().collect();
    active
        .iter()
        .filter(|(key, value)| baseline.get(key) != Some(value))
        .map(|(key, value)| {
            if key == SENSITIVE_KEY {
                (key, MASK)
            } else {
                (key, value)
            }
        })
        .collect()
}

/// Two aligned columns: `Setting | Value`.
pub fn render_table(diff: &ConfigDiff) -> String {
    let key_width = diff
        .iter()
        .map(|(k, _)| k.chars().count())
        .chain(std::iter::once("Setting".len()))
        .max()
        .unwrap_or(0);
    let value_width = diff
        .iter()
        .map(|(_, v)| v.chars().count())
        .chain(std::iter::once("Value".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<kw$} | {:<vw$}\n{} | {}\n",
        "Setting",
        "Value",
        "-".repeat(key_width),
        "-".repeat(value_width),
        kw = key_width,
        vw = value_width,
    );
    for (key, value) in diff.iter() {
        out.push_str(&format!(
            "{:<kw$} | {:<vw$}\n",
            key,
            value,
            kw = key_width,
            vw = value_width
        ));
    }
    out
}
