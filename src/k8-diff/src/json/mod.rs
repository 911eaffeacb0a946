mod diff;

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;

use crate::Changes;
use crate::Diff;
use crate::DiffError;

pub type JsonDiff = Diff<Value, PatchObject>;

/// field level changes between two json objects, keyed by field name
#[derive(Debug, Default)]
pub struct PatchObject(BTreeMap<String, JsonDiff>);

impl PatchObject {
    fn diff(old: &Map<String, Value>, new: &Map<String, Value>) -> Result<Self, DiffError> {
        let mut changes = BTreeMap::new();

        for (key, new_value) in new {
            match old.get(key) {
                Some(old_value) if old_value == new_value => {}
                Some(old_value) => {
                    changes.insert(key.clone(), old_value.diff(new_value)?);
                }
                None => {
                    changes.insert(key.clone(), Diff::Replace(new_value.clone()));
                }
            }
        }

        for key in old.keys() {
            if !new.contains_key(key) {
                changes.insert(key.clone(), Diff::Delete);
            }
        }

        Ok(Self(changes))
    }

    /// names of the top level fields that changed
    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|key| key.as_str())
    }
}

/// serializes as a json merge patch: deleted fields become null
impl Serialize for PatchObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, change) in &self.0 {
            match change {
                Diff::None => {}
                Diff::Delete => map.serialize_entry(key, &Value::Null)?,
                Diff::Replace(value) => map.serialize_entry(key, value)?,
                Diff::Patch(patch) => map.serialize_entry(key, patch)?,
            }
        }
        map.end()
    }
}
