//! In-process session value.

use serde_json::{Map, Value};

/// Session data handed to loaders and actions.
///
/// Flash values live next to normal values under a reserved key and are
/// removed the first time they are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
}

fn flash_key(key: &str) -> String {
    format!("__flash_{key}__")
}

impl Session {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Storage id; empty until an id-backed store first commits it.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw data, including pending flash entries.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.data.contains_key(&flash_key(key))
    }

    /// Read a value. A flashed value is returned once and then removed.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value.clone());
        }
        self.data.remove(&flash_key(key))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Store a value that survives exactly one read.
    pub fn flash(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(flash_key(key), value.into());
    }

    pub fn unset(&mut self, key: &str) {
        self.data.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flash_read_once() {
        let mut session = Session::default();
        session.set("a", 1);
        session.flash("b", 2);

        assert!(session.has("b"));
        assert_eq!(session.get("b"), Some(json!(2)));
        assert!(!session.has("b"));
        assert_eq!(session.get("b"), None);

        assert!(session.has("a"));
        assert_eq!(session.get("a"), Some(json!(1)));
        assert_eq!(session.get("a"), Some(json!(1)));
    }

    #[test]
    fn test_normal_value_shadows_flash() {
        let mut session = Session::default();
        session.set("msg", "kept");
        session.flash("msg", "flashed");
        assert_eq!(session.get("msg"), Some(json!("kept")));
        session.unset("msg");
        assert_eq!(session.get("msg"), Some(json!("flashed")));
        assert!(!session.has("msg"));
    }
}
