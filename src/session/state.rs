use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::SessionError;

/// Handle to one conversation's stored values.
///
/// Cloning is cheap and every clone sees the same data. Only JSON values
/// cross this boundary; typed access goes through [`Session::get_as`] and
/// [`Session::set_as`].
#[derive(Clone)]
pub struct Session {
    id: String,
    data: Arc<DashMap<String, Value>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_parts(id, Arc::new(DashMap::new()))
    }

    pub(crate) fn from_parts(id: impl Into<String>, data: Arc<DashMap<String, Value>>) -> Self {
        Self { id: id.into(), data }
    }

    pub(crate) fn data(&self) -> Arc<DashMap<String, Value>> {
        Arc::clone(&self.data)
    }

    /// The derived session key this handle is scoped to.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|v| v.value().clone())
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| SessionError::Serialization {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Stores `value` under `key` and hands it back.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Value {
        self.data.insert(key.into(), value.clone());
        value
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value).map_err(|source| SessionError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn delete(&self, key: &str) {
        self.data.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// True while anything is stored.
    pub fn exists(&self) -> bool {
        !self.data.is_empty()
    }

    /// Drops every stored value.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Ends the conversation. The store removes the entry when the request
    /// finishes unless something is written again before then.
    pub fn destroy(&self) {
        self.clear();
    }

    pub fn all(&self) -> Vec<(String, Value)> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("keys", &self.data.len())
            .finish()
    }
}
