use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of fan-out work. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub id: ItemId,
    /// Opaque parameters handed to the item task
    pub parameters: Map<String, Value>,
}

impl ItemDescriptor {
    pub fn new(id: impl Into<ItemId>, parameters: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            parameters,
        }
    }

    /// Build from any serializable parameter struct. Non-object values are stored
    /// under a single `value` key.
    pub fn from_params<T: Serialize>(
        id: impl Into<ItemId>,
        params: &T,
    ) -> Result<Self, serde_json::Error> {
        let parameters = match serde_json::to_value(params)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(Self::new(id, parameters))
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Deserialize the parameters back into a typed struct.
    pub fn params<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.parameters.clone()))
    }
}
