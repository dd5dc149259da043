use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::error::StoreError;

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
const TIMESTAMP: &str = "Timestamp";

/// Table Storage Entity
///
/// Properties are carried as the raw JSON object returned by the service,
/// including `<name>@odata.type` annotations, so typed values survive a
/// copy untouched. `PartitionKey` and `RowKey` are guaranteed to be present
/// as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Entity {
    properties: Map<String, Value>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        let mut properties = Map::new();
        properties.insert(PARTITION_KEY.to_string(), Value::String(partition_key.into()));
        properties.insert(ROW_KEY.to_string(), Value::String(row_key.into()));
        Self { properties }
    }

    /// Builder-style property setter, mostly for fixtures
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn partition_key(&self) -> &str {
        self.key(PARTITION_KEY)
    }

    pub fn row_key(&self) -> &str {
        self.key(ROW_KEY)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Payload for a write: everything except the properties the service
    /// maintains itself (`odata.*` metadata and `Timestamp`)
    pub fn to_write_payload(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter(|(name, _)| !is_service_property(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn key(&self, name: &str) -> &str {
        // presence is checked in TryFrom
        self.properties
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn is_service_property(name: &str) -> bool {
    name.starts_with("odata.")
        || name == TIMESTAMP
        || name
            .strip_prefix(TIMESTAMP)
            .is_some_and(|rest| rest.starts_with('@'))
}

impl TryFrom<Map<String, Value>> for Entity {
    type Error = StoreError;

    fn try_from(properties: Map<String, Value>) -> Result<Self, Self::Error> {
        for key in [PARTITION_KEY, ROW_KEY] {
            match properties.get(key) {
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(StoreError::Entity(format!(
                        "{} must be a string, got {}",
                        key, other
                    )))
                }
                None => return Err(StoreError::Entity(format!("missing {}", key))),
            }
        }

        Ok(Self { properties })
    }
}

impl From<Entity> for Map<String, Value> {
    fn from(entity: Entity) -> Self {
        entity.properties
    }
}

/// Page of entities from a query, with the continuation for the next one
#[derive(Debug, Default)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub continuation: Option<Continuation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub value: Vec<Entity>,
}

/// Error payload returned by the service for failed requests
#[derive(Debug, Deserialize)]
pub(crate) struct ODataErrorResponse {
    #[serde(rename = "odata.error")]
    pub error: ODataError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ODataError {
    pub code: String,
    pub message: ODataMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ODataMessage {
    pub value: String,
}

impl ODataErrorResponse {
    /// Extract `(code, message)` from an error body, if it is one
    pub fn parse(body: &str) -> Option<(String, String)> {
        serde_json::from_str::<Self>(body.trim())
            .ok()
            .map(|r| (r.error.code, r.error.message.value))
    }
}

/// Result of trying to create a table
#[derive(Debug)]
pub enum TableProvisioning {
    Created,
    AlreadyExists,
    Failed(StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_keys() {
        let entity = Entity::new("2024-01", "photo-42").with_property("Size", 1024);

        assert_eq!(entity.partition_key(), "2024-01");
        assert_eq!(entity.row_key(), "photo-42");
        assert_eq!(entity.get("Size"), Some(&json!(1024)));
    }

    #[test]
    fn test_entity_requires_keys() {
        let missing_row_key: Result<Entity, _> =
            serde_json::from_value(json!({ "PartitionKey": "a" }));
        assert!(missing_row_key.is_err());

        let numeric_key: Result<Entity, _> =
            serde_json::from_value(json!({ "PartitionKey": 1, "RowKey": "r" }));
        assert!(numeric_key.is_err());
    }

    #[test]
    fn test_write_payload_strips_service_properties() {
        let entity: Entity = serde_json::from_value(json!({
            "odata.etag": "W/\"datetime'2024-01-01T00%3A00%3A00Z'\"",
            "PartitionKey": "a",
            "RowKey": "1",
            "Timestamp": "2024-01-01T00:00:00Z",
            "Timestamp@odata.type": "Edm.DateTime",
            "TakenAt@odata.type": "Edm.DateTime",
            "TakenAt": "2023-06-01T12:00:00Z",
            "Bytes@odata.type": "Edm.Int64",
            "Bytes": "5000000000"
        }))
        .unwrap();

        let payload = entity.to_write_payload();

        assert!(!payload.contains_key("odata.etag"));
        assert!(!payload.contains_key("Timestamp"));
        assert!(!payload.contains_key("Timestamp@odata.type"));
        assert_eq!(payload["TakenAt@odata.type"], json!("Edm.DateTime"));
        assert_eq!(payload["Bytes"], json!("5000000000"));
        assert_eq!(payload["PartitionKey"], json!("a"));
    }

    #[test]
    fn test_query_response_decodes_entities() {
        let body = json!({
            "odata.metadata": "https://acct.table.core.windows.net/$metadata#Photos",
            "value": [
                { "PartitionKey": "a", "RowKey": "1" },
                { "PartitionKey": "b", "RowKey": "2", "Name": "x" }
            ]
        });

        let response: QueryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.value.len(), 2);
        assert_eq!(response.value[1].partition_key(), "b");
    }

    #[test]
    fn test_parse_odata_error() {
        let body = r#"{"odata.error":{"code":"TableAlreadyExists","message":{"lang":"en-US","value":"The table specified already exists."}}}"#;
        let (code, message) = ODataErrorResponse::parse(body).unwrap();

        assert_eq!(code, "TableAlreadyExists");
        assert_eq!(message, "The table specified already exists.");
        assert!(ODataErrorResponse::parse("<html>bad gateway</html>").is_none());
    }
}
