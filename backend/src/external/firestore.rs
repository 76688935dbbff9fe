//! Cloud Firestore REST client
//!
//! Talks to the Firestore v1 REST API. Documents are plain JSON objects on our
//! side and are converted to and from Firestore's typed value encoding
//! (`{"stringValue": ...}`, `{"doubleValue": ...}`, ...) at this boundary.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::store::{DocumentQuery, DocumentStore, SortDirection, StoreError};
use crate::config::StoreConfig;

/// Firestore-backed document store
#[derive(Clone)]
pub struct FirestoreStore {
    http_client: Client,
    documents_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

/// One element of a `runQuery` response stream
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    /// Create a store for the project named in the configuration
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let project_id = config.project_id.as_deref().ok_or_else(|| {
            StoreError::Request("store.project_id is not configured".to_string())
        })?;

        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.base_url.trim_end_matches('/'),
                project_id
            ),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn add(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let body = encode_document(&document)?;

        let created = self.send(self.http_client.post(&url).json(&body)).await?;
        let name = created
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("created document has no name".to_string()))?;

        Ok(document_id(name).to_string())
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = structured_query(query)?;

        let raw = self.send(self.http_client.post(&url).json(&body)).await?;
        let items: Vec<RunQueryItem> =
            serde_json::from_value(raw).map_err(|e| StoreError::Decode(e.to_string()))?;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|doc| {
                tracing::trace!(document = %doc.name, "decoded firestore document");
                decode_fields(doc.fields)
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

/// Last path segment of a document resource name
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Build the `runQuery` request body for a query
fn structured_query(query: &DocumentQuery) -> Result<Value, StoreError> {
    let direction = match query.direction {
        SortDirection::Ascending => "ASCENDING",
        SortDirection::Descending => "DESCENDING",
    };

    let mut structured = json!({
        "from": [{ "collectionId": query.collection }],
        "orderBy": [{
            "field": { "fieldPath": query.order_by },
            "direction": direction,
        }],
    });

    if let Some(bound) = &query.start_at {
        structured["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": query.order_by },
                "op": "GREATER_THAN_OR_EQUAL",
                "value": encode_value(bound),
            }
        });
    }
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    Ok(json!({ "structuredQuery": structured }))
}

/// Encode a JSON object as a Firestore document body
pub fn encode_document(document: &Value) -> Result<Value, StoreError> {
    let fields = document.as_object().ok_or_else(|| {
        StoreError::Unsupported("documents must be JSON objects".to_string())
    })?;

    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();

    Ok(json!({ "fields": encoded }))
}

/// Encode one JSON value as a Firestore typed value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => {
            let encoded: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect();
            json!({ "mapValue": { "fields": encoded } })
        }
    }
}

/// Decode a Firestore `fields` map into a plain JSON object
pub fn decode_fields(fields: Map<String, Value>) -> Result<Value, StoreError> {
    let decoded = fields
        .into_iter()
        .map(|(key, value)| decode_value(&value).map(|v| (key, v)))
        .collect::<Result<Map<String, Value>, StoreError>>()?;
    Ok(Value::Object(decoded))
}

/// Decode one Firestore typed value
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let typed = value
        .as_object()
        .and_then(|o| o.iter().next())
        .map(|(kind, inner)| (kind.as_str(), inner))
        .ok_or_else(|| StoreError::Decode(format!("not a typed value: {}", value)))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", b) => Ok(b.clone()),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| StoreError::Decode(format!("integerValue '{}': {}", s, e))),
        ("integerValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::Number(n)) => Ok(Value::Number(n.clone())),
        ("doubleValue", Value::String(s)) => Err(StoreError::Unsupported(format!(
            "non-finite doubleValue '{}'",
            s
        ))),
        ("stringValue" | "timestampValue" | "referenceValue" | "bytesValue", s) => Ok(s.clone()),
        ("geoPointValue", point) => Ok(point.clone()),
        ("arrayValue", array) => {
            let values = array
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        ("mapValue", map) => {
            let fields = map
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            decode_fields(fields)
        }
        (kind, _) => Err(StoreError::Unsupported(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreBackend, StoreConfig};

    fn config() -> StoreConfig {
        StoreConfig {
            backend: StoreBackend::Firestore,
            base_url: "https://firestore.googleapis.com/v1/".to_string(),
            project_id: Some("harvesta".to_string()),
            api_key: None,
            access_token: None,
            collection: "growth_rates".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_documents_url() {
        let store = FirestoreStore::new(&config()).unwrap();
        assert_eq!(
            store.documents_url,
            "https://firestore.googleapis.com/v1/projects/harvesta/databases/(default)/documents"
        );
    }

    #[test]
    fn test_missing_project_is_error() {
        let mut config = config();
        config.project_id = None;
        assert!(FirestoreStore::new(&config).is_err());
    }

    #[test]
    fn test_encode_record() {
        let encoded = encode_document(&json!({
            "date": "2025-03-01T00:00:00.000000Z",
            "ripe_percentage": 42.5,
            "count": 3,
            "harvest_time_days": null,
        }))
        .unwrap();

        assert_eq!(encoded["fields"]["date"]["stringValue"], "2025-03-01T00:00:00.000000Z");
        assert_eq!(encoded["fields"]["ripe_percentage"]["doubleValue"], 42.5);
        assert_eq!(encoded["fields"]["count"]["integerValue"], "3");
        assert!(encoded["fields"]["harvest_time_days"]["nullValue"].is_null());
    }

    #[test]
    fn test_encode_rejects_scalars() {
        assert!(encode_document(&json!("nope")).is_err());
    }

    #[test]
    fn test_decode_nested_values() {
        let fields = json!({
            "growth_speed_ripe": { "integerValue": "5" },
            "ripe_percentage": { "doubleValue": 61.25 },
            "date": { "timestampValue": "2025-03-01T00:00:00Z" },
            "tags": { "arrayValue": { "values": [{ "stringValue": "greenhouse" }] } },
            "empty": { "arrayValue": {} },
            "meta": { "mapValue": { "fields": { "ok": { "booleanValue": true } } } },
        });
        let decoded = decode_fields(fields.as_object().unwrap().clone()).unwrap();

        assert_eq!(decoded["growth_speed_ripe"], 5);
        assert_eq!(decoded["ripe_percentage"], 61.25);
        assert_eq!(decoded["date"], "2025-03-01T00:00:00Z");
        assert_eq!(decoded["tags"][0], "greenhouse");
        assert_eq!(decoded["empty"], json!([]));
        assert_eq!(decoded["meta"]["ok"], true);
    }

    #[test]
    fn test_decode_unknown_kind() {
        assert!(decode_value(&json!({ "fancyValue": 1 })).is_err());
        assert!(decode_value(&json!({ "doubleValue": "NaN" })).is_err());
    }

    #[test]
    fn test_structured_query_range() {
        let query = DocumentQuery::new("growth_rates", "date").start_at("2025-03-01");
        let body = structured_query(&query).unwrap();
        let sq = &body["structuredQuery"];

        assert_eq!(sq["from"][0]["collectionId"], "growth_rates");
        assert_eq!(sq["orderBy"][0]["direction"], "ASCENDING");
        assert_eq!(sq["where"]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(sq["where"]["fieldFilter"]["value"]["stringValue"], "2025-03-01");
        assert!(sq.get("limit").is_none());
    }

    #[test]
    fn test_structured_query_latest() {
        let query = DocumentQuery::new("growth_rates", "date").descending().limit(1);
        let body = structured_query(&query).unwrap();
        assert_eq!(body["structuredQuery"]["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(body["structuredQuery"]["limit"], 1);
        assert!(body["structuredQuery"].get("where").is_none());
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/growth_rates/abc123"),
            "abc123"
        );
    }
}
