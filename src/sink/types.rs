//! Wire types of the push-dataset API
use serde::{Deserialize, Serialize};

use crate::formats::RowRecord;
use crate::schema::{DetectedSchema, DetectedType};

/// Column data types understood by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkDataType {
    Int64,
    Double,
    DateTime,
    Boolean,
    String,
}

impl From<DetectedType> for SinkDataType {
    fn from(value: DetectedType) -> Self {
        match value {
            DetectedType::Integer => SinkDataType::Int64,
            DetectedType::Double => SinkDataType::Double,
            DetectedType::DateTime => SinkDataType::DateTime,
            DetectedType::Boolean => SinkDataType::Boolean,
            DetectedType::String => SinkDataType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkColumn {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: SinkDataType,
}

#[derive(Debug, Clone, Serialize)]
pub struct SinkTable {
    pub name: String,
    pub columns: Vec<SinkColumn>,
}

/// Body of a dataset creation request
#[derive(Debug, Clone, Serialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    pub tables: Vec<SinkTable>,
    #[serde(rename = "defaultMode")]
    pub default_mode: &'static str,
}

impl CreateDatasetRequest {
    /// A push dataset with one table whose columns follow `schema` order
    pub fn push(name: &str, table: &str, schema: &DetectedSchema) -> Self {
        let columns = schema
            .iter()
            .map(|(column, detected)| SinkColumn {
                name: column.clone(),
                data_type: (*detected).into(),
            })
            .collect();

        Self {
            name: name.to_string(),
            tables: vec![SinkTable {
                name: table.to_string(),
                columns,
            }],
            default_mode: "Push",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDatasetResponse {
    pub id: Option<String>,
}

/// Body of a row push. Values go out as the raw strings from the file.
#[derive(Debug, Serialize)]
pub struct PushRowsRequest<'a> {
    pub rows: &'a [RowRecord],
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_mapping() {
        let test_cases = [
            (DetectedType::Integer, SinkDataType::Int64),
            (DetectedType::Double, SinkDataType::Double),
            (DetectedType::DateTime, SinkDataType::DateTime),
            (DetectedType::Boolean, SinkDataType::Boolean),
            (DetectedType::String, SinkDataType::String),
        ];
        for (detected, expected) in test_cases {
            assert_eq!(SinkDataType::from(detected), expected);
        }
    }

    #[test]
    fn test_create_dataset_body() {
        let schema = DetectedSchema::from([
            ("qty".to_string(), DetectedType::Integer),
            ("when".to_string(), DetectedType::DateTime),
        ]);
        let body = serde_json::to_value(CreateDatasetRequest::push("ds", "Data", &schema)).unwrap();

        assert_eq!(
            body,
            json!({
                "name": "ds",
                "tables": [{
                    "name": "Data",
                    "columns": [
                        {"name": "qty", "dataType": "Int64"},
                        {"name": "when", "dataType": "DateTime"}
                    ]
                }],
                "defaultMode": "Push"
            })
        );
    }

    #[test]
    fn test_push_rows_body_keeps_raw_strings() {
        let rows = vec![RowRecord::from([
            ("qty".to_string(), "0042".to_string()),
            ("name".to_string(), "Widget".to_string()),
        ])];
        let body = serde_json::to_string(&PushRowsRequest { rows: &rows }).unwrap();
        assert_eq!(body, r#"{"rows":[{"qty":"0042","name":"Widget"}]}"#);
    }
}
