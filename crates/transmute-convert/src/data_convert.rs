//! Structured data adapter
//!
//! Converts between csv, json, and yaml. json <-> yaml preserves nested
//! structure; csv conversions go through a flat array-of-objects
//! representation, so json -> csv requires an array of objects.

use async_trait::async_trait;
use std::collections::BTreeSet;

use serde_json::{Map, Value};

use transmute_core::Format;

use crate::converter::{format_set, ConvertError, ConvertRequest, Converter};

const FORMATS: &[&str] = &["csv", "json", "yaml"];

pub struct DataConverter;

impl DataConverter {
    pub fn new() -> Self {
        Self
    }

    fn parse(data: &[u8], format: &Format) -> Result<Value, ConvertError> {
        match format.as_str() {
            "json" => serde_json::from_slice(data)
                .map_err(|e| ConvertError::CorruptInput(format!("Invalid JSON: {}", e))),
            "yaml" => serde_yaml::from_slice(data)
                .map_err(|e| ConvertError::CorruptInput(format!("Invalid YAML: {}", e))),
            "csv" => Self::parse_csv(data),
            other => Err(ConvertError::Unsupported {
                converter: "data",
                input: other.to_string(),
                output: String::new(),
            }),
        }
    }

    fn parse_csv(data: &[u8]) -> Result<Value, ConvertError> {
        let mut reader = csv::Reader::from_reader(data);
        let headers = reader
            .headers()
            .map_err(|e| ConvertError::CorruptInput(format!("Invalid CSV: {}", e)))?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| ConvertError::CorruptInput(format!("Invalid CSV: {}", e)))?;
            let mut row = Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                row.insert(header.to_string(), Value::String(field.to_string()));
            }
            rows.push(Value::Object(row));
        }

        Ok(Value::Array(rows))
    }

    fn render(value: &Value, format: &Format) -> Result<Vec<u8>, ConvertError> {
        match format.as_str() {
            "json" => serde_json::to_vec_pretty(value)
                .map_err(|e| ConvertError::Failed(format!("JSON encoding failed: {}", e))),
            "yaml" => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| ConvertError::Failed(format!("YAML encoding failed: {}", e))),
            "csv" => Self::render_csv(value),
            other => Err(ConvertError::Unsupported {
                converter: "data",
                input: String::new(),
                output: other.to_string(),
            }),
        }
    }

    fn render_csv(value: &Value) -> Result<Vec<u8>, ConvertError> {
        let Value::Array(rows) = value else {
            return Err(ConvertError::CorruptInput(
                "CSV output requires an array of objects".to_string(),
            ));
        };

        // Header order: keys in first-seen order across all rows.
        let mut headers: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(obj) = row else {
                return Err(ConvertError::CorruptInput(
                    "CSV output requires every array element to be an object".to_string(),
                ));
            };
            for key in obj.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
            objects.push(obj);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&headers)
            .map_err(|e| ConvertError::Failed(format!("CSV encoding failed: {}", e)))?;

        for obj in objects {
            let record: Vec<String> = headers
                .iter()
                .map(|h| match obj.get(h) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| ConvertError::Failed(format!("CSV encoding failed: {}", e)))?;
        }

        writer
            .into_inner()
            .map_err(|e| ConvertError::Failed(format!("CSV encoding failed: {}", e)))
    }
}

impl Default for DataConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for DataConverter {
    fn name(&self) -> &'static str {
        "data"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        format_set(FORMATS)
    }

    fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
        let mut outputs = format_set(FORMATS);
        outputs.remove(input);
        outputs
    }

    async fn convert(
        &self,
        data: &[u8],
        request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        let value = Self::parse(data, &request.input)?;
        Self::render(&value, &request.output)
    }
}
