use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A JSON-Schema fragment restricted to the shape an Elicitation can carry:
/// `type:"object"` with named properties and a required list. Properties
/// are refined in place by the Schema Refiner (`x-ui-*` hints) while
/// validation semantics are preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl RequestedSchema {
    pub fn object() -> Self {
        Self {
            kind: "object".into(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

/// A single property within a `RequestedSchema`. Extra keys the Refiner
/// writes (`x-ui-order`, `x-ui-widget`, `format`) live alongside the
/// standard JSON-Schema keys the validator cares about.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Property {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(rename = "x-ui-order", default, skip_serializing_if = "Option::is_none")]
    pub x_ui_order: Option<u32>,
    #[serde(rename = "x-ui-widget", default, skip_serializing_if = "Option::is_none")]
    pub x_ui_widget: Option<String>,
}

/// A single named preset the Schema Refiner can apply. `match_fields` is
/// the exact unordered field-set that makes the preset applicable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub match_fields: Vec<String>,
    pub fields: Vec<PresetField>,
}

/// A single field override within a preset. All keys except `name` are
/// merged into the matching property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "x-ui-widget", default, skip_serializing_if = "Option::is_none")]
    pub x_ui_widget: Option<String>,
    #[serde(rename = "x-ui-order", default, skip_serializing_if = "Option::is_none")]
    pub x_ui_order: Option<u32>,
}
