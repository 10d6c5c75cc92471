use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// Default label width applied to newly created elements.
pub const DEFAULT_LABEL_WIDTH: u32 = 10;

/// Default height (px) for the embedded code editor.
pub const CODE_EDITOR_HEIGHT: u32 = 200;

/// Default row count for textarea variants.
pub const TEXTAREA_ROWS: u32 = 10;

/// Fallback id for options whose value is empty.
pub const OPTION_DEFAULT_ID: &str = "option";

/// Fallback numeric option value when text cannot be parsed.
pub const OPTION_NUMBER_DEFAULT: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    String,
    Number,
    Slider,
    Textarea,
    Code,
    Select,
    Multiselect,
    Radio,
    Disabled,
    #[serde(rename = "disabled-textarea")]
    DisabledTextarea,
    Password,
    Secret,
    Boolean,
    Datetime,
    File,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::String => "string",
            ElementType::Number => "number",
            ElementType::Slider => "slider",
            ElementType::Textarea => "textarea",
            ElementType::Code => "code",
            ElementType::Select => "select",
            ElementType::Multiselect => "multiselect",
            ElementType::Radio => "radio",
            ElementType::Disabled => "disabled",
            ElementType::DisabledTextarea => "disabled-textarea",
            ElementType::Password => "password",
            ElementType::Secret => "secret",
            ElementType::Boolean => "boolean",
            ElementType::Datetime => "datetime",
            ElementType::File => "file",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Javascript,
    Json,
}

/// Type tag for option values: controls how the raw value is parsed and how
/// the derived id is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Number,
}

/// Typed value of a selectable option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionValue {
    String {
        #[serde(default)]
        value: String,
    },
    Number {
        #[serde(default)]
        value: f64,
    },
}

impl OptionValue {
    pub fn option_type(&self) -> OptionType {
        match self {
            OptionValue::String { .. } => OptionType::String,
            OptionValue::Number { .. } => OptionType::Number,
        }
    }

    /// Id derived from the value: identity for strings, numeric
    /// stringification for numbers, with a fallback for empty strings.
    pub fn derive_id(&self) -> String {
        match self {
            OptionValue::String { value } => {
                if value.is_empty() {
                    OPTION_DEFAULT_ID.to_string()
                } else {
                    value.clone()
                }
            }
            OptionValue::Number { value } => format_number(*value),
        }
    }

    /// Coerce to the target type. Non-numeric text recovers to the numeric
    /// default rather than failing.
    pub fn convert_to(&self, target: OptionType) -> OptionValue {
        match (self, target) {
            (OptionValue::String { value }, OptionType::Number) => OptionValue::Number {
                value: value.trim().parse::<f64>().unwrap_or(OPTION_NUMBER_DEFAULT),
            },
            (OptionValue::Number { value }, OptionType::String) => OptionValue::String {
                value: format_number(*value),
            },
            (same, _) => same.clone(),
        }
    }

    pub fn as_json(&self) -> JsonValue {
        match self {
            OptionValue::String { value } => JsonValue::String(value.clone()),
            OptionValue::Number { value } => serde_json::Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
        }
    }
}

/// Integer-like floats print without a fractional part.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// One selectable choice of a select/radio/multiselect/disabled element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementOption {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub value: OptionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Default for ElementOption {
    fn default() -> Self {
        ElementOption {
            id: OPTION_DEFAULT_ID.to_string(),
            label: "Option".to_string(),
            value: OptionValue::String {
                value: String::new(),
            },
            icon: None,
        }
    }
}

/// Binary attachment carried by a file element. The payload pipeline resolves
/// the source to raw bytes when the attachment is embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub source: AttachmentSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentSource {
    Path(PathBuf),
    Inline(Vec<u8>),
}

impl Default for AttachmentSource {
    fn default() -> Self {
        AttachmentSource::Inline(Vec::new())
    }
}

impl FileAttachment {
    pub fn inline(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileAttachment {
            name: name.into(),
            mime: mime.into(),
            source: AttachmentSource::Inline(bytes),
        }
    }

    /// Resolve the attachment to raw bytes. Path-backed attachments hit the
    /// filesystem; inline ones are returned as stored.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            AttachmentSource::Inline(bytes) => Ok(bytes.clone()),
            AttachmentSource::Path(path) => std::fs::read(path),
        }
    }
}

/// Type-specific portion of an element, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypeConfig {
    String {
        #[serde(default)]
        value: String,
        #[serde(default)]
        hidden: bool,
    },
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        value: Option<f64>,
    },
    Slider {
        min: f64,
        max: f64,
        step: f64,
        #[serde(default)]
        value: f64,
    },
    Textarea {
        rows: u32,
        #[serde(default)]
        value: String,
    },
    Code {
        language: CodeLanguage,
        height: u32,
        #[serde(default)]
        value: String,
    },
    Select {
        #[serde(default)]
        options: Vec<ElementOption>,
        #[serde(default)]
        value: JsonValue,
    },
    Multiselect {
        #[serde(default)]
        options: Vec<ElementOption>,
        #[serde(default)]
        value: Vec<JsonValue>,
    },
    Radio {
        #[serde(default)]
        options: Vec<ElementOption>,
        #[serde(default)]
        value: JsonValue,
    },
    Disabled {
        #[serde(default)]
        options: Vec<ElementOption>,
        #[serde(default)]
        value: JsonValue,
    },
    #[serde(rename = "disabled-textarea")]
    DisabledTextarea {
        rows: u32,
        #[serde(default)]
        value: String,
    },
    Password {
        #[serde(default)]
        value: String,
    },
    Secret {
        #[serde(default)]
        value: String,
    },
    Boolean {
        #[serde(default)]
        value: bool,
    },
    Datetime {
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
        #[serde(default)]
        value: String,
    },
    File {
        #[serde(default)]
        accept: String,
        #[serde(default)]
        value: Vec<FileAttachment>,
    },
}

impl TypeConfig {
    pub fn element_type(&self) -> ElementType {
        match self {
            TypeConfig::String { .. } => ElementType::String,
            TypeConfig::Number { .. } => ElementType::Number,
            TypeConfig::Slider { .. } => ElementType::Slider,
            TypeConfig::Textarea { .. } => ElementType::Textarea,
            TypeConfig::Code { .. } => ElementType::Code,
            TypeConfig::Select { .. } => ElementType::Select,
            TypeConfig::Multiselect { .. } => ElementType::Multiselect,
            TypeConfig::Radio { .. } => ElementType::Radio,
            TypeConfig::Disabled { .. } => ElementType::Disabled,
            TypeConfig::DisabledTextarea { .. } => ElementType::DisabledTextarea,
            TypeConfig::Password { .. } => ElementType::Password,
            TypeConfig::Secret { .. } => ElementType::Secret,
            TypeConfig::Boolean { .. } => ElementType::Boolean,
            TypeConfig::Datetime { .. } => ElementType::Datetime,
            TypeConfig::File { .. } => ElementType::File,
        }
    }

    /// Canonical default payload for a type. Changing an element's type
    /// replaces its config with exactly this set; prior type-specific fields
    /// are discarded, never partially merged.
    pub fn defaults_for(element_type: ElementType) -> TypeConfig {
        match element_type {
            ElementType::String => TypeConfig::String {
                value: String::new(),
                hidden: false,
            },
            ElementType::Number => TypeConfig::Number {
                min: None,
                max: None,
                value: None,
            },
            ElementType::Slider => TypeConfig::Slider {
                min: 0.0,
                max: 100.0,
                step: 1.0,
                value: 0.0,
            },
            ElementType::Textarea => TypeConfig::Textarea {
                rows: TEXTAREA_ROWS,
                value: String::new(),
            },
            ElementType::Code => TypeConfig::Code {
                language: CodeLanguage::Javascript,
                height: CODE_EDITOR_HEIGHT,
                value: String::new(),
            },
            ElementType::Select => TypeConfig::Select {
                options: Vec::new(),
                value: JsonValue::Null,
            },
            ElementType::Multiselect => TypeConfig::Multiselect {
                options: Vec::new(),
                value: Vec::new(),
            },
            ElementType::Radio => TypeConfig::Radio {
                options: Vec::new(),
                value: JsonValue::Null,
            },
            ElementType::Disabled => TypeConfig::Disabled {
                options: Vec::new(),
                value: JsonValue::Null,
            },
            ElementType::DisabledTextarea => TypeConfig::DisabledTextarea {
                rows: TEXTAREA_ROWS,
                value: String::new(),
            },
            ElementType::Password => TypeConfig::Password {
                value: String::new(),
            },
            ElementType::Secret => TypeConfig::Secret {
                value: String::new(),
            },
            ElementType::Boolean => TypeConfig::Boolean { value: false },
            ElementType::Datetime => TypeConfig::Datetime {
                min: None,
                max: None,
                value: String::new(),
            },
            ElementType::File => TypeConfig::File {
                accept: String::new(),
                value: Vec::new(),
            },
        }
    }

    pub fn options(&self) -> Option<&Vec<ElementOption>> {
        match self {
            TypeConfig::Select { options, .. }
            | TypeConfig::Multiselect { options, .. }
            | TypeConfig::Radio { options, .. }
            | TypeConfig::Disabled { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn options_mut(&mut self) -> Option<&mut Vec<ElementOption>> {
        match self {
            TypeConfig::Select { options, .. }
            | TypeConfig::Multiselect { options, .. }
            | TypeConfig::Radio { options, .. }
            | TypeConfig::Disabled { options, .. } => Some(options),
            _ => None,
        }
    }
}

/// One field definition in the dynamic form schema.
///
/// `uid` is the stable internal identity: assigned once at creation, never
/// reused, independent of the user-visible `id`. Everything that tracks an
/// element across reorders and edits keys on `uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default = "new_uid")]
    pub uid: String,
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default = "default_label_width")]
    pub label_width: Option<u32>,
    #[serde(default)]
    pub tooltip: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_field: Option<String>,
    #[serde(flatten)]
    pub config: TypeConfig,
}

pub(crate) fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_label_width() -> Option<u32> {
    Some(DEFAULT_LABEL_WIDTH)
}

impl Element {
    pub fn new(id: impl Into<String>, title: impl Into<String>, element_type: ElementType) -> Self {
        Element {
            uid: new_uid(),
            id: id.into(),
            title: title.into(),
            width: None,
            label_width: Some(DEFAULT_LABEL_WIDTH),
            tooltip: String::new(),
            unit: String::new(),
            section: String::new(),
            show_if: None,
            field_name: None,
            query_field: None,
            config: TypeConfig::defaults_for(element_type),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.config.element_type()
    }

    /// Current value as a payload tree node. File elements surface their raw
    /// attachments; everything else maps to a JSON-like scalar or sequence.
    pub fn payload_value(&self) -> PayloadValue {
        match &self.config {
            TypeConfig::String { value, .. }
            | TypeConfig::Textarea { value, .. }
            | TypeConfig::Code { value, .. }
            | TypeConfig::DisabledTextarea { value, .. }
            | TypeConfig::Password { value }
            | TypeConfig::Secret { value }
            | TypeConfig::Datetime { value, .. } => PayloadValue::Str(value.clone()),
            TypeConfig::Number { value, .. } => match value {
                Some(v) => PayloadValue::Num(*v),
                None => PayloadValue::Null,
            },
            TypeConfig::Slider { value, .. } => PayloadValue::Num(*value),
            TypeConfig::Boolean { value } => PayloadValue::Bool(*value),
            TypeConfig::Select { value, .. }
            | TypeConfig::Radio { value, .. }
            | TypeConfig::Disabled { value, .. } => PayloadValue::from_json(value),
            TypeConfig::Multiselect { value, .. } => {
                PayloadValue::Array(value.iter().map(PayloadValue::from_json).collect())
            }
            TypeConfig::File { value, .. } => {
                PayloadValue::Array(value.iter().cloned().map(PayloadValue::File).collect())
            }
        }
    }
}

/// Value tree handed to the serializer: JSON scalars plus binary attachments.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<PayloadValue>),
    Object(IndexMap<String, PayloadValue>),
    File(FileAttachment),
}

impl PayloadValue {
    pub fn from_json(value: &JsonValue) -> PayloadValue {
        match value {
            JsonValue::Null => PayloadValue::Null,
            JsonValue::Bool(b) => PayloadValue::Bool(*b),
            JsonValue::Number(n) => PayloadValue::Num(n.as_f64().unwrap_or_default()),
            JsonValue::String(s) => PayloadValue::Str(s.clone()),
            JsonValue::Array(items) => {
                PayloadValue::Array(items.iter().map(PayloadValue::from_json).collect())
            }
            JsonValue::Object(map) => PayloadValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), PayloadValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Strict structural equality against a recorded JSON baseline.
    /// Attachments never compare equal: a file value always counts as changed.
    pub fn json_eq(&self, other: &JsonValue) -> bool {
        match (self, other) {
            (PayloadValue::Null, JsonValue::Null) => true,
            (PayloadValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (PayloadValue::Num(a), JsonValue::Number(b)) => {
                b.as_f64().map(|b| *a == b).unwrap_or(false)
            }
            (PayloadValue::Str(a), JsonValue::String(b)) => a == b,
            (PayloadValue::Array(a), JsonValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.json_eq(y))
            }
            (PayloadValue::Object(a), JsonValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|o| v.json_eq(o)).unwrap_or(false))
            }
            _ => false,
        }
    }

    /// JSON rendition for expression scopes: attachments collapse to their
    /// file names, everything else maps structurally.
    pub fn to_scope_json(&self) -> JsonValue {
        match self {
            PayloadValue::Null => JsonValue::Null,
            PayloadValue::Bool(b) => JsonValue::Bool(*b),
            PayloadValue::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            PayloadValue::Str(s) => JsonValue::String(s.clone()),
            PayloadValue::Array(items) => {
                JsonValue::Array(items.iter().map(PayloadValue::to_scope_json).collect())
            }
            PayloadValue::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_scope_json()))
                    .collect(),
            ),
            PayloadValue::File(file) => JsonValue::String(file.name.clone()),
        }
    }
}

impl From<JsonValue> for PayloadValue {
    fn from(value: JsonValue) -> Self {
        PayloadValue::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn defaults_replace_type_specific_fields() {
        match TypeConfig::defaults_for(ElementType::Slider) {
            TypeConfig::Slider {
                min,
                max,
                step,
                value,
            } => {
                assert_eq!(min, 0.0);
                assert_eq!(max, 100.0);
                assert_eq!(step, 1.0);
                assert_eq!(value, 0.0);
            }
            other => panic!("expected slider defaults, got {other:?}"),
        }
        match TypeConfig::defaults_for(ElementType::Code) {
            TypeConfig::Code {
                language, height, ..
            } => {
                assert_eq!(language, CodeLanguage::Javascript);
                assert_eq!(height, CODE_EDITOR_HEIGHT);
            }
            other => panic!("expected code defaults, got {other:?}"),
        }
        match TypeConfig::defaults_for(ElementType::Textarea) {
            TypeConfig::Textarea { rows, .. } => assert_eq!(rows, TEXTAREA_ROWS),
            other => panic!("expected textarea defaults, got {other:?}"),
        }
    }

    #[test]
    fn option_converts_string_to_number() {
        let opt = OptionValue::String {
            value: "123".into(),
        };
        let converted = opt.convert_to(OptionType::Number);
        assert_eq!(converted, OptionValue::Number { value: 123.0 });
        assert_eq!(converted.derive_id(), "123");
    }

    #[test]
    fn option_falls_back_to_default_on_parse_failure() {
        let opt = OptionValue::String {
            value: "abc".into(),
        };
        let converted = opt.convert_to(OptionType::Number);
        assert_eq!(converted, OptionValue::Number { value: 0.0 });
        assert_eq!(converted.derive_id(), "0");
    }

    #[test]
    fn option_converts_number_to_string() {
        let opt = OptionValue::Number { value: 123.0 };
        let converted = opt.convert_to(OptionType::String);
        assert_eq!(
            converted,
            OptionValue::String {
                value: "123".into()
            }
        );
    }

    #[test]
    fn empty_option_value_uses_fallback_id() {
        let opt = OptionValue::String { value: "".into() };
        assert_eq!(opt.derive_id(), OPTION_DEFAULT_ID);
    }

    #[test]
    fn element_serde_round_trip_keeps_type_tag() {
        let mut element = Element::new("speed", "Speed", ElementType::Slider);
        element.unit = "km/h".into();
        let raw = serde_json::to_value(&element).unwrap();
        assert_eq!(raw["type"], json!("slider"));
        assert_eq!(raw["labelWidth"], json!(10));
        assert_eq!(raw["unit"], json!("km/h"));
        let back: Element = serde_json::from_value(raw).unwrap();
        assert_eq!(back, element);
    }

    #[test]
    fn element_deserializes_without_uid() {
        let raw = json!({
            "id": "comment",
            "type": "disabled-textarea",
            "rows": 4
        });
        let element: Element = serde_json::from_value(raw).unwrap();
        assert!(!element.uid.is_empty());
        assert_eq!(element.element_type(), ElementType::DisabledTextarea);
    }

    #[test]
    fn payload_value_reflects_current_state() {
        let mut element = Element::new("age", "Age", ElementType::Number);
        assert_eq!(element.payload_value(), PayloadValue::Null);
        element.config = TypeConfig::Number {
            min: None,
            max: None,
            value: Some(30.0),
        };
        assert_eq!(element.payload_value(), PayloadValue::Num(30.0));
    }

    #[test]
    fn json_eq_treats_files_as_changed() {
        let file = PayloadValue::File(FileAttachment::inline("a.txt", "text/plain", vec![1]));
        assert!(!file.json_eq(&json!("a.txt")));
        assert!(PayloadValue::Num(30.0).json_eq(&json!(30)));
        assert!(!PayloadValue::Num(30.0).json_eq(&json!(31)));
    }
}
