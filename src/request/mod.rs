pub mod serialize;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::expr::{self, CodeError, Program, Scope, VarResolver};
use crate::model::{Element, ElementType, PayloadValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
    Query,
    Datasource,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    All,
    Updated,
    Custom,
}

/// How form values leave the panel. `updated_only` is the legacy boolean the
/// explicit mode replaced; it is still read so old configurations keep their
/// behavior, but never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(default)]
    pub method: RequestMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_mode: Option<PayloadMode>,
    #[serde(default, skip_serializing)]
    pub updated_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_payload: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        RequestConfig {
            method: RequestMethod::default(),
            payload_mode: None,
            updated_only: false,
            get_payload: None,
            content_type: String::new(),
        }
    }
}

impl RequestConfig {
    /// Effective mode, with the legacy `updatedOnly` flag mapped onto the
    /// explicit enum when no mode is set.
    pub fn effective_payload_mode(&self) -> PayloadMode {
        match self.payload_mode {
            Some(mode) => mode,
            None if self.updated_only => PayloadMode::Updated,
            None => PayloadMode::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error(transparent)]
    Code(#[from] CodeError),
    #[error("custom payload mode is set but no payload code is configured")]
    MissingCode,
    #[error("custom payload code must produce an object, got {got}")]
    NotAnObject { got: String },
}

/// Element descriptor exposed to payload code and visibility rules: the
/// stable public fields plus the current value, never the full config.
fn element_record(element: &Element) -> JsonValue {
    json!({
        "id": element.id,
        "type": element.element_type().as_str(),
        "title": element.title,
        "section": element.section,
        "value": element.payload_value().to_scope_json(),
    })
}

fn element_records(elements: &[Element]) -> JsonValue {
    JsonValue::Array(elements.iter().map(element_record).collect())
}

fn is_readonly(element_type: ElementType) -> bool {
    matches!(
        element_type,
        ElementType::Disabled | ElementType::DisabledTextarea
    )
}

/// Build the outgoing payload tree for a request.
///
/// `initial` is the value snapshot recorded when the form last loaded; the
/// `updated` mode diffs against it. The `custom` mode runs the configured
/// payload program with `elements` and `initial` in scope and must yield an
/// object.
pub fn payload_for_request(
    elements: &[Element],
    initial: &JsonMap<String, JsonValue>,
    request: &RequestConfig,
) -> Result<PayloadValue, PayloadError> {
    match request.effective_payload_mode() {
        PayloadMode::All => {
            let mut payload = IndexMap::new();
            for element in elements {
                payload.insert(element.id.clone(), element.payload_value());
            }
            Ok(PayloadValue::Object(payload))
        }
        PayloadMode::Updated => {
            let mut payload = IndexMap::new();
            for element in elements {
                if is_readonly(element.element_type()) {
                    continue;
                }
                let value = element.payload_value();
                let baseline = initial.get(&element.id).unwrap_or(&JsonValue::Null);
                if !value.json_eq(baseline) {
                    payload.insert(element.id.clone(), value);
                }
            }
            Ok(PayloadValue::Object(payload))
        }
        PayloadMode::Custom => {
            let source = request
                .get_payload
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(PayloadError::MissingCode)?;
            let program = Program::compile(source)?;
            let scope = Scope::new()
                .with_var("elements", element_records(elements))
                .with_var("initial", JsonValue::Object(initial.clone()));
            let result = program.eval(&scope)?;
            match &result {
                JsonValue::Object(_) => Ok(PayloadValue::from_json(&result)),
                other => Err(PayloadError::NotAnObject {
                    got: match other {
                        JsonValue::Null => "null",
                        JsonValue::Bool(_) => "a boolean",
                        JsonValue::Number(_) => "a number",
                        JsonValue::String(_) => "a string",
                        JsonValue::Array(_) => "an array",
                        JsonValue::Object(_) => "an object",
                    }
                    .to_string(),
                }),
            }
        }
    }
}

/// Evaluate an element's visibility rule against the current form state.
/// Elements without a rule, and rules that fail, stay visible.
pub fn element_visible(
    element: &Element,
    elements: &[Element],
    resolver: Option<VarResolver<'_>>,
) -> bool {
    let Some(rule) = element.show_if.as_deref() else {
        return true;
    };
    let mut scope = Scope::new().with_var("elements", element_records(elements));
    if let Some(resolver) = resolver {
        scope = scope.with_resolver(resolver);
    }
    expr::show_if(rule, &scope)
}
