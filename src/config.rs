use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Element, TypeConfig};
use crate::request::RequestConfig;

/// Persisted form definition: the element schema plus the outgoing request
/// settings and section layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Load a form configuration from disk. A `.json` extension selects JSON;
/// everything else parses as YAML (which accepts JSON documents too).
pub fn load(path: &Path) -> Result<FormConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading form config {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let config = if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON form config {}", path.display()))?
    } else {
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML form config {}", path.display()))?
    };
    Ok(config)
}

pub fn validate(config: &FormConfig) -> Result<(), String> {
    let mut pairs = HashSet::new();
    for (i, element) in config.elements.iter().enumerate() {
        if !pairs.insert((element.id.clone(), element.element_type())) {
            return Err(format!(
                "duplicate element: id '{}' with type '{}' at index {}",
                element.id,
                element.element_type(),
                i
            ));
        }
        if let Some(options) = element.config.options() {
            let mut values = HashSet::new();
            for option in options {
                let key = (option.value.option_type(), option.value.derive_id());
                if !values.insert(key) {
                    return Err(format!(
                        "duplicate option value '{}' in element '{}'",
                        option.value.derive_id(),
                        element.id
                    ));
                }
            }
        }
        if let TypeConfig::Slider { step, .. } = element.config {
            if step <= 0.0 {
                return Err(format!(
                    "slider '{}' has a non-positive step ({})",
                    element.id, step
                ));
            }
        }
    }
    Ok(())
}
