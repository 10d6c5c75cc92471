use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::model::{format_number, FileAttachment, PayloadValue};

/// String transformation applied to every text leaf on the way out,
/// typically `${var}` substitution.
pub type Interpolate<'a> = &'a dyn Fn(&str) -> String;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("failed to read attachment '{name}'")]
    AttachmentRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("form data requires an object payload")]
    NotAnObject,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Encode the payload as a JSON string. Text leaves are interpolated and
/// attachments are embedded as base64 strings; every attachment is read
/// before any output is produced, so a failed read never yields a partial
/// document.
pub fn to_json(payload: &PayloadValue, interpolate: Interpolate<'_>) -> Result<String, SerializeError> {
    let resolved = resolve(payload, interpolate)?;
    Ok(serde_json::to_string(&resolved)?)
}

fn resolve(payload: &PayloadValue, interpolate: Interpolate<'_>) -> Result<JsonValue, SerializeError> {
    Ok(match payload {
        PayloadValue::Null => JsonValue::Null,
        PayloadValue::Bool(b) => JsonValue::Bool(*b),
        PayloadValue::Num(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        PayloadValue::Str(s) => JsonValue::String(interpolate(s)),
        PayloadValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve(item, interpolate))
                .collect::<Result<_, _>>()?,
        ),
        PayloadValue::Object(map) => {
            let mut out = JsonMap::new();
            for (key, value) in map {
                out.insert(key.clone(), resolve(value, interpolate)?);
            }
            JsonValue::Object(out)
        }
        PayloadValue::File(file) => JsonValue::String(encode_attachment(file)?),
    })
}

fn encode_attachment(file: &FileAttachment) -> Result<String, SerializeError> {
    let bytes = file.read().map_err(|source| SerializeError::AttachmentRead {
        name: file.name.clone(),
        source,
    })?;
    Ok(BASE64.encode(bytes))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text(String),
    File(FileAttachment),
}

/// Ordered multipart body: entries appear in payload insertion order, with
/// array items fanned out under `key[index]` names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormPart)>,
}

impl FormData {
    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, part)| part)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FormPart)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append(&mut self, name: String, part: FormPart) {
        self.entries.push((name, part));
    }
}

impl IntoIterator for FormData {
    type Item = (String, FormPart);
    type IntoIter = std::vec::IntoIter<(String, FormPart)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Flatten an object payload into multipart entries.
///
/// Scalars append stringified and interpolated under their key. Arrays fan
/// out one entry per item as `key[index]`, with attachments carried as file
/// parts rather than stringified. Nested objects append as their JSON
/// encoding.
pub fn to_form_data(
    payload: &PayloadValue,
    interpolate: Interpolate<'_>,
) -> Result<FormData, SerializeError> {
    let PayloadValue::Object(map) = payload else {
        return Err(SerializeError::NotAnObject);
    };
    let mut form = FormData::default();
    for (key, value) in map {
        match value {
            PayloadValue::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let name = format!("{key}[{index}]");
                    form.append(name, part_for(item, interpolate)?);
                }
            }
            other => form.append(key.clone(), part_for(other, interpolate)?),
        }
    }
    Ok(form)
}

fn part_for(value: &PayloadValue, interpolate: Interpolate<'_>) -> Result<FormPart, SerializeError> {
    Ok(match value {
        PayloadValue::File(file) => FormPart::File(file.clone()),
        PayloadValue::Null => FormPart::Text("null".to_string()),
        PayloadValue::Bool(b) => FormPart::Text(b.to_string()),
        PayloadValue::Num(n) => FormPart::Text(format_number(*n)),
        PayloadValue::Str(s) => FormPart::Text(interpolate(s)),
        nested @ (PayloadValue::Array(_) | PayloadValue::Object(_)) => {
            FormPart::Text(to_json(nested, interpolate)?)
        }
    })
}
