//! Core engine for a schema-driven form panel: an editable element model
//! with conflict-checked updates and debounced persistence, a sandboxed
//! expression language for custom payloads and visibility rules, and a
//! payload pipeline that renders submissions as JSON or multipart form data.

pub mod config;
pub mod expr;
pub mod model;
pub mod request;
pub mod store;
pub mod vars;

pub use config::{load as load_config, validate as validate_config, FormConfig, Section};
pub use expr::{show_if, CodeError, Program, Scope};
pub use model::{
    Element, ElementOption, ElementType, FileAttachment, OptionType, OptionValue, PayloadValue,
    TypeConfig,
};
pub use request::serialize::{to_form_data, to_json, FormData, FormPart, SerializeError};
pub use request::{
    element_visible, payload_for_request, PayloadError, PayloadMode, RequestConfig, RequestMethod,
};
pub use store::{ElementStore, NewElement, StoreError};
