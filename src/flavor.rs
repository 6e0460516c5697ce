//! Canonical flavor record of a logged model.
//!
//! A logged model declares its flavors in one of two layouts:
//!
//! * one flavor only, e.g. a feature store packaged model, whose
//!   `loader_module` names the flavor;
//! * the `python_function` wrapper next to one native flavor. The wrapper's
//!   `loader_module` names the flavor and the native entry supplies the
//!   version (its single `*_version` field) and every other field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::SchemaError;

pub type FlavorFields = Map<String, Value>;
pub type Flavors = BTreeMap<String, FlavorFields>;

pub const WRAPPER_FLAVOR: &str = "python_function";
pub const LOADER_MODULE: &str = "loader_module";
pub const VERSION_SUFFIX: &str = "_version";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorRecord {
    pub flavor: String,
    /// Version of the native library, empty when the layout has none.
    pub version: String,
    #[serde(flatten)]
    pub fields: FlavorFields,
}

/// The two layouts we know how to read.
#[derive(Debug)]
enum Layout<'a> {
    Single {
        name: &'a str,
        fields: &'a FlavorFields,
    },
    Wrapped {
        wrapper: &'a FlavorFields,
        native_name: &'a str,
        native: &'a FlavorFields,
    },
}

impl<'a> Layout<'a> {
    fn of(flavors: &'a Flavors) -> Result<Self, SchemaError> {
        let entries: Vec<(&'a String, &'a FlavorFields)> = flavors.iter().collect();
        match *entries.as_slice() {
            [(name, fields)] => Ok(Layout::Single {
                name: name.as_str(),
                fields,
            }),
            [first, second] => {
                let (wrapper, native) = match (first.0 == WRAPPER_FLAVOR, second.0 == WRAPPER_FLAVOR) {
                    (true, false) => (first.1, second),
                    (false, true) => (second.1, first),
                    _ => return Err(SchemaError::MissingWrapperFlavor(flavors.keys().cloned().collect())),
                };
                Ok(Layout::Wrapped {
                    wrapper,
                    native_name: native.0.as_str(),
                    native: native.1,
                })
            }
            _ => Err(SchemaError::UnsupportedFlavorCardinality(flavors.len())),
        }
    }
}

/// Normalizes the `flavors` stanza of a logged model. The input is not
/// modified.
pub fn normalize(flavors: &Flavors) -> Result<FlavorRecord, SchemaError> {
    match Layout::of(flavors)? {
        Layout::Single { name, fields } => Ok(FlavorRecord {
            flavor: loader_module(name, fields)?,
            version: String::new(),
            fields: FlavorFields::new(),
        }),
        Layout::Wrapped {
            wrapper,
            native_name,
            native,
        } => {
            let flavor = loader_module(WRAPPER_FLAVOR, wrapper)?;
            let mut fields = native.clone();
            let version_key = version_field(native_name, &fields)?;
            let version = fields.remove(&version_key).map(value_text).unwrap_or_default();
            fields.remove("flavor");
            fields.remove("version");
            Ok(FlavorRecord { flavor, version, fields })
        }
    }
}

fn loader_module(flavor: &str, fields: &FlavorFields) -> Result<String, SchemaError> {
    match fields.get(LOADER_MODULE) {
        Some(Value::String(module)) if !module.is_empty() => Ok(module.clone()),
        _ => Err(SchemaError::missing_field(format!("flavor {}", flavor), LOADER_MODULE)),
    }
}

fn version_field(flavor: &str, fields: &FlavorFields) -> Result<String, SchemaError> {
    let candidates: Vec<String> = fields
        .keys()
        .filter(|key| key.ends_with(VERSION_SUFFIX))
        .cloned()
        .collect();
    match candidates.as_slice() {
        [] => Err(SchemaError::MissingVersionField {
            flavor: flavor.to_owned(),
        }),
        [key] => Ok(key.clone()),
        _ => Err(SchemaError::AmbiguousVersionField {
            flavor: flavor.to_owned(),
            candidates,
        }),
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
