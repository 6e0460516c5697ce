pub mod artifact;
pub mod client;
pub mod error;
pub mod experiment;
pub mod id;
pub mod model;
pub mod permission;
pub mod run;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Active,
    Deleted,
}

/// A single `key`/`value` pair as the REST API returns tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Tags or aliases either in their upstream list shape or already
/// converted to a mapping.
///
/// Deserializing accepts both, so a saved report can be fed back
/// through enrichment without converting anything twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValues<T> {
    List(Vec<T>),
    Map(BTreeMap<String, String>),
}

impl<T> Default for KeyValues<T> {
    fn default() -> Self {
        KeyValues::List(Vec::new())
    }
}

// deserialize i64 from either a JSON number or a decimal string
pub(crate) mod int_or_str {
    use std::str::FromStr;

    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(crate) enum IntOrStr {
        Int(i64),
        Str(String),
    }

    impl IntOrStr {
        pub(crate) fn into_int<E: de::Error>(self) -> Result<i64, E> {
            match self {
                IntOrStr::Int(int) => Ok(int),
                IntOrStr::Str(s) => i64::from_str(&s).map_err(de::Error::custom),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        IntOrStr::deserialize(deserializer)?.into_int()
    }

    pub fn serialize<S>(int: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(*int)
    }
}

// Option<i64> from an optional number or decimal string
pub(crate) mod opt_int_or_str {
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::{Serialize, Serializer};

    use super::int_or_str::IntOrStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<IntOrStr>::deserialize(deserializer)? {
            Some(value) => Ok(Some(value.into_int()?)),
            None => Ok(None),
        }
    }

    pub fn serialize<S>(int: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        int.serialize(serializer)
    }
}

// f64 from a JSON number or the protobuf spellings of non-finite doubles
pub(crate) mod f64_or_str {
    use std::collections::BTreeMap;

    use serde::de::{self, Deserializer};
    use serde::ser::{SerializeMap, Serializer};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FloatOrStr {
        Float(f64),
        Str(String),
    }

    /// Text form of a double, using `NaN`, `Infinity` and `-Infinity` for
    /// the non-finite values.
    pub fn text(value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        } else {
            value.to_string()
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match FloatOrStr::deserialize(deserializer)? {
            FloatOrStr::Float(value) => Ok(value),
            FloatOrStr::Str(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => other.parse().map_err(de::Error::custom),
            },
        }
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&text(*value))
        }
    }

    pub fn serialize_map<S>(values: &BTreeMap<String, f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Value(f64);

        impl serde::Serialize for Value {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serialize(&self.0, serializer)
            }
        }

        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (key, value) in values {
            map.serialize_entry(key, &Value(*value))?;
        }
        map.end()
    }
}
