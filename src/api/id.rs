use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

// EXPERIMENTS

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<String> for ExperimentId {
    fn from(id: String) -> Self {
        ExperimentId(id)
    }
}

impl From<&str> for ExperimentId {
    fn from(id: &str) -> Self {
        ExperimentId(id.to_owned())
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// RUNS

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        RunId(id)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        RunId(id.to_owned())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// MODEL VERSIONS

/// Version number of a registered model.
///
/// The registry sends versions as strings; they are ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub fn new(number: u64) -> Self {
        VersionNumber(number)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for VersionNumber {
    fn from(number: u64) -> Self {
        VersionNumber(number)
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let int = super::int_or_str::deserialize(deserializer)?;
        u64::try_from(int)
            .map(VersionNumber)
            .map_err(|_| de::Error::custom(format!("invalid model version {}", int)))
    }
}

impl FromStr for VersionNumber {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VersionNumber(s.trim().parse()?))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::VersionNumber;

    #[test]
    fn versions_order_numerically() {
        let mut versions: Vec<VersionNumber> = serde_json::from_str(r#"["10", "2", 1]"#).unwrap();
        versions.sort();
        assert_eq!(versions, vec![VersionNumber::new(1), VersionNumber::new(2), VersionNumber::new(10)]);
        assert_eq!(serde_json::to_string(&versions[2]).unwrap(), r#""10""#);
    }

    #[test]
    fn negative_versions_are_rejected() {
        assert!(serde_json::from_str::<VersionNumber>(r#""-1""#).is_err());
    }
}
