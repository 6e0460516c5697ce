//! Model URIs and the MLmodel record a run logged for a model.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::{
        client::Client,
        error::{ReportError, SchemaError},
        id::VersionNumber,
        model::ModelVersion,
        run::Run,
    },
    flavor::{self, FlavorRecord, Flavors},
    RunId,
};

/// Run tag holding the JSON list of every model the run logged.
pub const LOG_MODEL_HISTORY: &str = "mlflow.log-model.history";

const MODELS_SCHEME: &str = "models:/";
const RUNS_SCHEME: &str = "runs:/";
const ARTIFACTS_SEGMENT: &str = "artifacts/";
const DEFAULT_ARTIFACT_PATH: &str = "model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUri {
    /// `models:/<name>/<version>`
    Version { name: String, version: VersionNumber },
    /// `models:/<name>@<alias>`
    Alias { name: String, alias: String },
    /// `runs:/<run_id>/<artifact_path>`
    Run { run_id: RunId, artifact_path: String },
}

impl FromStr for ModelUri {
    type Err = SchemaError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidModelUri(uri.to_owned());
        if let Some(rest) = uri.strip_prefix(MODELS_SCHEME) {
            if let Some((name, alias)) = rest.split_once('@') {
                if name.is_empty() || alias.is_empty() || alias.contains('/') {
                    return Err(invalid());
                }
                return Ok(ModelUri::Alias {
                    name: name.to_owned(),
                    alias: alias.to_owned(),
                });
            }
            let (name, version) = rest.split_once('/').ok_or_else(invalid)?;
            let version = version.parse().map_err(|_| invalid())?;
            if name.is_empty() {
                return Err(invalid());
            }
            Ok(ModelUri::Version {
                name: name.to_owned(),
                version,
            })
        } else if let Some(rest) = uri.strip_prefix(RUNS_SCHEME) {
            match rest.split_once('/') {
                Some((run_id, path)) if !run_id.is_empty() && !path.trim_matches('/').is_empty() => Ok(ModelUri::Run {
                    run_id: RunId::from(run_id),
                    artifact_path: path.trim_matches('/').to_owned(),
                }),
                _ => Err(invalid()),
            }
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelUri::Version { name, version } => write!(f, "{}{}/{}", MODELS_SCHEME, name, version),
            ModelUri::Alias { name, alias } => write!(f, "{}{}@{}", MODELS_SCHEME, name, alias),
            ModelUri::Run { run_id, artifact_path } => write!(f, "{}{}/{}", RUNS_SCHEME, run_id, artifact_path),
        }
    }
}

/// Where a model URI points: the run that logged the model, the path of
/// the model below the run's artifact root and, for registry URIs, the
/// model version.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub uri: ModelUri,
    pub run_id: RunId,
    pub artifact_path: String,
    pub version: Option<ModelVersion>,
}

pub fn resolve(client: &mut dyn Client, uri: &ModelUri) -> Result<ResolvedModel, ReportError> {
    let version = match uri {
        ModelUri::Run { run_id, artifact_path } => {
            return Ok(ResolvedModel {
                uri: uri.clone(),
                run_id: run_id.clone(),
                artifact_path: artifact_path.clone(),
                version: None,
            })
        }
        ModelUri::Version { name, version } => client.get_model_version(name, *version)?,
        ModelUri::Alias { name, alias } => client.get_model_version_by_alias(name, alias)?,
    };
    let run_id = version
        .run_id
        .clone()
        .ok_or_else(|| SchemaError::missing_field(format!("model version {}/{}", version.name, version.version), "run_id"))?;
    Ok(ResolvedModel {
        uri: uri.clone(),
        run_id,
        artifact_path: artifact_path_of(version.source.as_deref()),
        version: Some(version),
    })
}

/// Model path below the run's artifact root, taken from a version's source.
fn artifact_path_of(source: Option<&str>) -> String {
    source
        .and_then(|source| source.rsplit_once(ARTIFACTS_SEGMENT))
        .map(|(_, path)| path.trim_matches('/'))
        .filter(|path| !path.is_empty())
        .unwrap_or(DEFAULT_ARTIFACT_PATH)
        .to_owned()
}

/// One entry of a run's model history: the MLmodel file of a logged model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub run_id: RunId,
    pub artifact_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_time_created: Option<String>,
    #[serde(default)]
    pub flavors: Flavors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_input_example_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlflow_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub databricks_runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_uuid: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ModelArtifact {
    /// Reads the model logged at `artifact_path` from the run's model
    /// history. The latest entry wins when the path was logged twice.
    pub fn from_run(run: &Run, artifact_path: &str) -> Result<Self, SchemaError> {
        let run_id = &run.info.run_id;
        let not_logged = || SchemaError::ModelNotLogged {
            run_id: run_id.to_string(),
            artifact_path: artifact_path.to_owned(),
        };
        let history = run
            .data
            .tags
            .iter()
            .find(|tag| tag.key == LOG_MODEL_HISTORY)
            .ok_or_else(not_logged)?;
        let entries: Vec<ModelArtifact> =
            serde_json::from_str(&history.value).map_err(|error| SchemaError::InvalidModelHistory {
                run_id: run_id.to_string(),
                message: error.to_string(),
            })?;
        let wanted = artifact_path.trim_matches('/');
        entries
            .into_iter()
            .rev()
            .find(|entry| entry.artifact_path.trim_matches('/') == wanted)
            .ok_or_else(not_logged)
    }

    pub fn flavor(&self) -> Result<FlavorRecord, SchemaError> {
        flavor::normalize(&self.flavors)
    }

    /// Creation time without its fractional seconds.
    pub fn time_created(&self) -> Option<&str> {
        self.utc_time_created
            .as_deref()
            .map(|time| time.split('.').next().unwrap_or(time))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelUris {
    pub model_uri: String,
    pub run_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_model_uri: Option<String>,
}

impl ModelUris {
    /// `(kind, uri)` rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        let mut rows = vec![("model_uri", self.model_uri.as_str()), ("run_uri", self.run_uri.as_str())];
        if let Some(uri) = &self.registered_model_uri {
            rows.push(("registered_model_uri", uri.as_str()));
        }
        rows
    }
}

/// The URI a report was asked for and the equivalent URIs of the same model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelManifest {
    pub model_uri: String,
    pub model_uris: ModelUris,
}

impl ModelManifest {
    pub fn new(resolved: &ResolvedModel) -> Self {
        let model_uri = resolved.uri.to_string();
        let run_uri = ModelUri::Run {
            run_id: resolved.run_id.clone(),
            artifact_path: resolved.artifact_path.clone(),
        }
        .to_string();
        let registered_model_uri = resolved.version.as_ref().map(|version| {
            ModelUri::Version {
                name: version.name.clone(),
                version: version.version,
            }
            .to_string()
        });
        ModelManifest {
            model_uris: ModelUris {
                model_uri: model_uri.clone(),
                run_uri,
                registered_model_uri,
            },
            model_uri,
        }
    }
}

/// The model a URI-anchored report is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFile {
    pub manifest: ModelManifest,
    pub artifact: ModelArtifact,
    /// Normalized form of `artifact.flavors`.
    pub flavor: FlavorRecord,
    pub size_bytes: u64,
}
