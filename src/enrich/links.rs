//! Links from report entities back to the workspace UI and REST API.

use serde::{Deserialize, Serialize};

use crate::{api::id::VersionNumber, ExperimentId, RunId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

impl Links {
    pub fn is_empty(&self) -> bool {
        self.ui.is_none() && self.api.is_none()
    }
}

#[derive(Serialize)]
struct ModelQuery<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Serialize)]
struct RunQuery<'a> {
    run_id: &'a RunId,
}

#[derive(Serialize)]
struct ExperimentQuery<'a> {
    experiment_id: &'a ExperimentId,
}

/// Synthesizes [`Links`] for a tracking server host. Without a host every
/// link is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBuilder {
    host: Option<String>,
}

impl LinkBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into().trim_end_matches('/').to_owned();
        LinkBuilder {
            host: if host.is_empty() { None } else { Some(host) },
        }
    }

    pub fn none() -> Self {
        LinkBuilder::default()
    }

    pub fn registered_model(&self, name: &str, catalog_scoped: bool) -> Links {
        let host = match &self.host {
            Some(host) => host,
            None => return Links::default(),
        };
        if catalog_scoped {
            Links {
                ui: Some(format!("{}/explore/data/models/{}", host, catalog_path(name))),
                api: Some(format!("{}/api/2.1/unity-catalog/models/{}", host, encode(name))),
            }
        } else {
            Links {
                ui: Some(format!("{}/#mlflow/models/{}", host, encode(name))),
                api: api_link(host, "2.0/mlflow/registered-models/get", &ModelQuery { name, version: None }),
            }
        }
    }

    pub fn model_version(&self, name: &str, version: VersionNumber, catalog_scoped: bool) -> Links {
        let host = match &self.host {
            Some(host) => host,
            None => return Links::default(),
        };
        if catalog_scoped {
            Links {
                ui: Some(format!("{}/explore/data/models/{}/version/{}", host, catalog_path(name), version)),
                api: Some(format!("{}/api/2.1/unity-catalog/models/{}/versions/{}", host, encode(name), version)),
            }
        } else {
            let query = ModelQuery {
                name,
                version: Some(version.to_string()),
            };
            Links {
                ui: Some(format!("{}/#mlflow/models/{}/versions/{}", host, encode(name), version)),
                api: api_link(host, "2.0/mlflow/model-versions/get", &query),
            }
        }
    }

    pub fn run(&self, experiment: &ExperimentId, run: &RunId) -> Links {
        match &self.host {
            Some(host) => Links {
                ui: Some(format!(
                    "{}/#mlflow/experiments/{}/runs/{}",
                    host,
                    encode(experiment.as_ref()),
                    encode(run.as_ref())
                )),
                api: api_link(host, "2.0/mlflow/runs/get", &RunQuery { run_id: run }),
            },
            None => Links::default(),
        }
    }

    pub fn experiment(&self, experiment: &ExperimentId) -> Links {
        match &self.host {
            Some(host) => Links {
                ui: Some(format!("{}/#mlflow/experiments/{}", host, encode(experiment.as_ref()))),
                api: api_link(host, "2.0/mlflow/experiments/get", &ExperimentQuery { experiment_id: experiment }),
            },
            None => Links::default(),
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

// catalog.schema.model becomes catalog/schema/model
fn catalog_path(name: &str) -> String {
    name.split('.').map(encode).collect::<Vec<_>>().join("/")
}

fn api_link<Q: Serialize>(host: &str, path: &str, query: &Q) -> Option<String> {
    match serde_qs::to_string(query) {
        Ok(query) => Some(format!("{}/api/{}?{}", host, path, query)),
        Err(error) => {
            tracing::debug!(%error, path, "could not encode link query");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_model_links() {
        let links = LinkBuilder::new("https://example.cloud.databricks.com/")
            .registered_model("fraud_model", false);
        assert_eq!(
            links.ui.as_deref(),
            Some("https://example.cloud.databricks.com/#mlflow/models/fraud_model")
        );
        assert_eq!(
            links.api.as_deref(),
            Some("https://example.cloud.databricks.com/api/2.0/mlflow/registered-models/get?name=fraud_model")
        );
    }

    #[test]
    fn catalog_version_links() {
        let links = LinkBuilder::new("https://host").model_version("cat.schema.model", VersionNumber::new(3), true);
        assert_eq!(links.ui.as_deref(), Some("https://host/explore/data/models/cat/schema/model/version/3"));
        assert_eq!(
            links.api.as_deref(),
            Some("https://host/api/2.1/unity-catalog/models/cat.schema.model/versions/3")
        );
    }

    #[test]
    fn no_host_no_links() {
        let builder = LinkBuilder::none();
        assert!(builder.registered_model("m", false).is_empty());
        assert!(builder.experiment(&ExperimentId::from("1")).is_empty());
        assert_eq!(LinkBuilder::new(""), LinkBuilder::none());
    }

    #[test]
    fn names_are_encoded() {
        let builder = LinkBuilder::new("https://host");
        let links = builder.registered_model("fraud model/v2", false);
        assert_eq!(links.ui.as_deref(), Some("https://host/#mlflow/models/fraud%20model%2Fv2"));
        let api = links.api.unwrap();
        let (path, query) = api.split_once('?').unwrap();
        assert_eq!(path, "https://host/api/2.0/mlflow/registered-models/get");
        assert!(!query.contains(' ') && !query.contains('/'));
        let decoded: std::collections::BTreeMap<String, String> = serde_qs::from_str(query).unwrap();
        assert_eq!(decoded["name"], "fraud model/v2");

        let links = builder.model_version("cat.my schema.model", VersionNumber::new(1), true);
        assert_eq!(links.ui.as_deref(), Some("https://host/explore/data/models/cat/my%20schema/model/version/1"));

        let links = builder.run(&ExperimentId::from("7"), &RunId::from("run 1"));
        assert_eq!(links.ui.as_deref(), Some("https://host/#mlflow/experiments/7/runs/run%201"));
        let api = links.api.unwrap();
        assert!(api.starts_with("https://host/api/2.0/mlflow/runs/get?run_id=run"));
        assert!(!api.contains(' '));
        let links = builder.experiment(&ExperimentId::from("7"));
        assert_eq!(links.api.as_deref(), Some("https://host/api/2.0/mlflow/experiments/get?experiment_id=7"));
    }
}
