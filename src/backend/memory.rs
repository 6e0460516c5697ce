//! A [`Client`] over entities held in memory.
//!
//! Useful for tests and for replaying entities saved from a server. Any
//! resource can be made to fail with a chosen [`FetchErrorKind`].

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::api::{
    artifact::FileInfo,
    client::{versions_filter, Client},
    error::{FetchError, FetchErrorKind, FetchResult},
    experiment::Experiment,
    id::VersionNumber,
    model::{ModelVersion, RegisteredModel},
    permission::{PermissionTarget, Permissions},
    run::Run,
};
use crate::{ExperimentId, RunId};

/// Something a [`Client`] call fetches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resource {
    RegisteredModel(String),
    ModelVersions(String),
    ModelVersion(String, VersionNumber),
    Run(RunId),
    Experiment(ExperimentId),
    Artifacts(RunId, String),
    Permissions(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::RegisteredModel(name) => write!(f, "registered model {}", name),
            Resource::ModelVersions(filter) => write!(f, "model versions matching {}", filter),
            Resource::ModelVersion(name, version) => write!(f, "model version {}/{}", name, version),
            Resource::Run(id) => write!(f, "run {}", id),
            Resource::Experiment(id) => write!(f, "experiment {}", id),
            Resource::Artifacts(run, path) => write!(f, "artifacts {}:{}", run, path),
            Resource::Permissions(object) => write!(f, "permissions {}", object),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemory {
    #[serde(default)]
    pub registered_models: BTreeMap<String, RegisteredModel>,
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
    #[serde(default)]
    pub runs: BTreeMap<RunId, Run>,
    #[serde(default)]
    pub experiments: BTreeMap<ExperimentId, Experiment>,
    /// Every file and directory of a run's artifact tree, by full path.
    #[serde(default)]
    pub artifacts: BTreeMap<RunId, Vec<FileInfo>>,
    /// Access control lists by permission object path.
    #[serde(default)]
    pub permissions: BTreeMap<String, Permissions>,
    #[serde(skip)]
    failures: BTreeMap<Resource, FetchErrorKind>,
}

impl InMemory {
    pub fn new() -> Self {
        InMemory::default()
    }

    pub fn with_registered_model(mut self, model: RegisteredModel) -> Self {
        self.registered_models.insert(model.name.clone(), model);
        self
    }

    pub fn with_model_version(mut self, version: ModelVersion) -> Self {
        self.model_versions.push(version);
        self
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.runs.insert(run.info.run_id.clone(), run);
        self
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiments.insert(experiment.experiment_id.clone(), experiment);
        self
    }

    pub fn with_artifact(mut self, run: &RunId, file: FileInfo) -> Self {
        self.artifacts.entry(run.clone()).or_default().push(file);
        self
    }

    pub fn with_permissions(mut self, target: &PermissionTarget, permissions: Permissions) -> Self {
        self.permissions.insert(target.object_path(), permissions);
        self
    }

    /// Makes every fetch of `resource` fail with `kind`.
    pub fn fail(mut self, resource: Resource, kind: FetchErrorKind) -> Self {
        self.failures.insert(resource, kind);
        self
    }

    fn check(&self, resource: &Resource) -> FetchResult<()> {
        match self.failures.get(resource) {
            Some(kind) => Err(FetchError::new(*kind, resource.to_string(), "injected failure")),
            None => Ok(()),
        }
    }

    fn found<T: Clone>(resource: Resource, value: Option<&T>) -> FetchResult<T> {
        value.cloned().ok_or_else(|| FetchError::not_found(resource.to_string()))
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

impl Client for InMemory {
    fn get_registered_model(&mut self, name: &str) -> FetchResult<RegisteredModel> {
        let resource = Resource::RegisteredModel(name.to_owned());
        self.check(&resource)?;
        Self::found(resource, self.registered_models.get(name))
    }

    fn search_model_versions(&mut self, filter: &str) -> FetchResult<Vec<ModelVersion>> {
        self.check(&Resource::ModelVersions(filter.to_owned()))?;
        Ok(self
            .model_versions
            .iter()
            .filter(|version| versions_filter(&version.name) == filter)
            .cloned()
            .collect())
    }

    fn get_model_version(&mut self, name: &str, version: VersionNumber) -> FetchResult<ModelVersion> {
        let resource = Resource::ModelVersion(name.to_owned(), version);
        self.check(&resource)?;
        let found = self.model_versions.iter().find(|v| v.name == name && v.version == version);
        Self::found(resource, found)
    }

    fn get_model_version_by_alias(&mut self, name: &str, alias: &str) -> FetchResult<ModelVersion> {
        let found = self
            .model_versions
            .iter()
            .find(|v| v.name == name && v.aliases.iter().any(|a| a == alias));
        found
            .cloned()
            .ok_or_else(|| FetchError::not_found(format!("alias {}@{}", name, alias)))
    }

    fn get_run(&mut self, id: &RunId) -> FetchResult<Run> {
        let resource = Resource::Run(id.clone());
        self.check(&resource)?;
        Self::found(resource, self.runs.get(id))
    }

    fn get_experiment(&mut self, id: &ExperimentId) -> FetchResult<Experiment> {
        let resource = Resource::Experiment(id.clone());
        self.check(&resource)?;
        Self::found(resource, self.experiments.get(id))
    }

    fn list_artifacts(&mut self, run: &RunId, path: &str) -> FetchResult<Vec<FileInfo>> {
        self.check(&Resource::Artifacts(run.clone(), path.to_owned()))?;
        let path = path.trim_end_matches('/');
        Ok(self
            .artifacts
            .get(run)
            .map(|files| files.iter().filter(|file| parent(&file.path) == path).cloned().collect())
            .unwrap_or_default())
    }

    fn get_permissions(&mut self, target: &PermissionTarget) -> FetchResult<Permissions> {
        let resource = Resource::Permissions(target.object_path());
        self.check(&resource)?;
        Self::found(resource, self.permissions.get(&target.object_path()))
    }
}
