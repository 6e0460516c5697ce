use crate::api::{
    artifact::FileInfo,
    error::FetchResult,
    experiment::Experiment,
    id::VersionNumber,
    model::{ModelVersion, RegisteredModel},
    permission::{PermissionTarget, Permissions},
    run::Run,
};
use crate::{ExperimentId, RunId};

/// Read access to a model registry and tracking service.
///
/// Every call is a blocking request. Implementations own retries and
/// timeouts; callers only see the final [`FetchError`](crate::api::error::FetchError).
#[rustfmt::skip]
pub trait Client {
    fn get_registered_model(&mut self, name: &str) -> FetchResult<RegisteredModel>;
    fn search_model_versions(&mut self, filter: &str) -> FetchResult<Vec<ModelVersion>>;
    fn get_model_version(&mut self, name: &str, version: VersionNumber) -> FetchResult<ModelVersion>;
    fn get_model_version_by_alias(&mut self, name: &str, alias: &str) -> FetchResult<ModelVersion>;

    fn get_run(&mut self, id: &RunId) -> FetchResult<Run>;
    fn get_experiment(&mut self, id: &ExperimentId) -> FetchResult<Experiment>;

    /// Immediate children of `path` in the run's artifact tree. An empty
    /// path lists the artifact root.
    fn list_artifacts(&mut self, run: &RunId, path: &str) -> FetchResult<Vec<FileInfo>>;

    fn get_permissions(&mut self, target: &PermissionTarget) -> FetchResult<Permissions>;
}

/// Registry search filter selecting every version of a model.
pub fn versions_filter(model_name: &str) -> String {
    format!("name = '{}'", model_name.replace('\'', "\\'"))
}
