use crate::{
    api::{
        artifact::FileInfo,
        client::Client,
        error::{FetchError, FetchErrorKind, FetchResult},
        experiment::Experiment,
        id::VersionNumber,
        model::{ModelVersion, RegisteredModel},
        permission::{PermissionTarget, Permissions},
        run::Run,
    },
    ExperimentId, RunId,
};
use anyhow::{bail, Context, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{borrow::Cow, env, fmt::Display, time::Duration};

pub const TRACKING_URI_VAR: &str = "MLFLOW_TRACKING_URI";
pub const TRACKING_TOKEN_VAR: &str = "MLFLOW_TRACKING_TOKEN";
pub const DATABRICKS_HOST_VAR: &str = "DATABRICKS_HOST";
pub const DATABRICKS_TOKEN_VAR: &str = "DATABRICKS_TOKEN";

const API_SUFFIX: &str = "/api";

#[derive(Deserialize)]
struct RestErrorResponse {
    pub error_code: RestErrorCode,
    pub message: String,
}
#[derive(Debug, Clone, thiserror::Error)]
pub enum RestError {
    #[error("{status} {code}: {message}")]
    Known { status: u16, code: RestErrorCode, message: String },
    #[error("Unknown {status} error:\n{body}")]
    Unknown { status: u16, body: String },
    #[error("request failed: {message}")]
    Transport { message: String },
}
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "&str")]
pub enum RestErrorCode {
    ResourceDoesNotExist,
    InvalidParameterValue,
    PermissionDenied,
    Unauthenticated,
    Unknown(String),
}
impl From<&str> for RestErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "RESOURCE_DOES_NOT_EXIST" | "NOT_FOUND" => RestErrorCode::ResourceDoesNotExist,
            "INVALID_PARAMETER_VALUE" => RestErrorCode::InvalidParameterValue,
            "PERMISSION_DENIED" => RestErrorCode::PermissionDenied,
            "UNAUTHENTICATED" => RestErrorCode::Unauthenticated,
            _ => return RestErrorCode::Unknown(value.to_owned()),
        }
    }
}
impl Display for RestErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl RestError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            RestError::Known {
                code: RestErrorCode::ResourceDoesNotExist,
                ..
            }
            | RestError::Known { status: 404, .. }
            | RestError::Unknown { status: 404, .. } => FetchErrorKind::NotFound,
            RestError::Known {
                code: RestErrorCode::PermissionDenied | RestErrorCode::Unauthenticated,
                ..
            }
            | RestError::Known { status: 401 | 403, .. }
            | RestError::Unknown { status: 401 | 403, .. } => FetchErrorKind::Unauthorized,
            RestError::Transport { .. } => FetchErrorKind::Network,
            _ => FetchErrorKind::Unknown,
        }
    }

    fn into_fetch_error(self, resource: impl Into<String>) -> FetchError {
        FetchError::new(self.kind(), resource, self.to_string())
    }
}

/// Where and how to reach the tracking server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base of the REST API, e.g. `https://host/api`.
    pub api_url: String,
    pub token: Option<String>,
    /// Connect and read timeout of each request.
    pub timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        ServerConfig {
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            token: None,
            timeout: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `MLFLOW_TRACKING_URI` or `DATABRICKS_HOST` and the matching token.
    pub fn from_env() -> Result<Self, Error> {
        ServerConfig::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let api_url = match (lookup(TRACKING_URI_VAR), lookup(DATABRICKS_HOST_VAR)) {
            (Some(uri), _) if uri.starts_with("http") => api_url_of(&uri),
            (_, Some(host)) => api_url_of(&host),
            (Some(uri), None) => bail!("{} must be an http(s) URL, got {}", TRACKING_URI_VAR, uri),
            (None, None) => bail!("neither {} nor {} is set", TRACKING_URI_VAR, DATABRICKS_HOST_VAR),
        };
        let mut config = ServerConfig::new(api_url);
        config.token = lookup(TRACKING_TOKEN_VAR).or_else(|| lookup(DATABRICKS_TOKEN_VAR));
        Ok(config)
    }

    /// The server's address without the API suffix, used for links.
    pub fn host(&self) -> &str {
        self.api_url.strip_suffix(API_SUFFIX).unwrap_or(&self.api_url)
    }
}

fn api_url_of(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.ends_with(API_SUFFIX) {
        host.to_owned()
    } else {
        format!("{}{}", host, API_SUFFIX)
    }
}

pub struct Server {
    config: ServerConfig,
}

fn parse_error(response: ureq::Response) -> RestError {
    if response.synthetic() {
        let message = response
            .into_string()
            .unwrap_or_else(|_| "Could not turn error body into String.".to_string());
        return RestError::Transport { message };
    }
    let status = response.status();
    let body = response
        .into_string()
        .unwrap_or_else(|_| "Could not turn error body into String.".to_string());

    let response = serde_json::from_str::<RestErrorResponse>(&body).ok();
    if let Some(response) = response {
        RestError::Known {
            status,
            code: response.error_code,
            message: response.message,
        }
    } else {
        RestError::Unknown { status, body }
    }
}

impl Server {
    pub fn new(api_url: impl Into<String>) -> Self {
        Server::with_config(ServerConfig::new(api_url))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Server { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn execute<Ep, Val, Hand>(&mut self, request: Ep, error_handler: Hand) -> FetchResult<Val>
    where
        Ep: Endpoint<Value = Val> + EndpointExt,
        Hand: FnOnce(RestError) -> FetchError,
    {
        let query = Ep::write_query_string(&request).context("serializing request failed")?;
        let mut url = format!("{}/{}", self.config.api_url, request.path());
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        tracing::debug!(%url, "sending request");

        let mut http_request = Ep::METHOD(&url);
        if let Some(token) = &self.config.token {
            http_request.set("Authorization", &format!("Bearer {}", token));
        }
        if let Some(timeout) = self.config.timeout {
            let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            http_request.timeout_connect(millis).timeout_read(millis);
        }
        let http_response = http_request.call();
        if http_response.error() {
            let error = parse_error(http_response);
            Err(error_handler(error))
        } else {
            let response_string = http_response.into_string().context("failed to turn response into string")?;
            let response = Ep::read_response_string(&response_string)
                .with_context(|| format!("deserializing response failed:\n{}", &response_string))?;
            let value = Ep::extract(response);
            Ok(value)
        }
    }
}

impl Client for Server {
    fn get_registered_model(&mut self, name: &str) -> FetchResult<RegisteredModel> {
        let request = GetRegisteredModel { name };
        self.execute(request, |error| error.into_fetch_error(format!("registered model {}", name)))
    }

    fn search_model_versions(&mut self, filter: &str) -> FetchResult<Vec<ModelVersion>> {
        let mut versions = Vec::new();
        let mut page_token = None;
        loop {
            let request = SearchModelVersions {
                filter,
                page_token: page_token.take(),
            };
            let page = self.execute(request, |error| error.into_fetch_error(format!("model versions {}", filter)))?;
            versions.extend(page.model_versions);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(versions),
            }
        }
    }

    fn get_model_version(&mut self, name: &str, version: VersionNumber) -> FetchResult<ModelVersion> {
        let request = GetModelVersion { name, version };
        self.execute(request, |error| error.into_fetch_error(format!("model version {}/{}", name, version)))
    }

    fn get_model_version_by_alias(&mut self, name: &str, alias: &str) -> FetchResult<ModelVersion> {
        let request = GetModelVersionByAlias { name, alias };
        self.execute(request, |error| error.into_fetch_error(format!("model version {}@{}", name, alias)))
    }

    fn get_run(&mut self, id: &RunId) -> FetchResult<Run> {
        let request = GetRun { run_id: id };
        self.execute(request, |error| error.into_fetch_error(format!("run {}", id)))
    }

    fn get_experiment(&mut self, id: &ExperimentId) -> FetchResult<Experiment> {
        let request = GetExperiment { experiment_id: id };
        self.execute(request, |error| error.into_fetch_error(format!("experiment {}", id)))
    }

    fn list_artifacts(&mut self, run: &RunId, path: &str) -> FetchResult<Vec<FileInfo>> {
        let mut files = Vec::new();
        let mut page_token = None;
        loop {
            let request = ListArtifacts {
                run_id: run,
                path: Some(path).filter(|path| !path.is_empty()),
                page_token: page_token.take(),
            };
            let page = self.execute(request, |error| error.into_fetch_error(format!("artifacts {}:{}", run, path)))?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(files),
            }
        }
    }

    fn get_permissions(&mut self, target: &PermissionTarget) -> FetchResult<Permissions> {
        let object_path = target.object_path();
        let request = GetPermissions {
            object_path: &object_path,
        };
        self.execute(request, |error| error.into_fetch_error(format!("permissions {}", object_path)))
    }
}

trait Endpoint {
    const PATH: &'static str;
    const METHOD: fn(&str) -> ureq::Request;

    type Response;
    type Value;

    fn extract(response: Self::Response) -> Self::Value;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed(Self::PATH)
    }
}
trait EndpointExt: Endpoint {
    fn read_response_string(response: &str) -> Result<Self::Response, Error>;
    fn write_query_string(request: &Self) -> Result<String, Error>;
}
impl<P, R, V> EndpointExt for P
where
    P: Serialize,
    R: DeserializeOwned,
    P: Endpoint<Response = R, Value = V>,
{
    fn read_response_string(response: &str) -> Result<Self::Response, Error> {
        let response = serde_json::from_str::<'_, R>(response)?;
        Ok(response)
    }

    fn write_query_string(request: &Self) -> Result<String, Error> {
        Ok(serde_qs::to_string(request)?)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetRegisteredModel<'a> {
    pub name: &'a str,
}
#[derive(Deserialize)]
struct GetRegisteredModelResponse {
    registered_model: RegisteredModel,
}
impl Endpoint for GetRegisteredModel<'_> {
    const PATH: &'static str = "2.0/mlflow/registered-models/get";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = GetRegisteredModelResponse;
    type Value = RegisteredModel;

    fn extract(response: Self::Response) -> Self::Value {
        response.registered_model
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchModelVersions<'a> {
    pub filter: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}
#[derive(Deserialize)]
struct SearchModelVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}
impl Endpoint for SearchModelVersions<'_> {
    const PATH: &'static str = "2.0/mlflow/model-versions/search";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = SearchModelVersionsResponse;
    type Value = SearchModelVersionsResponse;

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}

#[derive(Deserialize)]
struct ModelVersionResponse {
    model_version: ModelVersion,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetModelVersion<'a> {
    pub name: &'a str,
    pub version: VersionNumber,
}
impl Endpoint for GetModelVersion<'_> {
    const PATH: &'static str = "2.0/mlflow/model-versions/get";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = ModelVersionResponse;
    type Value = ModelVersion;

    fn extract(response: Self::Response) -> Self::Value {
        response.model_version
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetModelVersionByAlias<'a> {
    pub name: &'a str,
    pub alias: &'a str,
}
impl Endpoint for GetModelVersionByAlias<'_> {
    const PATH: &'static str = "2.0/mlflow/registered-models/alias";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = ModelVersionResponse;
    type Value = ModelVersion;

    fn extract(response: Self::Response) -> Self::Value {
        response.model_version
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetRun<'a> {
    pub run_id: &'a RunId,
}
#[derive(Deserialize)]
struct GetRunResponse {
    run: Run,
}
impl Endpoint for GetRun<'_> {
    const PATH: &'static str = "2.0/mlflow/runs/get";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = GetRunResponse;
    type Value = Run;

    fn extract(response: Self::Response) -> Self::Value {
        response.run
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetExperiment<'a> {
    pub experiment_id: &'a ExperimentId,
}
#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}
impl Endpoint for GetExperiment<'_> {
    const PATH: &'static str = "2.0/mlflow/experiments/get";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Value = Experiment;
    type Response = GetExperimentResponse;

    fn extract(response: Self::Response) -> Self::Value {
        response.experiment
    }
}

#[derive(Debug, Clone, Serialize)]
struct ListArtifacts<'a> {
    pub run_id: &'a RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}
#[derive(Deserialize)]
struct ListArtifactsResponse {
    #[serde(default)]
    files: Vec<FileInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}
impl Endpoint for ListArtifacts<'_> {
    const PATH: &'static str = "2.0/mlflow/artifacts/list";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = ListArtifactsResponse;
    type Value = ListArtifactsResponse;

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetPermissions<'a> {
    #[serde(skip)]
    pub object_path: &'a str,
}
impl Endpoint for GetPermissions<'_> {
    const PATH: &'static str = "2.0/permissions";
    const METHOD: fn(&str) -> ureq::Request = ureq::get;
    type Response = Permissions;
    type Value = Permissions;

    fn extract(response: Self::Response) -> Self::Value {
        response
    }

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{}/{}", Self::PATH, self.object_path))
    }
}
