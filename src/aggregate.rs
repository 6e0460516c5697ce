//! Gathers a registered model, its versions, their runs and experiments.
//!
//! Fetches are issued one after the other. A version whose run branch
//! fails is left out of the result and reported as an [`Omission`]; every
//! other failure aborts the aggregation.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    api::{
        client::{versions_filter, Client},
        error::{FetchResult, ReportError},
        id::VersionNumber,
        model::RegisteredModel,
        permission::PermissionTarget,
        run::Run,
    },
    artifacts::{self, ArtifactSummary, MaxDepth},
    enrich::{Enricher, ExperimentRecord, ModelVersionRecord, RegisteredModelRecord, RunRecord},
    RunId,
};

/// Which pipeline [`Aggregator::aggregate`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normalized,
    /// The registered model exactly as fetched, nothing else.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    pub include_run: bool,
    /// Directory levels of each run's artifact tree to walk. Negative
    /// walks the whole tree, zero skips the walk.
    pub artifact_depth: i32,
    pub include_all_versions: bool,
    pub include_latest_versions: bool,
    pub include_permissions: bool,
    pub mode: Mode,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            include_run: false,
            artifact_depth: -1,
            include_all_versions: false,
            include_latest_versions: false,
            include_permissions: false,
            mode: Mode::Normalized,
        }
    }
}

/// Where the tracking server runs. Only Databricks workspaces answer
/// permission lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Databricks,
    OpenSource,
}

impl ExecutionContext {
    pub fn from_tracking_uri(uri: &str) -> Self {
        let uri = uri.to_ascii_lowercase();
        if uri.starts_with("databricks") || uri.contains(".databricks.com") || uri.contains(".azuredatabricks.net") {
            ExecutionContext::Databricks
        } else {
            ExecutionContext::OpenSource
        }
    }

    pub fn supports_permissions(self) -> bool {
        self == ExecutionContext::Databricks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionRun {
    pub run: RunRecord,
    pub experiment: ExperimentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSummary>,
}

/// A version whose run could not be included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    pub model: String,
    pub version: VersionNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub reason: String,
}

/// Outcome of one version's run branch.
#[derive(Debug, Clone, PartialEq)]
pub enum RunFetch {
    Fetched(Box<VersionRun>),
    Omitted(Omission),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAggregate {
    pub registered_model: RegisteredModelRecord,
    pub versions: Vec<ModelVersionRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub version_runs: BTreeMap<VersionNumber, VersionRun>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub omitted_runs: Vec<Omission>,
}

impl ModelAggregate {
    pub fn version(&self, version: VersionNumber) -> Option<&ModelVersionRecord> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Adds a version fetched outside of the aggregation, keeping versions
    /// ordered and unique.
    pub fn insert_version(&mut self, record: ModelVersionRecord) {
        match self.versions.binary_search_by_key(&record.version, |v| v.version) {
            Ok(index) => self.versions[index] = record,
            Err(index) => self.versions.insert(index, record),
        }
    }

    pub fn record_run(&mut self, version: VersionNumber, fetch: RunFetch) {
        match fetch {
            RunFetch::Fetched(run) => {
                self.version_runs.insert(version, *run);
            }
            RunFetch::Omitted(omission) => {
                warn!(
                    model = %omission.model,
                    version = %omission.version,
                    run_id = ?omission.run_id,
                    reason = %omission.reason,
                    "cannot get version run"
                );
                self.omitted_runs.push(omission);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Aggregate {
    Raw(RegisteredModel),
    Normalized(Box<ModelAggregate>),
}

pub struct Aggregator<'c> {
    client: &'c mut dyn Client,
    enricher: Enricher,
    context: ExecutionContext,
}

impl<'c> Aggregator<'c> {
    pub fn new(client: &'c mut dyn Client) -> Self {
        Aggregator {
            client,
            enricher: Enricher::default(),
            context: ExecutionContext::OpenSource,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn client(&mut self) -> &mut dyn Client {
        &mut *self.client
    }

    pub fn aggregate(&mut self, model_name: &str, options: &AggregateOptions) -> Result<Aggregate, ReportError> {
        match options.mode {
            Mode::Raw => Ok(Aggregate::Raw(self.client.get_registered_model(model_name)?)),
            Mode::Normalized => Ok(Aggregate::Normalized(Box::new(self.normalized(model_name, options)?))),
        }
    }

    /// The normalized pipeline regardless of `options.mode`.
    pub fn normalized(&mut self, model_name: &str, options: &AggregateOptions) -> Result<ModelAggregate, ReportError> {
        debug!(model = model_name, "fetching registered model");
        let fetched = self.client.get_registered_model(model_name)?;
        let mut registered_model = self.enricher.enrich(&fetched);

        let mut versions = Vec::new();
        if options.include_all_versions {
            debug!(model = model_name, "fetching model versions");
            versions = self
                .client
                .search_model_versions(&versions_filter(model_name))?
                .iter()
                .map(|version| self.enricher.enrich(version))
                .collect();
            versions.sort_by_key(|version: &ModelVersionRecord| version.version);
            registered_model.enrich_latest_versions(&self.enricher);
        }

        if options.include_permissions {
            self.attach_model_permissions(&mut registered_model)?;
        }
        if !options.include_latest_versions {
            registered_model.latest_versions = None;
        }

        let mut aggregate = ModelAggregate {
            registered_model,
            versions,
            version_runs: BTreeMap::new(),
            omitted_runs: Vec::new(),
        };
        if options.include_run {
            let fetches: Vec<(VersionNumber, RunFetch)> = aggregate
                .versions
                .iter()
                .map(|version| (version.version, self.fetch_version_run(version, options)))
                .collect();
            for (version, fetch) in fetches {
                aggregate.record_run(version, fetch);
            }
        }
        Ok(aggregate)
    }

    /// Fetches the run of `version` with its experiment and artifacts.
    /// Never fails; a failing branch comes back as [`RunFetch::Omitted`].
    pub fn fetch_version_run(&mut self, version: &ModelVersionRecord, options: &AggregateOptions) -> RunFetch {
        let omission = |run_id: Option<&RunId>, reason: String| Omission {
            model: version.name.clone(),
            version: version.version,
            run_id: run_id.cloned(),
            reason,
        };
        let run_id = match &version.run_id {
            Some(run_id) => run_id,
            None => return RunFetch::Omitted(omission(None, "model version has no run".to_owned())),
        };
        match self.version_run(run_id, options) {
            Ok(run) => RunFetch::Fetched(Box::new(run)),
            Err(error) => RunFetch::Omitted(omission(Some(run_id), error.to_string())),
        }
    }

    fn version_run(&mut self, run_id: &RunId, options: &AggregateOptions) -> FetchResult<VersionRun> {
        debug!(run_id = %run_id, "fetching run");
        let run = self.client.get_run(run_id)?;
        self.complete_run(&run, options)
    }

    /// Enriches a fetched run and gathers its experiment and artifacts.
    pub fn complete_run(&mut self, run: &Run, options: &AggregateOptions) -> FetchResult<VersionRun> {
        let run = self.enricher.enrich(run);
        let run_id = &run.info.run_id;

        let experiment_id = &run.info.experiment_id;
        debug!(experiment_id = %experiment_id, "fetching experiment");
        let mut experiment = self.enricher.enrich(&self.client.get_experiment(experiment_id)?);
        if options.include_permissions && self.context.supports_permissions() {
            let target = PermissionTarget::Experiment(experiment_id.clone());
            experiment.permissions = Some(self.client.get_permissions(&target)?);
        }

        let artifacts = match options.artifact_depth {
            0 => None,
            depth => Some(artifacts::walk(&mut *self.client, run_id, "", MaxDepth::from_level(depth))?),
        };
        Ok(VersionRun {
            run,
            experiment,
            artifacts,
        })
    }

    fn attach_model_permissions(&mut self, model: &mut RegisteredModelRecord) -> FetchResult<()> {
        if !self.context.supports_permissions() {
            info!(model = %model.name, "permission lookups need a Databricks workspace, skipped");
            return Ok(());
        }
        if model.catalog_scoped {
            info!(model = %model.name, "permissions of catalog-scoped models are not looked up");
            return Ok(());
        }
        let id = match &model.id {
            Some(id) => id.clone(),
            None => {
                info!(model = %model.name, "registered model has no object id, permissions skipped");
                return Ok(());
            }
        };
        debug!(model = %model.name, "fetching registered model permissions");
        model.permissions = Some(self.client.get_permissions(&PermissionTarget::RegisteredModel(id))?);
        Ok(())
    }
}
