//! Normalized records built from fetched entities.
//!
//! Fetched entities are never modified. Enrichment builds a record with
//! tag and alias lists turned into mappings, timestamps in display form
//! and links synthesized from the normalized names. Records serialize to
//! a shape the raw entity types read back, and enriching such a read-back
//! entity gives the same record again.

pub mod links;
pub mod time;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::{
    api::{
        experiment::Experiment,
        id::VersionNumber,
        model::{ModelVersion, RegisteredModel},
        permission::Permissions,
        run::{Run, RunInfo, RunInputs},
        LifecycleStage,
    },
    tags::{self, Tags},
    ExperimentId, RunId,
};

use self::{
    links::{LinkBuilder, Links},
    time::{to_display, Timestamp},
};

/// Separator between catalog, schema and model in catalog-scoped names.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Whether `name` is qualified by a catalog and schema.
pub fn is_catalog_scoped(name: &str) -> bool {
    name.contains(NAMESPACE_SEPARATOR)
}

// keys records add on top of the upstream fields
const DERIVED_KEYS: &[&str] = &["catalog_scoped", "links", "permissions"];

fn upstream_extra(extra: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    extra
        .iter()
        .filter(|(key, _)| !DERIVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn no_links(links: &Links) -> bool {
    links.is_empty()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredModelRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` once stripped from the final record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_versions: Option<Vec<LatestVersion>>,
    pub tags: Tags,
    pub aliases: Tags,
    pub catalog_scoped: bool,
    #[serde(skip_serializing_if = "no_links")]
    pub links: Links,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// An entry of a registered model's latest versions.
///
/// Catalog-scoped models already report latest versions with mapping
/// shaped tags, so those entries are kept as fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LatestVersion {
    AsFetched(ModelVersion),
    Enriched(ModelVersionRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVersionRecord {
    pub name: String,
    pub version: VersionNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub tags: Tags,
    pub aliases: Vec<String>,
    pub catalog_scoped: bool,
    #[serde(skip_serializing_if = "no_links")]
    pub links: Links,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub info: RunInfo,
    pub data: RunDataRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<RunInputs>,
    #[serde(skip_serializing_if = "no_links")]
    pub links: Links,
}

/// Params, latest metric values and tags of a run, keyed by name. Tags
/// stay in one flat mapping; see [`crate::tags`] for their categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDataRecord {
    pub params: Tags,
    #[serde(serialize_with = "crate::api::f64_or_str::serialize_map")]
    pub metrics: BTreeMap<String, f64>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentRecord {
    pub experiment_id: ExperimentId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_stage: Option<LifecycleStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Timestamp>,
    pub tags: Tags,
    #[serde(skip_serializing_if = "no_links")]
    pub links: Links,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

/// Builds normalized records. Holds what enrichment needs besides the
/// entity itself.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    pub links: LinkBuilder,
}

/// Entities and records the [`Enricher`] accepts.
///
/// Records enrich to themselves.
pub trait Enrich {
    type Record;

    fn enrich(&self, enricher: &Enricher) -> Self::Record;
}

impl Enricher {
    pub fn new(links: LinkBuilder) -> Self {
        Enricher { links }
    }

    pub fn enrich<E: Enrich>(&self, entity: &E) -> E::Record {
        entity.enrich(self)
    }
}

impl Enrich for RegisteredModel {
    type Record = RegisteredModelRecord;

    fn enrich(&self, enricher: &Enricher) -> RegisteredModelRecord {
        let catalog_scoped = is_catalog_scoped(&self.name);
        RegisteredModelRecord {
            name: self.name.clone(),
            id: self.id.clone(),
            creation_timestamp: to_display(&self.creation_timestamp),
            last_updated_timestamp: to_display(&self.last_updated_timestamp),
            user_id: self.user_id.clone(),
            description: self.description.clone(),
            latest_versions: Some(self.latest_versions.iter().cloned().map(LatestVersion::AsFetched).collect()),
            tags: self.tags.to_map(),
            aliases: self.aliases.to_map(),
            catalog_scoped,
            links: enricher.links.registered_model(&self.name, catalog_scoped),
            permissions: None,
            extra: upstream_extra(&self.extra),
        }
    }
}

impl Enrich for RegisteredModelRecord {
    type Record = RegisteredModelRecord;

    fn enrich(&self, _: &Enricher) -> RegisteredModelRecord {
        self.clone()
    }
}

impl RegisteredModelRecord {
    /// Enriches the latest versions entries, except for catalog-scoped
    /// models whose entries stay as fetched.
    pub fn enrich_latest_versions(&mut self, enricher: &Enricher) {
        if self.catalog_scoped {
            return;
        }
        if let Some(latest) = self.latest_versions.as_mut() {
            for entry in latest.iter_mut() {
                if let LatestVersion::AsFetched(version) = entry {
                    *entry = LatestVersion::Enriched(enricher.enrich(version));
                }
            }
        }
    }
}

impl Enrich for ModelVersion {
    type Record = ModelVersionRecord;

    fn enrich(&self, enricher: &Enricher) -> ModelVersionRecord {
        let catalog_scoped = is_catalog_scoped(&self.name);
        ModelVersionRecord {
            name: self.name.clone(),
            version: self.version,
            creation_timestamp: to_display(&self.creation_timestamp),
            last_updated_timestamp: to_display(&self.last_updated_timestamp),
            user_id: self.user_id.clone(),
            current_stage: self.current_stage.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            run_id: self.run_id.clone(),
            status: self.status.clone(),
            status_message: self.status_message.clone(),
            tags: self.tags.to_map(),
            aliases: self.aliases.clone(),
            catalog_scoped,
            links: enricher.links.model_version(&self.name, self.version, catalog_scoped),
            extra: upstream_extra(&self.extra),
        }
    }
}

impl Enrich for ModelVersionRecord {
    type Record = ModelVersionRecord;

    fn enrich(&self, _: &Enricher) -> ModelVersionRecord {
        self.clone()
    }
}

impl Enrich for Run {
    type Record = RunRecord;

    fn enrich(&self, enricher: &Enricher) -> RunRecord {
        let mut info = self.info.clone();
        info.start_time = to_display(&info.start_time);
        info.end_time = to_display(&info.end_time);
        RunRecord {
            links: enricher.links.run(&info.experiment_id, &info.run_id),
            info,
            data: RunDataRecord {
                params: tags::to_map(&self.data.params),
                metrics: self
                    .data
                    .metrics
                    .iter()
                    .map(|metric| (metric.key.clone(), metric.value))
                    .collect(),
                tags: tags::to_map(&self.data.tags),
            },
            inputs: self.inputs.clone(),
        }
    }
}

impl Enrich for RunRecord {
    type Record = RunRecord;

    fn enrich(&self, _: &Enricher) -> RunRecord {
        self.clone()
    }
}

impl Enrich for Experiment {
    type Record = ExperimentRecord;

    fn enrich(&self, enricher: &Enricher) -> ExperimentRecord {
        ExperimentRecord {
            experiment_id: self.experiment_id.clone(),
            name: self.name.clone(),
            artifact_location: self.artifact_location.clone(),
            lifecycle_stage: self.lifecycle_stage,
            creation_time: to_display(&self.creation_time),
            last_update_time: to_display(&self.last_update_time),
            tags: self.tags.to_map(),
            links: enricher.links.experiment(&self.experiment_id),
            permissions: None,
        }
    }
}

impl Enrich for ExperimentRecord {
    type Record = ExperimentRecord;

    fn enrich(&self, _: &Enricher) -> ExperimentRecord {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registered_model(name: &str) -> RegisteredModel {
        serde_json::from_value(json!({
            "name": name,
            "creation_timestamp": 1700000000123i64,
            "last_updated_timestamp": "1700000060000",
            "user_id": "me@example.com",
            "tags": [{ "key": "mlflow.domain", "value": "fraud" }, { "key": "team", "value": "risk" }],
            "aliases": [{ "alias": "champion", "version": "2" }],
            "latest_versions": [{
                "name": name,
                "version": "2",
                "creation_timestamp": 1700000000123i64,
                "tags": [{ "key": "validated", "value": "true" }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn catalog_scoped_names() {
        assert!(is_catalog_scoped("cat.schema.model"));
        assert!(!is_catalog_scoped("plain_model"));
    }

    #[test]
    fn registered_model_is_normalized() {
        let enricher = Enricher::new(LinkBuilder::new("https://host"));
        let record = enricher.enrich(&registered_model("fraud"));
        assert_eq!(record.tags["team"], "risk");
        assert_eq!(record.aliases["champion"], "2");
        assert_eq!(record.creation_timestamp, Some(Timestamp::Display("2023-11-14 22:13:20".into())));
        assert_eq!(record.last_updated_timestamp, Some(Timestamp::Display("2023-11-14 22:14:20".into())));
        assert!(!record.catalog_scoped);
        assert_eq!(record.links.ui.as_deref(), Some("https://host/#mlflow/models/fraud"));
        assert!(matches!(record.latest_versions.as_deref(), Some([LatestVersion::AsFetched(_)])));
    }

    #[test]
    fn enriching_a_saved_record_again_changes_nothing() {
        let enricher = Enricher::new(LinkBuilder::new("https://host"));
        let mut record = enricher.enrich(&registered_model("fraud"));
        record.enrich_latest_versions(&enricher);

        let saved = serde_json::to_value(&record).unwrap();
        let reread: RegisteredModel = serde_json::from_value(saved).unwrap();
        let mut again = enricher.enrich(&reread);
        again.enrich_latest_versions(&enricher);
        assert_eq!(again, record);
        assert_eq!(enricher.enrich(&record), record);
    }

    #[test]
    fn latest_versions_of_catalog_models_stay_as_fetched() {
        let enricher = Enricher::default();
        let mut record = enricher.enrich(&registered_model("cat.schema.fraud"));
        assert!(record.catalog_scoped);
        record.enrich_latest_versions(&enricher);
        assert!(matches!(record.latest_versions.as_deref(), Some([LatestVersion::AsFetched(_)])));

        let mut record = enricher.enrich(&registered_model("fraud"));
        record.enrich_latest_versions(&enricher);
        match record.latest_versions.as_deref() {
            Some([LatestVersion::Enriched(version)]) => {
                assert_eq!(version.tags["validated"], "true");
                assert!(version.creation_timestamp.as_ref().map_or(false, Timestamp::is_display));
            }
            other => panic!("unexpected latest versions {:?}", other),
        }
    }

    #[test]
    fn run_keeps_flat_tags() {
        let run: Run = serde_json::from_value(json!({
            "info": {
                "run_id": "r1",
                "experiment_id": "7",
                "status": "FINISHED",
                "start_time": "1700000000123",
                "lifecycle_stage": "active"
            },
            "data": {
                "params": [{ "key": "alpha", "value": "0.1" }],
                "metrics": [{ "key": "rmse", "value": 0.5, "timestamp": 1700000000123i64, "step": 0 }],
                "tags": [{ "key": "mlflow.source.type", "value": "NOTEBOOK" }, { "key": "team", "value": "risk" }]
            }
        }))
        .unwrap();
        let record = Enricher::default().enrich(&run);
        assert_eq!(record.info.start_time, Some(Timestamp::Display("2023-11-14 22:13:20".into())));
        assert_eq!(record.info.end_time, None);
        assert_eq!(record.data.params["alpha"], "0.1");
        assert_eq!(record.data.metrics["rmse"], 0.5);
        assert_eq!(record.data.tags.len(), 2);
        assert_eq!(Enricher::default().enrich(&record), record);
    }

    #[test]
    fn experiment_tags_become_a_mapping() {
        let experiment: Experiment = serde_json::from_value(json!({
            "experiment_id": "7",
            "name": "/Users/me/fraud",
            "creation_time": 0,
            "tags": [{ "key": "mlflow.ownerEmail", "value": "me@example.com" }]
        }))
        .unwrap();
        let record = Enricher::default().enrich(&experiment);
        assert_eq!(record.tags["mlflow.ownerEmail"], "me@example.com");
        assert_eq!(record.creation_time, Some(Timestamp::Display("1970-01-01 00:00:00".into())));
    }
}
