use serde::{Deserialize, Serialize};

use crate::{
    api::{KeyValue, KeyValues, LifecycleStage},
    enrich::time::Timestamp,
    ExperimentId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: ExperimentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_stage: Option<LifecycleStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<Timestamp>,
    #[serde(default)]
    pub tags: KeyValues<ExperimentTag>,
}

pub type ExperimentTag = KeyValue;
