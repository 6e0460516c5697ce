//! Entities shared by the unit tests.

use serde_json::json;

use crate::api::{
    artifact::FileInfo,
    experiment::Experiment,
    model::{ModelVersion, RegisteredModel},
    run::Run,
};
use crate::backend::memory::InMemory;
use crate::RunId;

pub fn registered_model(name: &str, latest: &[u64]) -> RegisteredModel {
    let latest: Vec<ModelVersion> = latest.iter().map(|v| model_version(name, *v)).collect();
    serde_json::from_value(json!({
        "name": name,
        "id": "c0ffee",
        "creation_timestamp": 1700000000123i64,
        "last_updated_timestamp": 1700000060000i64,
        "user_id": "me@example.com",
        "description": "Scores card transactions",
        "tags": [{ "key": "mlflow.domain", "value": "fraud" }, { "key": "team", "value": "risk" }],
        "aliases": [{ "alias": "champion", "version": "2" }],
        "latest_versions": latest
    }))
    .unwrap()
}

pub fn run_id(version: u64) -> RunId {
    RunId::from(format!("run-{}", version))
}

pub fn model_version(name: &str, version: u64) -> ModelVersion {
    serde_json::from_value(json!({
        "name": name,
        "version": version.to_string(),
        "creation_timestamp": 1700000000123i64 + version as i64,
        "last_updated_timestamp": 1700000060000i64,
        "current_stage": "None",
        "source": format!("dbfs:/databricks/mlflow-tracking/7/run-{}/artifacts/model", version),
        "run_id": run_id(version),
        "status": "READY",
        "tags": [{ "key": "validated", "value": "true" }]
    }))
    .unwrap()
}

/// The `mlflow.log-model.history` tag value of a run that logged one
/// sklearn model at `model`.
pub fn model_history(version: u64) -> String {
    json!([{
        "run_id": run_id(version),
        "artifact_path": "model",
        "utc_time_created": "2023-11-14 22:13:20.123456",
        "flavors": {
            "python_function": { "loader_module": "mlflow.sklearn", "python_version": "3.10.12" },
            "sklearn": { "sklearn_version": "1.2.2", "pickled_model": "model.pkl", "serialization_format": "cloudpickle" }
        },
        "mlflow_version": "2.9.2",
        "databricks_runtime": "14.2.x-cpu-ml-scala2.12",
        "model_uuid": "5b1f",
        "signature": {
            "inputs": "[{\"type\": \"double\", \"name\": \"amount\"}]",
            "outputs": "[{\"type\": \"long\"}]"
        },
        "saved_input_example_info": { "artifact_path": "input_example.json", "type": "dataframe", "pandas_orient": "split" }
    }])
    .to_string()
}

pub fn run(version: u64) -> Run {
    serde_json::from_value(json!({
        "info": {
            "run_id": run_id(version),
            "run_name": format!("train-{}", version),
            "experiment_id": "7",
            "user_id": "me@example.com",
            "status": "FINISHED",
            "start_time": 1700000000000i64,
            "end_time": 1700000100000i64,
            "artifact_uri": format!("dbfs:/databricks/mlflow-tracking/7/run-{}/artifacts", version),
            "lifecycle_stage": "active"
        },
        "data": {
            "params": [{ "key": "alpha", "value": "0.1" }],
            "metrics": [{ "key": "rmse", "value": 0.25, "timestamp": 1700000000000i64, "step": 3 }],
            "tags": [
                { "key": "mlflow.databricks.gitRepoUrl", "value": "https://github.com/org/fraud" },
                { "key": "mlflow.databricks.cluster.info", "value": "{\"cluster_name\":\"ml\",\"spark_version\":\"13.3.x\",\"autoscale\":{\"min_workers\":1}}" },
                { "key": "mlflow.source.type", "value": "NOTEBOOK" },
                { "key": "mlflow.runName", "value": format!("train-{}", version) },
                { "key": "sparkDatasourceInfo", "value": "path=dbfs:/data/tx,version=12,format=delta\npath=dbfs:/data/cards,format=parquet" },
                { "key": "mlflow.log-model.history", "value": model_history(version) },
                { "key": "team", "value": "risk" }
            ]
        }
    }))
    .unwrap()
}

pub fn experiment() -> Experiment {
    serde_json::from_value(json!({
        "experiment_id": "7",
        "name": "/Users/me@example.com/fraud",
        "artifact_location": "dbfs:/databricks/mlflow-tracking/7",
        "lifecycle_stage": "active",
        "creation_time": 1690000000000i64,
        "last_update_time": 1700000000000i64,
        "tags": [{ "key": "mlflow.ownerEmail", "value": "me@example.com" }, { "key": "project", "value": "fraud" }]
    }))
    .unwrap()
}

/// A registry holding `name` with `versions`, each with its own run and
/// a two file model directory.
pub fn registry(name: &str, versions: &[u64]) -> InMemory {
    let latest = versions.last().map(|v| vec![*v]).unwrap_or_default();
    let mut client = InMemory::new()
        .with_registered_model(registered_model(name, &latest))
        .with_experiment(experiment());
    for version in versions {
        let id = run_id(*version);
        client = client
            .with_model_version(model_version(name, *version))
            .with_run(run(*version))
            .with_artifact(&id, FileInfo::dir("model"))
            .with_artifact(&id, FileInfo::file("model/MLmodel", 10))
            .with_artifact(&id, FileInfo::dir("model/data"))
            .with_artifact(&id, FileInfo::file("model/data/model.pkl", 20));
    }
    client
}
