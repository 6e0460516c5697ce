//! Builds the section tree of an audit report.
//!
//! A [`Document`] holds everything a report is made of: the aggregated
//! registry entities, the version the report focuses on, that version's
//! run and, for reports anchored on a model URI, the logged model itself.
//! [`Document::tree`] lays it out in a fixed order:
//!
//! Overview, MLflow Model, Registered Model, Registered Model Version,
//! Run and Experiment. Sections whose entity is absent are left out.

pub mod markdown;
pub mod tree;

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    aggregate::{AggregateOptions, Aggregator, ModelAggregate, VersionRun},
    api::{error::ReportError, f64_or_str, id::VersionNumber, permission::Permissions},
    artifacts::{self, ArtifactSummary, MaxDepth},
    enrich::{links::Links, ExperimentRecord, ModelVersionRecord, RegisteredModelRecord, RunRecord},
    mlmodel::{self, ModelArtifact, ModelFile, ModelManifest, ModelUri},
    tags::{RunTagCategory, Tags, RUN_TAG_RULES, SYSTEM_TAG_RULES},
};

use self::tree::{primitive_text, Node, Section, Table, Tree, KEY_COLUMNS, TAG_COLUMNS};

pub const SPARK_DATASOURCE_INFO: &str = "sparkDatasourceInfo";
pub const CLUSTER_INFO: &str = "mlflow.databricks.cluster.info";
pub const CLUSTER_LIBRARIES: &str = "mlflow.databricks.cluster.libraries";

// run tag categories shown even when empty
const ALWAYS_SHOWN: &[RunTagCategory] = &[RunTagCategory::OtherSystem, RunTagCategory::User];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_file: Option<ModelFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<ModelAggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_version: Option<VersionNumber>,
    /// Run of the focus version, or of the model file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<VersionRun>,
}

/// Report on a registered model, focused on its highest version.
pub fn build_registered_model_report(
    aggregator: &mut Aggregator<'_>,
    name: &str,
    options: &AggregateOptions,
) -> Result<Document, ReportError> {
    let aggregate = aggregator.normalized(name, options)?;
    Ok(Document::for_registered_model(aggregate))
}

/// Report on the model a `models:/` or `runs:/` URI points at.
pub fn build_model_report(
    aggregator: &mut Aggregator<'_>,
    uri: &str,
    options: &AggregateOptions,
) -> Result<Document, ReportError> {
    let uri: ModelUri = uri.parse()?;
    let resolved = mlmodel::resolve(aggregator.client(), &uri)?;
    debug!(uri = %uri, run_id = %resolved.run_id, artifact_path = %resolved.artifact_path, "resolved model");

    let fetched_run = aggregator.client().get_run(&resolved.run_id)?;
    let artifact = ModelArtifact::from_run(&fetched_run, &resolved.artifact_path)?;
    let flavor = artifact.flavor()?;
    let size = artifacts::walk(aggregator.client(), &resolved.run_id, &resolved.artifact_path, MaxDepth::Unbounded)?;
    let model_file = ModelFile {
        manifest: ModelManifest::new(&resolved),
        artifact,
        flavor,
        size_bytes: size.total_bytes,
    };

    let mut aggregate = None;
    let mut focus_version = None;
    if let Some(version) = &resolved.version {
        let mut model = aggregator.normalized(&version.name, options)?;
        let record = aggregator.enricher().enrich(version);
        model.insert_version(record);
        focus_version = Some(version.version);
        aggregate = Some(model);
    }
    let focus_run = focus_version.and_then(|version| aggregate.as_ref()?.version_runs.get(&version).cloned());
    let run = match focus_run {
        Some(run) => run,
        None => aggregator.complete_run(&fetched_run, options)?,
    };

    info!(uri = %uri, "built model report");
    Ok(Document {
        title: format!("MLflow Model: _{}_", uri),
        model_file: Some(model_file),
        aggregate,
        focus_version,
        run: Some(run),
    })
}

impl Document {
    pub fn for_registered_model(aggregate: ModelAggregate) -> Self {
        let focus_version = aggregate.versions.last().map(|version| version.version);
        let run = focus_version.and_then(|version| aggregate.version_runs.get(&version).cloned());
        Document {
            title: format!("MLflow Registered Model: _{}_", aggregate.registered_model.name),
            model_file: None,
            aggregate: Some(aggregate),
            focus_version,
            run,
        }
    }

    pub fn focus(&self) -> Option<&ModelVersionRecord> {
        self.aggregate.as_ref()?.version(self.focus_version?)
    }

    pub fn tree(&self) -> Result<Tree, ReportError> {
        let mut sections = Vec::new();
        match (&self.model_file, &self.aggregate) {
            (Some(model_file), _) => sections.push(model_overview(model_file)?),
            (None, Some(aggregate)) => sections.push(registered_model_overview(aggregate, self.focus_version)),
            (None, None) => {}
        }
        if let Some(model_file) = &self.model_file {
            sections.push(model_section(model_file)?);
        }
        if let Some(aggregate) = &self.aggregate {
            sections.push(registered_model_section(&aggregate.registered_model)?);
        }
        if let Some(version) = self.focus() {
            sections.push(model_version_section(version)?);
        }
        if let Some(run) = &self.run {
            sections.push(run_section(&run.run, run.artifacts.as_ref())?);
            sections.push(experiment_section(&run.experiment)?);
        }
        Ok(Tree {
            title: self.title.clone(),
            sections,
        })
    }

    pub fn write_markdown<W: Write>(&self, mut out: W) -> Result<(), ReportError> {
        markdown::render(&self.tree()?, &mut out)?;
        Ok(())
    }

    /// Dumps the document's data as pretty JSON.
    pub fn write_data<W: Write>(&self, out: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(out, self)?;
        Ok(())
    }
}

fn object<T: Serialize>(value: &T) -> Result<Map<String, Value>, ReportError> {
    match serde_json::to_value(value)? {
        Value::Object(object) => Ok(object),
        _ => Ok(Map::new()),
    }
}

fn thousands(number: u64) -> String {
    let digits = number.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

// OVERVIEW

fn model_overview(model_file: &ModelFile) -> Result<Section, ReportError> {
    let artifact = &model_file.artifact;
    let flavor = &model_file.flavor;
    let fields = vec![
        ("model_uri", model_file.manifest.model_uri.clone()),
        ("flavor", flavor.flavor.clone()),
        ("flavor_version", flavor.version.clone()),
        ("mlflow_version", artifact.mlflow_version.clone().unwrap_or_default()),
        ("size_bytes", thousands(model_file.size_bytes)),
        ("databricks_runtime", artifact.databricks_runtime.clone().unwrap_or_default()),
        ("time_created", artifact.time_created().unwrap_or_default().to_owned()),
    ];
    let uris = Table::key_value(["URI type", "URI"], model_file.manifest.model_uris.rows());
    Ok(Section::new("Overview")
        .with_section(Section::table("MLflow Model", Table::key_value(KEY_COLUMNS, fields)))
        .with_section(Section::table("MLflow Model URIs", uris)))
}

fn registered_model_overview(aggregate: &ModelAggregate, focus: Option<VersionNumber>) -> Section {
    let summary = Table::key_value(
        KEY_COLUMNS,
        vec![
            ("name", aggregate.registered_model.name.clone()),
            ("versions", aggregate.versions.len().to_string()),
            ("focus_version", focus.map(|v| v.to_string()).unwrap_or_default()),
        ],
    );
    let mut versions = Table::new(&["Version", "Status", "Stage", "Run ID", "Created"]);
    for version in &aggregate.versions {
        versions = versions.row(vec![
            version.version.to_string(),
            version.status.clone().unwrap_or_default(),
            version.current_stage.clone().unwrap_or_default(),
            version.run_id.as_ref().map(ToString::to_string).unwrap_or_default(),
            version.creation_timestamp.as_ref().map(ToString::to_string).unwrap_or_default(),
        ]);
    }
    let mut overview = Section::new("Overview")
        .with_section(Section::table("Registered Model", summary))
        .with_section(Section::table("Versions", versions));
    if !aggregate.omitted_runs.is_empty() {
        let mut omitted = Table::new(&["Version", "Run ID", "Reason"]);
        for omission in &aggregate.omitted_runs {
            omitted = omitted.row(vec![
                omission.version.to_string(),
                omission.run_id.as_ref().map(ToString::to_string).unwrap_or_default(),
                omission.reason.clone(),
            ]);
        }
        overview.push(Section::table("Omitted Runs", omitted));
    }
    overview
}

// MLFLOW MODEL

fn model_section(model_file: &ModelFile) -> Result<Section, ReportError> {
    let artifact = &model_file.artifact;
    let mut flavors =
        Section::new("Flavors").with_section(Section::table("Flavor", Table::primitives(&object(&model_file.flavor)?)));
    for (name, fields) in &artifact.flavors {
        flavors.push(Section::table(name.as_str(), Table::primitives(fields)));
    }
    Ok(Section::new("MLflow Model")
        .with_section(Section::table("Details", Table::primitives(&object(artifact)?)))
        .with_section(flavors)
        .with_section(signature_section(artifact.signature.as_ref()))
        .with_section(match &artifact.saved_input_example_info {
            Some(Value::Object(info)) => Section::table("Input Example", Table::primitives(info)),
            _ => Section::not_present("Input Example"),
        }))
}

#[derive(serde::Deserialize)]
struct ColumnSpec {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Signature parts hold their column specs as JSON text.
fn signature_section(signature: Option<&Value>) -> Section {
    let signature = match signature {
        Some(Value::Object(signature)) => signature,
        _ => return Section::not_present("Signature"),
    };
    let mut section = Section::new("Signature");
    for (part, spec) in signature {
        let columns = spec
            .as_str()
            .and_then(|text| serde_json::from_str::<Vec<ColumnSpec>>(text).ok());
        let table = match columns {
            Some(columns) => {
                let mut table = Table::new(&["Name", "Type"]);
                for column in columns {
                    table = table.row(vec![column.name.unwrap_or_default(), column.kind.unwrap_or_default()]);
                }
                table
            }
            None => Table::key_value(KEY_COLUMNS, primitive_text(spec).map(|text| (part.as_str(), text))),
        };
        section.push(Section::table(part.as_str(), table));
    }
    section
}

// REGISTRY

fn links_section(links: &Links) -> Option<Section> {
    if links.is_empty() {
        return None;
    }
    let rows = links
        .ui
        .iter()
        .map(|ui| ("ui", ui.clone()))
        .chain(links.api.iter().map(|api| ("api", api.clone())));
    Some(Section::table("Links", Table::key_value(KEY_COLUMNS, rows)))
}

/// Tags split into system and user tags.
fn system_tags_section(tags: &Tags) -> Section {
    if tags.is_empty() {
        return Section::not_present("Tags");
    }
    let mut section = Section::new("Tags");
    for (category, tags) in SYSTEM_TAG_RULES.classify(tags) {
        section.push(Section::table(category.title(), Table::key_value(TAG_COLUMNS, tags)));
    }
    section
}

fn permissions_section(permissions: &Permissions) -> Section {
    let mut table = Table::new(&["Principal", "Permissions"]);
    for entry in &permissions.access_control_list {
        let levels: Vec<&str> = entry
            .all_permissions
            .iter()
            .map(|permission| permission.permission_level.as_str())
            .collect();
        table = table.row(vec![entry.principal().to_owned(), levels.join(", ")]);
    }
    Section::table("Permissions", table)
}

fn registered_model_section(model: &RegisteredModelRecord) -> Result<Section, ReportError> {
    let mut section = Section::new("Registered Model").with_section(Section::table("Details", Table::primitives(&object(model)?)));
    if let Some(links) = links_section(&model.links) {
        section.push(links);
    }
    if !model.aliases.is_empty() {
        section.push(Section::table("Aliases", Table::key_value(["Alias", "Version"], model.aliases.clone())));
    }
    section.push(system_tags_section(&model.tags));
    if let Some(permissions) = &model.permissions {
        section.push(permissions_section(permissions));
    }
    Ok(section)
}

fn model_version_section(version: &ModelVersionRecord) -> Result<Section, ReportError> {
    let mut section =
        Section::new("Registered Model Version").with_section(Section::table("Details", Table::primitives(&object(version)?)));
    if let Some(links) = links_section(&version.links) {
        section.push(links);
    }
    section.push(Section::table("Tags", Table::key_value(TAG_COLUMNS, version.tags.clone())));
    Ok(section)
}

// RUN

fn run_section(run: &RunRecord, artifacts: Option<&ArtifactSummary>) -> Result<Section, ReportError> {
    let mut section = Section::new("Run").with_section(Section::table("Info", Table::primitives(&object(&run.info)?)));
    if let Some(links) = links_section(&run.links) {
        section.push(links);
    }
    section.push(Section::table("Params", Table::key_value(["Param", "Value"], run.data.params.clone())));
    let metrics = run.data.metrics.iter().map(|(key, value)| (key.as_str(), f64_or_str::text(*value)));
    section.push(Section::table("Metrics", Table::key_value(["Metric", "Value"], metrics)));
    section.push(inputs_section(run)?);
    if let Some(artifacts) = artifacts {
        section.push(artifacts_section(artifacts));
    }
    section.push(run_tags_section(&run.data.tags));
    Ok(section)
}

fn inputs_section(run: &RunRecord) -> Result<Section, ReportError> {
    let inputs = match &run.inputs {
        Some(inputs) if !inputs.dataset_inputs.is_empty() => inputs,
        _ => return Ok(Section::not_present("Inputs")),
    };
    let mut section = Section::new("Inputs");
    for input in &inputs.dataset_inputs {
        section.push(Section::table(input.dataset.name.as_str(), Table::primitives(&object(&input.dataset)?)));
    }
    Ok(section)
}

fn artifacts_section(artifacts: &ArtifactSummary) -> Section {
    let root = if artifacts.root_path.is_empty() { "/" } else { artifacts.root_path.as_str() };
    let rows = vec![
        ("root_path", root.to_owned()),
        ("total_bytes", thousands(artifacts.total_bytes)),
        ("total_files", artifacts.total_files.to_string()),
        ("truncated", artifacts.truncated.to_string()),
    ];
    Section::table("Artifacts", Table::key_value(KEY_COLUMNS, rows))
}

fn run_tags_section(tags: &Tags) -> Section {
    if tags.is_empty() {
        return Section::not_present("Tags");
    }
    let mut section = Section::new("Tags");
    for (category, tags) in RUN_TAG_RULES.classify(tags) {
        if tags.is_empty() && !ALWAYS_SHOWN.contains(&category) {
            continue;
        }
        section.push(Section::table(category.title(), Table::key_value(TAG_COLUMNS, tags)));
    }
    section.push(
        Section::new("Exploded Tags")
            .with_section(spark_datasource_section(tags.get(SPARK_DATASOURCE_INFO)))
            .with_section(cluster_info_section(tags.get(CLUSTER_INFO)))
            .with_section(cluster_libraries_section(tags.get(CLUSTER_LIBRARIES))),
    );
    section
}

/// One datasource per line, each a comma separated list of `key=value`.
fn spark_datasource_section(value: Option<&String>) -> Section {
    let parsed: Option<Vec<Table>> = value.and_then(|value| {
        value
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let pairs: Option<Vec<(&str, &str)>> = line.split(',').map(|pair| pair.split_once('=')).collect();
                pairs.map(|pairs| {
                    Table::key_value(KEY_COLUMNS, pairs.into_iter().map(|(key, value)| (key.trim(), value.trim())))
                })
            })
            .collect()
    });
    match parsed {
        Some(tables) if !tables.is_empty() => tables
            .into_iter()
            .fold(Section::new(SPARK_DATASOURCE_INFO), |section, table| section.with(Node::Table(table))),
        _ => Section::not_present(SPARK_DATASOURCE_INFO),
    }
}

fn cluster_info_section(value: Option<&String>) -> Section {
    match value.and_then(|value| serde_json::from_str::<Map<String, Value>>(value).ok()) {
        Some(info) => Section::table("Cluster Info", Table::primitives(&info)),
        None => Section::not_present("Cluster Info"),
    }
}

/// Libraries as `{"installable": [{"pypi": {"package": ..}}, {"jar": ..}]}`.
fn cluster_libraries_section(value: Option<&String>) -> Section {
    let installable = value
        .and_then(|value| serde_json::from_str::<Value>(value).ok())
        .and_then(|mut libraries| match libraries.get_mut("installable").map(Value::take) {
            Some(Value::Array(installable)) => Some(installable),
            _ => None,
        });
    let installable = match installable {
        Some(installable) => installable,
        None => return Section::not_present("Cluster Libraries"),
    };
    let mut table = Table::new(&["Type", "Library"]);
    for library in installable.iter().filter_map(Value::as_object) {
        for (kind, spec) in library {
            let text = match spec {
                Value::Object(fields) => fields
                    .iter()
                    .filter_map(|(key, value)| primitive_text(value).map(|text| format!("{}={}", key, text)))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => primitive_text(other).unwrap_or_default(),
            };
            table = table.row(vec![kind.clone(), text]);
        }
    }
    Section::table("Cluster Libraries", table)
}

// EXPERIMENT

fn experiment_section(experiment: &ExperimentRecord) -> Result<Section, ReportError> {
    let mut section =
        Section::new("Experiment").with_section(Section::table("Details", Table::primitives(&object(experiment)?)));
    if let Some(links) = links_section(&experiment.links) {
        section.push(links);
    }
    section.push(system_tags_section(&experiment.tags));
    if let Some(permissions) = &experiment.permissions {
        section.push(permissions_section(permissions));
    }
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{
            error::{FetchErrorKind, SchemaError},
            permission::{AccessControl, Permission},
            run::Metric,
        },
        backend::memory::{InMemory, Resource},
        enrich::{links::LinkBuilder, Enricher},
        fixtures, RunId,
    };
    use serde_json::json;

    fn with_runs() -> AggregateOptions {
        AggregateOptions {
            include_run: true,
            include_all_versions: true,
            ..AggregateOptions::default()
        }
    }

    fn titles(tree: &Tree) -> Vec<&str> {
        tree.sections.iter().map(|section| section.title.as_str()).collect()
    }

    fn table<'t>(section: &'t Section, path: &[&str]) -> &'t Table {
        let mut section = section;
        for title in path {
            section = section
                .subsection(title)
                .unwrap_or_else(|| panic!("no section {} in {}", title, section.title));
        }
        section
            .first_table()
            .unwrap_or_else(|| panic!("no table in {}", section.title))
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn registered_model_report_focuses_the_highest_version() {
        let mut client = fixtures::registry("fraud", &[1, 3, 2]);
        let document = build_registered_model_report(&mut Aggregator::new(&mut client), "fraud", &with_runs()).unwrap();
        assert_eq!(document.focus_version, Some(VersionNumber::new(3)));
        assert_eq!(document.run.as_ref().map(|run| &run.run.info.run_id), Some(&fixtures::run_id(3)));

        let tree = document.tree().unwrap();
        assert_eq!(
            titles(&tree),
            ["Overview", "Registered Model", "Registered Model Version", "Run", "Experiment"]
        );
        let overview = &tree.sections[0];
        assert_eq!(table(overview, &["Registered Model"]).get("versions"), Some("3"));
        assert_eq!(table(overview, &["Versions"]).rows.len(), 3);
    }

    #[test]
    fn absent_entities_are_left_out() {
        let mut client = fixtures::registry("fraud", &[1]);
        let options = AggregateOptions::default();
        let document = build_registered_model_report(&mut Aggregator::new(&mut client), "fraud", &options).unwrap();
        let tree = document.tree().unwrap();
        assert_eq!(titles(&tree), ["Overview", "Registered Model"]);
    }

    #[test]
    fn omitted_runs_are_listed_in_the_overview() {
        let mut client = fixtures::registry("fraud", &[1, 2]).fail(Resource::Run(fixtures::run_id(2)), FetchErrorKind::NotFound);
        let document = build_registered_model_report(&mut Aggregator::new(&mut client), "fraud", &with_runs()).unwrap();
        assert!(document.run.is_none());
        let tree = document.tree().unwrap();
        assert_eq!(titles(&tree), ["Overview", "Registered Model", "Registered Model Version"]);
        let omitted = table(&tree.sections[0], &["Omitted Runs"]);
        assert_eq!(omitted.rows[0][..2], ["2".to_string(), "run-2".to_string()]);
    }

    #[test]
    fn details_hold_only_primitive_fields() {
        let mut client = fixtures::registry("fraud", &[1]);
        let enricher = Enricher::new(LinkBuilder::new("https://host"));
        let mut aggregator = Aggregator::new(&mut client).with_enricher(enricher);
        let document = build_registered_model_report(&mut aggregator, "fraud", &with_runs()).unwrap();
        let tree = document.tree().unwrap();

        let model = tree.section("Registered Model").unwrap();
        let details = table(model, &["Details"]);
        assert_eq!(details.get("name"), Some("fraud"));
        assert_eq!(details.get("creation_timestamp"), Some("2023-11-14 22:13:20"));
        assert_eq!(details.get("catalog_scoped"), Some("false"));
        assert_eq!(details.get("tags"), None);
        assert_eq!(details.get("links"), None);
        assert_eq!(table(model, &["Links"]).get("ui"), Some("https://host/#mlflow/models/fraud"));
        assert_eq!(table(model, &["Aliases"]).get("champion"), Some("2"));
        assert_eq!(table(model, &["Tags", "MLflow System Tags"]).get("mlflow.domain"), Some("fraud"));
        assert_eq!(table(model, &["Tags", "User Tags"]).get("team"), Some("risk"));

        let version = tree.section("Registered Model Version").unwrap();
        assert_eq!(table(version, &["Tags"]).get("validated"), Some("true"));
    }

    #[test]
    fn missing_tags_render_not_present() {
        let mut model = fixtures::registered_model("bare", &[]);
        model.tags = Default::default();
        let mut client = InMemory::new().with_registered_model(model);
        let document =
            build_registered_model_report(&mut Aggregator::new(&mut client), "bare", &AggregateOptions::default()).unwrap();
        let tree = document.tree().unwrap();
        let tags = tree.section("Registered Model").unwrap().subsection("Tags").unwrap();
        assert!(tags.is_not_present());
    }

    #[test]
    fn run_tags_are_classified_and_exploded() {
        let mut client = fixtures::registry("fraud", &[1]);
        let document = build_registered_model_report(&mut Aggregator::new(&mut client), "fraud", &with_runs()).unwrap();
        let tree = document.tree().unwrap();
        let run = tree.section("Run").unwrap();

        assert_eq!(table(run, &["Params"]).get("alpha"), Some("0.1"));
        assert_eq!(table(run, &["Metrics"]).get("rmse"), Some("0.25"));
        assert_eq!(table(run, &["Artifacts"]).get("total_bytes"), Some("30"));
        assert!(run.subsection("Inputs").unwrap().is_not_present());

        let tags = run.subsection("Tags").unwrap();
        let categories: Vec<&str> = tags
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Section(section) => Some(section.title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            categories,
            ["Git Repo Tags", "Cluster Tags", "Source Tags", "Other System Tags", "User Tags", "Exploded Tags"]
        );
        assert_eq!(table(tags, &["User Tags"]).get("team"), Some("risk"));

        let exploded = tags.subsection("Exploded Tags").unwrap();
        let datasources = exploded.subsection(SPARK_DATASOURCE_INFO).unwrap();
        assert_eq!(datasources.children.len(), 2);
        assert_eq!(table(exploded, &[SPARK_DATASOURCE_INFO]).get("version"), Some("12"));
        let cluster = table(exploded, &["Cluster Info"]);
        assert_eq!(cluster.get("cluster_name"), Some("ml"));
        assert_eq!(cluster.get("autoscale"), None);
        assert!(exploded.subsection("Cluster Libraries").unwrap().is_not_present());
    }

    #[test]
    fn exploded_tags_tolerate_bad_values() {
        let bad = "no pairs here".to_string();
        assert!(spark_datasource_section(Some(&bad)).is_not_present());
        assert!(cluster_info_section(Some(&bad)).is_not_present());
        assert!(cluster_libraries_section(Some(&bad)).is_not_present());
        assert!(spark_datasource_section(None).is_not_present());

        let libraries = json!({
            "installable": [{ "pypi": { "package": "xgboost==2.0" } }, { "jar": "dbfs:/libs/a.jar" }]
        })
        .to_string();
        let section = cluster_libraries_section(Some(&libraries));
        let libraries = section.first_table().unwrap();
        assert_eq!(libraries.get("pypi"), Some("package=xgboost==2.0"));
        assert_eq!(libraries.get("jar"), Some("dbfs:/libs/a.jar"));
    }

    #[test]
    fn model_report_layout() {
        let mut client = fixtures::registry("fraud", &[1, 2]);
        let document = build_model_report(&mut Aggregator::new(&mut client), "models:/fraud/1", &with_runs()).unwrap();
        assert_eq!(document.focus_version, Some(VersionNumber::new(1)));
        let tree = document.tree().unwrap();
        assert_eq!(tree.title, "MLflow Model: _models:/fraud/1_");
        assert_eq!(
            titles(&tree),
            ["Overview", "MLflow Model", "Registered Model", "Registered Model Version", "Run", "Experiment"]
        );

        let overview = &tree.sections[0];
        let model = table(overview, &["MLflow Model"]);
        let first: Vec<&str> = model.rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(
            first,
            ["model_uri", "flavor", "flavor_version", "mlflow_version", "size_bytes", "databricks_runtime", "time_created"]
        );
        assert_eq!(model.get("flavor"), Some("mlflow.sklearn"));
        assert_eq!(model.get("flavor_version"), Some("1.2.2"));
        assert_eq!(model.get("size_bytes"), Some("30"));
        assert_eq!(model.get("time_created"), Some("2023-11-14 22:13:20"));
        let uris = table(overview, &["MLflow Model URIs"]);
        assert_eq!(uris.get("run_uri"), Some("runs:/run-1/model"));
        assert_eq!(uris.get("registered_model_uri"), Some("models:/fraud/1"));

        let mlflow_model = tree.section("MLflow Model").unwrap();
        assert_eq!(table(mlflow_model, &["Details"]).get("model_uuid"), Some("5b1f"));
        assert_eq!(table(mlflow_model, &["Details"]).get("flavors"), None);
        assert_eq!(table(mlflow_model, &["Flavors", "Flavor"]).get("pickled_model"), Some("model.pkl"));
        assert_eq!(table(mlflow_model, &["Signature", "inputs"]).get("amount"), Some("double"));
        assert_eq!(table(mlflow_model, &["Input Example"]).get("type"), Some("dataframe"));

        let version = tree.section("Registered Model Version").unwrap();
        assert_eq!(table(version, &["Details"]).get("version"), Some("1"));
    }

    #[test]
    fn run_uri_report_has_no_registry_sections() {
        let mut client = fixtures::registry("fraud", &[1]);
        let document = build_model_report(&mut Aggregator::new(&mut client), "runs:/run-1/model", &AggregateOptions::default()).unwrap();
        let tree = document.tree().unwrap();
        assert_eq!(titles(&tree), ["Overview", "MLflow Model", "Run", "Experiment"]);
        assert_eq!(table(&tree.sections[0], &["MLflow Model URIs"]).get("registered_model_uri"), None);
    }

    #[test]
    fn model_report_failures_abort() {
        let mut client = fixtures::registry("fraud", &[1]);
        let error = build_model_report(&mut Aggregator::new(&mut client), "s3://bucket/model", &with_runs()).unwrap_err();
        assert!(matches!(error, ReportError::Schema(SchemaError::InvalidModelUri(_))));

        let error = build_model_report(&mut Aggregator::new(&mut client), "runs:/run-1/other", &with_runs()).unwrap_err();
        assert!(matches!(error, ReportError::Schema(SchemaError::ModelNotLogged { .. })));

        let mut client = client.fail(Resource::Run(RunId::from("run-1")), FetchErrorKind::Network);
        let error = build_model_report(&mut Aggregator::new(&mut client), "models:/fraud/1", &with_runs()).unwrap_err();
        assert!(matches!(error, ReportError::Fetch(ref fetch) if fetch.kind == FetchErrorKind::Network));
    }

    #[test]
    fn unsupported_flavors_abort_the_build() {
        let history = json!([{
            "run_id": "run-1",
            "artifact_path": "model",
            "flavors": {
                "python_function": { "loader_module": "mlflow.sklearn" },
                "sklearn": { "sklearn_version": "1.2.2" },
                "onnx": { "onnx_version": "1.15.0" }
            }
        }]);
        let mut run = fixtures::run(1);
        for tag in run.data.tags.iter_mut().filter(|tag| tag.key == mlmodel::LOG_MODEL_HISTORY) {
            tag.value = history.to_string();
        }
        let mut client = fixtures::registry("fraud", &[1]).with_run(run);
        let error = build_model_report(&mut Aggregator::new(&mut client), "runs:/run-1/model", &AggregateOptions::default())
            .unwrap_err();
        assert!(matches!(error, ReportError::Schema(SchemaError::UnsupportedFlavorCardinality(3))));
    }

    #[test]
    fn non_finite_metrics_keep_the_run() {
        let mut run = fixtures::run(1);
        run.data.metrics.push(serde_json::from_value::<Metric>(json!({ "key": "loss", "value": "NaN", "step": 3 })).unwrap());
        let mut client = fixtures::registry("fraud", &[1]).with_run(run);
        let document = build_registered_model_report(&mut Aggregator::new(&mut client), "fraud", &with_runs()).unwrap();
        assert!(document.aggregate.as_ref().unwrap().omitted_runs.is_empty());

        let tree = document.tree().unwrap();
        let metrics = table(tree.section("Run").unwrap(), &["Metrics"]);
        assert_eq!(metrics.get("loss"), Some("NaN"));
        assert_eq!(metrics.get("rmse"), Some("0.25"));

        let mut data = Vec::new();
        document.write_data(&mut data).unwrap();
        let data: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(data["run"]["run"]["data"]["metrics"]["loss"], "NaN");
    }

    #[test]
    fn permissions_list_one_row_per_principal() {
        let permission = |level: &str| Permission {
            permission_level: level.to_string(),
            inherited: false,
            inherited_from_object: Vec::new(),
        };
        let permissions = Permissions {
            access_control_list: vec![
                AccessControl {
                    user_name: Some("me@example.com".to_string()),
                    all_permissions: vec![permission("CAN_MANAGE"), permission("CAN_READ")],
                    ..AccessControl::default()
                },
                AccessControl {
                    service_principal_name: Some("deployer".to_string()),
                    all_permissions: vec![permission("CAN_READ")],
                    ..AccessControl::default()
                },
            ],
            ..Permissions::default()
        };
        let section = permissions_section(&permissions);
        let table = section.first_table().unwrap();
        assert_eq!(table.get("me@example.com"), Some("CAN_MANAGE, CAN_READ"));
        assert_eq!(table.get("deployer"), Some("CAN_READ"));
        assert!(permissions_section(&Permissions::default()).is_not_present());
    }

    #[test]
    fn markdown_and_data_output() {
        let mut client = fixtures::registry("fraud", &[1]);
        let document = build_model_report(&mut Aggregator::new(&mut client), "models:/fraud/1", &with_runs()).unwrap();

        let mut markdown = Vec::new();
        document.write_markdown(&mut markdown).unwrap();
        let markdown = String::from_utf8(markdown).unwrap();
        assert!(markdown.starts_with("# MLflow Model: _models:/fraud/1_\n"));
        assert!(markdown.contains("\n## Overview\n"));
        assert!(markdown.contains("| size_bytes | 30 |"));

        let mut data = Vec::new();
        document.write_data(&mut data).unwrap();
        let data: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(data["model_file"]["manifest"]["model_uri"], "models:/fraud/1");
        assert_eq!(data["focus_version"], "1");
        assert_eq!(data["aggregate"]["registered_model"]["tags"]["team"], "risk");
    }
}
