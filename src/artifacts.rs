//! Storage footprint of a run's artifact tree.

use serde::Serialize;

use crate::{
    api::{client::Client, error::FetchResult},
    RunId,
};

/// How many directory levels below the root are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDepth {
    Unbounded,
    Levels(usize),
}

impl MaxDepth {
    /// Negative levels mean no limit.
    pub fn from_level(level: i32) -> Self {
        usize::try_from(level)
            .map(MaxDepth::Levels)
            .unwrap_or(MaxDepth::Unbounded)
    }

    /// Whether a directory `depth` levels below the root may be listed.
    fn allows(self, depth: usize) -> bool {
        match self {
            MaxDepth::Unbounded => true,
            MaxDepth::Levels(levels) => depth < levels,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactNode {
    pub path: String,
    pub is_dir: bool,
    pub num_bytes: u64,
    pub num_files: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ArtifactNode>,
    /// A directory left unlisted because of the depth limit.
    #[serde(skip_serializing_if = "is_false")]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub run_id: RunId,
    pub root_path: String,
    pub total_bytes: u64,
    pub total_files: u64,
    /// Totals only cover the listed part of the tree.
    #[serde(skip_serializing_if = "is_false")]
    pub truncated: bool,
    pub tree: ArtifactNode,
}

/// Walks the artifact tree of `run` below `root_path`.
///
/// The first failing listing aborts the walk; sizes are summed bottom-up
/// so the listing order has no effect on the totals.
pub fn walk(client: &mut dyn Client, run: &RunId, root_path: &str, max_depth: MaxDepth) -> FetchResult<ArtifactSummary> {
    let tree = walk_dir(client, run, root_path, 0, max_depth)?;
    let summary = ArtifactSummary {
        run_id: run.clone(),
        root_path: root_path.to_owned(),
        total_bytes: tree.num_bytes,
        total_files: tree.num_files,
        truncated: tree.is_truncated(),
        tree,
    };
    tracing::debug!(
        run_id = %run,
        root_path,
        total_bytes = summary.total_bytes,
        total_files = summary.total_files,
        "walked artifacts"
    );
    Ok(summary)
}

fn walk_dir(client: &mut dyn Client, run: &RunId, path: &str, depth: usize, max_depth: MaxDepth) -> FetchResult<ArtifactNode> {
    let mut node = ArtifactNode {
        path: path.to_owned(),
        is_dir: true,
        num_bytes: 0,
        num_files: 0,
        children: Vec::new(),
        truncated: false,
    };
    if !max_depth.allows(depth) {
        node.truncated = true;
        return Ok(node);
    }
    for file in client.list_artifacts(run, path)? {
        let child = if file.is_dir {
            walk_dir(client, run, &file.path, depth + 1, max_depth)?
        } else {
            ArtifactNode {
                path: file.path,
                is_dir: false,
                num_bytes: file.file_size.and_then(|size| u64::try_from(size).ok()).unwrap_or(0),
                num_files: 1,
                children: Vec::new(),
                truncated: false,
            }
        };
        node.num_bytes += child.num_bytes;
        node.num_files += child.num_files;
        node.children.push(child);
    }
    Ok(node)
}

impl ArtifactNode {
    fn is_truncated(&self) -> bool {
        self.truncated || self.children.iter().any(ArtifactNode::is_truncated)
    }
}
