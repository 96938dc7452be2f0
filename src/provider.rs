// src/provider.rs

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{AttributeDescriptor, AttributeValue, ProjectId, RawResults};

/// A pluggable set of attribute computations plus the scoring rule over
/// their merged output.
///
/// One provider instance is shared across all workers behind an `Arc`, so any
/// state built by `global_init` must be read-only for the rest of the run.
pub trait AttributeProvider: Send + Sync {
    /// Called exactly once, before any parallel work starts. Providers that
    /// need shared indices over the whole sample set build them here.
    fn global_init(&self, project_ids: &HashSet<ProjectId>) -> Result<()> {
        let _ = project_ids;
        Ok(())
    }

    /// One computation pass for one project. The result may be partial: not
    /// every declared attribute has to be present.
    fn run(&self, project_id: ProjectId, repo_root: &Path) -> Result<RawResults>;

    /// Derives the summary score from a merged result set.
    fn score(&self, merged: &RawResults) -> f64;

    /// Declared attributes, in column order.
    fn attributes(&self) -> &[AttributeDescriptor];

    fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes().iter().find(|a| a.name == name)
    }

    fn is_persistence_enabled(&self) -> bool {
        true
    }
}

/// One entry of the attribute manifest: column name, write-back flag, and
/// the attribute's weight in the score.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAttribute {
    pub name: String,
    #[serde(default = "default_persist")]
    pub persist: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_persist() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// File-backed provider used by the binary: each project directory under the
/// repo root carries a precomputed `attributes.json`, and a manifest declares
/// the attribute set. The score is the weighted sum of the numeric values.
pub struct ManifestProvider {
    descriptors: Vec<AttributeDescriptor>,
    weights: HashMap<String, f64>,
    persistence_enabled: bool,
}

impl ManifestProvider {
    pub fn new(attributes: Vec<ManifestAttribute>, persistence_enabled: bool) -> Self {
        let descriptors = attributes
            .iter()
            .map(|a| AttributeDescriptor {
                name: a.name.clone(),
                persist: a.persist,
            })
            .collect();
        let weights = attributes.into_iter().map(|a| (a.name, a.weight)).collect();
        Self {
            descriptors,
            weights,
            persistence_enabled,
        }
    }

    /// Loads a manifest: a JSON array of attribute declarations.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read attribute manifest {}", path.display()))?;
        let attributes: Vec<ManifestAttribute> = serde_json::from_str(&text)
            .with_context(|| format!("Malformed attribute manifest {}", path.display()))?;
        Ok(Self::new(attributes, true))
    }
}

impl AttributeProvider for ManifestProvider {
    fn run(&self, project_id: ProjectId, repo_root: &Path) -> Result<RawResults> {
        let path = repo_root
            .join(project_id.0.to_string())
            .join("attributes.json");
        let text = fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read attributes for project {} at {}",
                project_id,
                path.display()
            )
        })?;
        let values: RawResults = serde_json::from_str(&text)
            .with_context(|| format!("Malformed attribute file {}", path.display()))?;

        // Undeclared keys carry no weight and no column; drop them here so
        // downstream stages only ever see declared attributes.
        Ok(values
            .into_iter()
            .filter(|(name, _)| self.weights.contains_key(name))
            .collect())
    }

    fn score(&self, merged: &RawResults) -> f64 {
        merged
            .iter()
            .map(|(name, value)| {
                let weight = self.weights.get(name).copied().unwrap_or(0.0);
                weight * value.as_f64().unwrap_or(0.0)
            })
            .sum()
    }

    fn attributes(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    fn is_persistence_enabled(&self) -> bool {
        self.persistence_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manifest() -> Vec<ManifestAttribute> {
        vec![
            ManifestAttribute {
                name: "cpu".into(),
                persist: true,
                weight: 1.0,
            },
            ManifestAttribute {
                name: "coverage".into(),
                persist: false,
                weight: 2.0,
            },
        ]
    }

    fn write_project(root: &Path, id: i64, body: &str) {
        let dir = root.join(id.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("attributes.json"), body).unwrap();
    }

    #[test]
    fn run_reads_declared_attributes_and_drops_strays() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), 42, r#"{"cpu": 7, "coverage": 0.5, "stray": 99}"#);

        let provider = ManifestProvider::new(manifest(), true);
        let results = provider.run(ProjectId(42), tmp.path()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["cpu"], AttributeValue::Integer(7));
        assert_eq!(results["coverage"], AttributeValue::Float(0.5));
    }

    #[test]
    fn run_fails_for_missing_project_directory() {
        let tmp = TempDir::new().unwrap();
        let provider = ManifestProvider::new(manifest(), true);
        assert!(provider.run(ProjectId(7), tmp.path()).is_err());
    }

    #[test]
    fn score_is_weighted_sum_of_numeric_values() {
        let provider = ManifestProvider::new(manifest(), true);
        let merged: RawResults = [
            ("cpu".to_string(), AttributeValue::Integer(7)),
            ("coverage".to_string(), AttributeValue::Float(0.5)),
            ("gap".to_string(), AttributeValue::Null),
        ]
        .into_iter()
        .collect();

        // 7 * 1.0 + 0.5 * 2.0, null contributes nothing
        assert_eq!(provider.score(&merged), 8.0);
    }

    #[test]
    fn descriptor_lookup_matches_declared_order() {
        let provider = ManifestProvider::new(manifest(), true);
        assert_eq!(provider.attributes()[0].name, "cpu");
        assert!(provider.get("coverage").is_some_and(|d| !d.persist));
        assert!(provider.get("unknown").is_none());
    }

    #[test]
    fn manifest_defaults_apply() {
        let attributes: Vec<ManifestAttribute> =
            serde_json::from_str(r#"[{"name": "cpu"}]"#).unwrap();
        assert!(attributes[0].persist);
        assert_eq!(attributes[0].weight, 1.0);
    }
}
