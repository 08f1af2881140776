//! Registry repositories and the shared-repository intersection

use crate::artifact::Artifact;
use crate::registry::RepositoryData;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// A named, formatted collection of artifacts on one registry
///
/// Equality only looks at `(name, format)`. The repository type is left out
/// because the same logical repository may be hosted on one side and a proxy
/// on the other.
#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub name: String,
    pub format: String,
    pub repository_type: String,
    artifacts: Vec<Artifact>,
}

impl Repository {
    pub fn new(name: impl Into<String>, format: impl Into<String>, repository_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            repository_type: repository_type.into(),
            artifacts: Vec::new(),
        }
    }

    /// Same repository without any artifacts
    pub fn empty_copy(&self) -> Self {
        Self::new(&self.name, &self.format, &self.repository_type)
    }

    pub fn add(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl From<RepositoryData> for Repository {
    fn from(data: RepositoryData) -> Self {
        Repository::new(data.name, data.format, data.repository_type)
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.format == other.format
    }
}

impl Eq for Repository {}

impl Hash for Repository {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.format.hash(state);
    }
}

/// Repositories of `left` that also exist in `right`, in `left`'s order and
/// without duplicates
pub fn shared_repositories(left: &[Repository], right: &[Repository]) -> Vec<Repository> {
    let right: HashSet<&Repository> = right.iter().collect();
    let mut seen = HashSet::new();

    left.iter()
        .filter(|repository| right.contains(repository) && seen.insert(*repository))
        .cloned()
        .collect()
}
