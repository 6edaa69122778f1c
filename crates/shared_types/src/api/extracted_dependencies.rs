use serde::{Deserialize, Serialize};

use crate::{DependencySet, DependencySource};

/// Output of the static waterfall for one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDependencies {
    pub source: DependencySource,
    pub dependencies: DependencySet,
}

impl ExtractedDependencies {
    pub fn not_found() -> ExtractedDependencies {
        ExtractedDependencies {
            source: DependencySource::NotFound,
            dependencies: DependencySet::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
