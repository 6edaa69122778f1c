pub mod api;
mod build_spec;
mod dependency_set;
mod dependency_source;
mod inference_conf;
pub mod instruction;
pub mod serde_helpers;

pub use build_spec::{BuildSpec, BuildSpecError};
pub use dependency_set::{Dependency, DependencySet};
pub use dependency_source::DependencySource;
pub use inference_conf::{InferenceConf, ProbeConf};
pub use instruction::Instruction;
