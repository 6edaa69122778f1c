pub mod batch_results;
pub mod extracted_dependencies;
