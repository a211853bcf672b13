//! Inquiry processing pipeline.

pub mod classifier;
mod processor;
mod runner;
mod types;

pub use processor::InquiryPipeline;
pub use runner::spawn_pipeline_runner;
pub use types::{Inquiry, InquiryOutcome, RunSummary};
