//! The conversion pipeline: download, extract, separate, remux, publish.

pub mod job;
pub mod runner;
pub mod toolchain;

pub use job::{JobInfo, JobReport, JobRequest, JobState, OutputVideo, Stage};
pub use runner::JobRunner;
pub use toolchain::{CliToolchain, MediaToolchain};
