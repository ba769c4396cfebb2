//! Shared plumbing for the mediagen command-line tools.
//!
//! Each tool wraps one vendor's generative-media API; the pieces they all
//! repeat live here: credential resolution, the job polling loop, result
//! download, and the stdout/exit-code conventions of the host application.

mod error;

pub mod audio;
pub mod auth;
pub mod cli;
pub mod download;
pub mod gemini;
pub mod job;
pub mod openai;
pub mod replicate;
pub mod transcript;

pub use error::{Error, Result};
