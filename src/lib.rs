pub mod article;
pub mod config;
pub mod credibility;
pub mod error;
pub mod extraction;
pub mod lang;
pub mod llm;
pub mod pipeline;
pub mod retrieve;
pub mod retry;
pub mod scoring;
pub mod search;
pub mod segments;
pub mod server;
pub mod synthesis;
pub mod tone;
pub mod types;
pub mod verification;

pub use config::Settings;
pub use error::{VerifyError, VerifyResult};
pub use pipeline::Pipeline;
pub use types::FinalVerdict;
