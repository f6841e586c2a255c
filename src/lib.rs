pub mod authenticity;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod language;
pub mod liveness;
pub mod normalization;
pub mod pipeline;
pub mod reference_data;
pub mod similarity;
pub mod typosquat;

pub use authenticity::{AuthenticityResolver, AuthenticityVerdict};
pub use config::Config;
pub use error::MessageError;
pub use heuristics::{Heuristic, HeuristicRegistry, MessageEntities};
pub use pipeline::{CorpusReport, MessageResult, MessageSource, Pipeline};
pub use reference_data::ReferenceData;
pub use typosquat::TyposquatIndex;
