//! Public types for the Huginn API.

mod model;
mod request;
mod result;
mod task;

pub use model::{ModelInfo, ProviderKind};
pub use request::{GenerationRequest, ProjectSettings};
pub use result::{ERROR_SENTINEL, Evaluation, GenerationResult, TranslationInfo};
pub use task::{Priority, TaskType};
