//! Built-in job handlers.

mod batch_commit;
mod content;
mod digest;
mod ping;
mod verify;

pub use batch_commit::{BatchCommitHandler, BatchCommitParams};
pub use content::{PageCreateHandler, PageCreateParams, PageImproveHandler, PageImproveParams};
pub use digest::{plan_batch, AutoUpdateDigestHandler, DigestParams, PlannedUpdate};
pub use ping::PingHandler;
pub use verify::VerifyHandler;

use std::path::PathBuf;
use std::sync::Arc;

use pagesmith_core::JobStore;

use crate::pipeline::{ContentPipeline, PipelinePlanner};
use crate::registry::HandlerRegistry;

/// Build a registry with every built-in handler wired to the given store.
///
/// The content pipeline command comes from the environment; when it is
/// absent, content jobs fail with a configuration message rather than the
/// registry failing to build.
pub fn builtin_registry(
    store: Arc<dyn JobStore>,
    project_root: impl Into<PathBuf>,
) -> HandlerRegistry {
    let project_root = project_root.into();
    let pipeline = ContentPipeline::from_env(&project_root);
    let planner = Arc::new(PipelinePlanner::new(pipeline.clone()));

    HandlerRegistry::new()
        .register(PingHandler::new())
        .register(VerifyHandler::new())
        .register(PageImproveHandler::new(pipeline.clone()))
        .register(PageCreateHandler::new(pipeline))
        .register(AutoUpdateDigestHandler::new(store.clone(), planner))
        .register(BatchCommitHandler::new(store))
}
