//! Dispatch table from job-type string to handler.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::handler::JobHandler;

/// Registry mapping job-type strings to their handlers.
///
/// Built once during startup and read-only afterwards, so lookups need no
/// interior locking. The dispatch key is an open string: deployments can
/// register handlers for types the built-in set does not know.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its `job_type()` key. Registering a second
    /// handler for the same type replaces the first.
    pub fn register<H: JobHandler + 'static>(self, handler: H) -> Self {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already-shared handler.
    pub fn register_arc(mut self, handler: Arc<dyn JobHandler>) -> Self {
        let job_type = handler.job_type();
        debug!(job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
        self
    }

    /// Look up the handler for a job type.
    pub fn get(&self, job_type: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(job_type)
    }

    /// Whether any handler is registered for the type.
    pub fn is_known_type(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// All registered type strings, sorted for stable startup logs.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{JobContext, JobResult};
    use crate::handlers::PingHandler;
    use async_trait::async_trait;

    struct StubHandler(&'static str);

    #[async_trait]
    impl JobHandler for StubHandler {
        fn job_type(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _ctx: JobContext) -> JobResult {
            JobResult::Success(None)
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("ping").is_none());
        assert!(!registry.is_known_type("ping"));
        assert!(registry.registered_types().is_empty());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = HandlerRegistry::new()
            .register(PingHandler::new())
            .register(StubHandler("custom-type"));

        assert_eq!(registry.len(), 2);
        assert!(registry.is_known_type("ping"));
        assert!(registry.is_known_type("custom-type"));
        assert!(!registry.is_known_type("batch-commit"));

        let handler = registry.get("ping").unwrap();
        assert_eq!(handler.job_type(), "ping");
    }

    #[test]
    fn test_registered_types_sorted() {
        let registry = HandlerRegistry::new()
            .register(StubHandler("zeta"))
            .register(StubHandler("alpha"))
            .register(StubHandler("mid"));

        assert_eq!(registry.registered_types(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_reregister_replaces() {
        struct Marker(i32);

        #[async_trait]
        impl JobHandler for Marker {
            fn job_type(&self) -> &'static str {
                "dup"
            }

            async fn execute(&self, _ctx: JobContext) -> JobResult {
                JobResult::Success(Some(serde_json::json!({"marker": self.0})))
            }
        }

        let registry = HandlerRegistry::new().register(Marker(1)).register(Marker(2));
        assert_eq!(registry.len(), 1);

        let job = pagesmith_core::Job {
            id: 1,
            job_type: "dup".to_string(),
            status: pagesmith_core::JobStatus::Running,
            priority: 5,
            params: None,
            result: None,
            error: None,
            retries: 0,
            max_retries: 3,
            worker_id: None,
            created_at: chrono::Utc::now(),
            claimed_at: None,
            started_at: None,
            completed_at: None,
        };
        let handler = registry.get("dup").unwrap();
        match handler.execute(JobContext::new(job, "w", ".")).await {
            JobResult::Success(Some(data)) => assert_eq!(data["marker"], 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
