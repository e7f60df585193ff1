//! Ordered middleware around a terminal endpoint.
//!
//! Each [`Middleware`] sees the [`Context`] on the way in and the
//! [`Response`] on the way out, and decides whether to call the rest of the
//! chain at all. Composition order is exactly the order of registration.

use std::sync::Arc;

use async_trait::async_trait;
use flow_message::Response;

use crate::context::Context;
use crate::error::Result;

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response>;
}

/// The innermost handler of a pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, ctx: &mut Context) -> Result<Response>;
}

/// The remainder of the chain after the current middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &mut Context) -> Result<Response> {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                tracing::trace!(middleware = current.name(), "entering");
                let next = Next {
                    middleware: rest,
                    endpoint: self.endpoint,
                };
                current.call(ctx, next).await
            }
            None => self.endpoint.call(ctx).await,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub async fn call(&self, ctx: &mut Context) -> Result<Response> {
        Next {
            middleware: &self.middleware,
            endpoint: self.endpoint.as_ref(),
        }
        .run(ctx)
        .await
    }

    /// Middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("middleware", &self.names()).finish()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn with<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with_arc(Arc::new(middleware))
    }

    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build<E: Endpoint + 'static>(self, endpoint: E) -> Pipeline {
        Pipeline {
            middleware: self.middleware,
            endpoint: Arc::new(endpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Platform, RequestInfo};
    use crate::flow::Flow;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
            self.log.lock().unwrap().push(format!("{}:in", self.name));
            let mut response = next.run(ctx).await?;
            self.log.lock().unwrap().push(format!("{}:out", self.name));
            response.message.push_str(self.name);
            Ok(response)
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        fn name(&self) -> &'static str {
            "short"
        }

        async fn call(&self, _ctx: &mut Context, _next: Next<'_>) -> Result<Response> {
            Ok(Response::terminal("stopped", None))
        }
    }

    struct Echo;

    #[async_trait]
    impl Endpoint for Echo {
        async fn call(&self, ctx: &mut Context) -> Result<Response> {
            let tag = ctx.get("test.tag").and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
            Ok(Response::prompt(tag, None, None))
        }
    }

    struct Tagger;

    #[async_trait]
    impl Middleware for Tagger {
        fn name(&self) -> &'static str {
            "tagger"
        }

        async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
            ctx.insert("test.tag", json!(">"));
            next.run(ctx).await
        }
    }

    fn ctx() -> Context {
        Context::new(RequestInfo::new("1", "test", Platform::Chat), Arc::new(Flow::new("f")), "main")
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .with(Recorder { name: "a", log: log.clone() })
            .with(Recorder { name: "b", log: log.clone() })
            .build(Echo);

        let response = pipeline.call(&mut ctx()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a:in", "b:in", "b:out", "a:out"]);
        assert_eq!(response.message, "ba");
        assert_eq!(pipeline.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .with(ShortCircuit)
            .with(Recorder { name: "never", log: log.clone() })
            .build(Echo);

        let response = pipeline.call(&mut ctx()).await.unwrap();

        assert_eq!(response.message, "stopped");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_flows_inward() {
        let pipeline = Pipeline::builder().with(Tagger).build(Echo);
        let response = pipeline.call(&mut ctx()).await.unwrap();
        assert_eq!(response.message, ">");
    }
}
