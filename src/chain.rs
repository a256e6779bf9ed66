//! Decorator composition around the message handler.
//!
//! `chain(base, [a, b])` yields `b(a(base))`: the last adapter is outermost,
//! so its pre-call logic runs first and its post-call logic runs last.

use futures::future::BoxFuture;
use hickory_proto::op::Message;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::{self, Timer};
use crate::router::QueryRouter;

/// Handles one message, returning the reply to send (if any).
pub type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, Option<Message>> + Send + Sync>;

/// Wraps a handler into a new handler.
pub type Adapter = Box<dyn FnOnce(Handler) -> Handler + Send>;

/// Lift an async function into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Message>> + Send + 'static,
{
    Arc::new(move |message: Message| -> BoxFuture<'static, Option<Message>> {
        Box::pin(f(message))
    })
}

/// Compose `adapters` around `handler`, first adapter innermost.
pub fn chain(handler: Handler, adapters: impl IntoIterator<Item = Adapter>) -> Handler {
    adapters
        .into_iter()
        .fold(handler, |inner, adapter| adapter(inner))
}

/// The router as the innermost handler.
pub fn router_handler(router: Arc<QueryRouter>) -> Handler {
    handler_fn(move |message| {
        let router = router.clone();
        async move { router.handle(&message).await }
    })
}

/// Observe the wall-clock time spent in the wrapped handler.
pub fn observe_latency<O>(observe: O) -> Adapter
where
    O: Fn(Duration) + Send + Sync + 'static,
{
    let observe = Arc::new(observe);
    Box::new(move |inner: Handler| {
        handler_fn(move |message| {
            let inner = inner.clone();
            let observe = observe.clone();
            async move {
                let timer = Timer::start();
                let reply = inner(message).await;
                observe(timer.elapsed());
                reply
            }
        })
    })
}

/// [`observe_latency`] feeding the processing time histogram.
pub fn processing_time_histogram() -> Adapter {
    observe_latency(metrics::record_processing_time)
}
