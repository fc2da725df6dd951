//! Interceptor protocol
//!
//! Interceptors run around every matched request, in registration order:
//!
//! 1. `pre_handle` before binding; the first `false` answers 403 and ends
//!    the request without any further hooks.
//! 2. `post_handle` after a successful invocation.
//! 3. `after_completion` once per request that passed `pre_handle`, with the
//!    error if there was one.

use crate::{HandlerError, HandlerResult, RequestContext};
use std::sync::Arc;

/// Cross-cutting hooks around route invocation
pub trait HandlerInterceptor: Send + Sync + 'static {
    /// Return `false` to reject the request with 403
    fn pre_handle(&self, _ctx: &mut RequestContext) -> bool {
        true
    }

    /// Called with the normalized result when the handler succeeded
    fn post_handle(&self, _ctx: &mut RequestContext, _result: &HandlerResult) {}

    /// Called last for every request that passed `pre_handle`
    fn after_completion(&self, _ctx: &mut RequestContext, _error: Option<&HandlerError>) {}

    /// Name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered interceptor chain
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn HandlerInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn HandlerInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Run every `pre_handle` until one rejects. Returns the rejecting
    /// interceptor's name.
    pub fn pre_handle(&self, ctx: &mut RequestContext) -> Result<(), &'static str> {
        for interceptor in &self.interceptors {
            if !interceptor.pre_handle(ctx) {
                return Err(interceptor.name());
            }
        }
        Ok(())
    }

    pub fn post_handle(&self, ctx: &mut RequestContext, result: &HandlerResult) {
        for interceptor in &self.interceptors {
            interceptor.post_handle(ctx, result);
        }
    }

    pub fn after_completion(&self, ctx: &mut RequestContext, error: Option<&HandlerError>) {
        for interceptor in &self.interceptors {
            interceptor.after_completion(ctx, error);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        allow: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl HandlerInterceptor for Recorder {
        fn pre_handle(&self, _ctx: &mut RequestContext) -> bool {
            self.log.lock().unwrap().push(format!("pre:{}", self.label));
            self.allow
        }

        fn post_handle(&self, _ctx: &mut RequestContext, result: &HandlerResult) {
            self.log
                .lock()
                .unwrap()
                .push(format!("post:{}:{}", self.label, result.status));
        }

        fn after_completion(&self, _ctx: &mut RequestContext, error: Option<&HandlerError>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("after:{}:{}", self.label, error.is_some()));
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    fn chain(log: &Arc<Mutex<Vec<String>>>, allow: [bool; 3]) -> InterceptorChain {
        let mut chain = InterceptorChain::new();
        for (label, allow) in ["a", "b", "c"].into_iter().zip(allow) {
            chain.push(Arc::new(Recorder {
                label,
                allow,
                log: Arc::clone(log),
            }));
        }
        chain
    }

    #[test]
    fn test_phases_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, [true, true, true]);
        let mut ctx = RequestContext::new("/");

        assert!(chain.pre_handle(&mut ctx).is_ok());
        chain.post_handle(&mut ctx, &HandlerResult::new(200, "ok"));
        chain.after_completion(&mut ctx, None);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "pre:a", "pre:b", "pre:c", "post:a:200", "post:b:200", "post:c:200",
                "after:a:false", "after:b:false", "after:c:false",
            ]
        );
    }

    #[test]
    fn test_pre_handle_stops_at_first_rejection() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain(&log, [true, false, true]);
        let mut ctx = RequestContext::new("/admin");

        assert_eq!(chain.pre_handle(&mut ctx), Err("b"));
        assert_eq!(*log.lock().unwrap(), vec!["pre:a", "pre:b"]);
    }

    #[test]
    fn test_default_hooks() {
        struct Noop;
        impl HandlerInterceptor for Noop {}

        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(Noop));
        let mut ctx = RequestContext::new("/");
        assert!(chain.pre_handle(&mut ctx).is_ok());
        assert!(chain.names()[0].ends_with("Noop"));
    }
}
