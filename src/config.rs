//! Dispatcher configuration

/// Settings applied by the [`Scanner`](crate::Scanner) and the dispatcher it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Build every singleton at the end of the scan (default `true`)
    pub eager_singletons: bool,
    /// Body of the 404 sent when no route matches
    pub not_found_body: String,
    /// Body of the 403 sent when an interceptor rejects the request
    pub forbidden_body: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            eager_singletons: true,
            not_found_body: "Not Found".to_string(),
            forbidden_body: "Forbidden".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer every singleton to its first resolution.
    pub fn lazy() -> Self {
        Self::default().eager_singletons(false)
    }

    pub fn eager_singletons(mut self, eager: bool) -> Self {
        self.eager_singletons = eager;
        self
    }

    pub fn not_found_body(mut self, body: impl Into<String>) -> Self {
        self.not_found_body = body.into();
        self
    }

    pub fn forbidden_body(mut self, body: impl Into<String>) -> Self {
        self.forbidden_body = body.into();
        self
    }
}
