// Provider Context
//
// Per-call collaborators handed to a provider

use crate::proxy::ProxyService;

/// Provider execution context
///
/// Built fresh for every provider call, so nothing in it is shared mutably
/// between concurrent resolutions.
#[derive(Clone, Copy)]
pub struct ProviderContext<'a> {
    /// Wraps origin URLs into proxy URLs
    pub proxy: &'a ProxyService,

    /// Shared HTTP client (connection pool)
    pub http: &'a reqwest::Client,

    /// Fingerprint of the request being resolved, for log correlation
    pub fingerprint: &'a str,
}

impl<'a> ProviderContext<'a> {
    #[must_use]
    pub const fn new(proxy: &'a ProxyService, http: &'a reqwest::Client) -> Self {
        Self {
            proxy,
            http,
            fingerprint: "",
        }
    }

    /// Set request fingerprint
    #[must_use]
    pub const fn with_fingerprint(mut self, fingerprint: &'a str) -> Self {
        self.fingerprint = fingerprint;
        self
    }
}

impl std::fmt::Debug for ProviderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("proxy", self.proxy)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
