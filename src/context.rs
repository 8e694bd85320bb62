//! Host context
//!
//! What the cache needs to know about the surrounding request: which tenant
//! it serves, whether the caller holds administrative privileges, and the
//! request parameters (for the debug override).

use std::collections::HashMap;

use crate::constants::PRIMARY_TENANT_ID;

pub trait HostContext: Send + Sync {
    /// Numeric site/tenant id used to namespace stored entries
    fn tenant_id(&self) -> u64 {
        PRIMARY_TENANT_ID
    }

    /// Whether the current caller may use the debug override
    fn is_privileged(&self) -> bool {
        false
    }

    /// Value of a request parameter, if present
    fn request_param(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Fixed context, for the CLI and tests
#[derive(Debug, Clone)]
pub struct StaticContext {
    tenant_id: u64,
    privileged: bool,
    params: HashMap<String, String>,
}

impl Default for StaticContext {
    fn default() -> Self {
        Self {
            tenant_id: PRIMARY_TENANT_ID,
            privileged: false,
            params: HashMap::new(),
        }
    }
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: u64) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl HostContext for StaticContext {
    fn tenant_id(&self) -> u64 {
        self.tenant_id
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn request_param(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;
    impl HostContext for Bare {}

    #[test]
    fn test_trait_defaults() {
        assert_eq!(Bare.tenant_id(), 1);
        assert!(!Bare.is_privileged());
        assert_eq!(Bare.request_param("x"), None);
    }

    #[test]
    fn test_static_context_builder() {
        let ctx = StaticContext::new()
            .with_tenant(4)
            .privileged(true)
            .with_param("altcache_debug", "1");
        assert_eq!(ctx.tenant_id(), 4);
        assert!(ctx.is_privileged());
        assert_eq!(ctx.request_param("altcache_debug").as_deref(), Some("1"));
        assert_eq!(ctx.request_param("other"), None);
    }
}
