//! Feature-flag collaborator gating API fetchers.

use async_trait::async_trait;
use std::collections::HashSet;

#[cfg(test)]
use mockall::automock;

/// Flag key for an API fetcher provider.
pub fn api_fetcher_flag(provider: &str) -> String {
    format!("api_fetcher.{provider}")
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeatureFlags: Send + Sync {
    async fn is_enabled(&self, flag: &str) -> bool;
}

/// Everything on except an explicit deny list.
#[derive(Debug, Default, Clone)]
pub struct StaticFlags {
    disabled: HashSet<String>,
}

impl StaticFlags {
    pub fn all_enabled() -> Self {
        Self::default()
    }

    pub fn disable(mut self, flag: impl Into<String>) -> Self {
        self.disabled.insert(flag.into());
        self
    }
}

#[async_trait]
impl FeatureFlags for StaticFlags {
    async fn is_enabled(&self, flag: &str) -> bool {
        !self.disabled.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_flags() {
        let flags = StaticFlags::all_enabled().disable(api_fetcher_flag("lever"));
        assert!(flags.is_enabled("api_fetcher.greenhouse").await);
        assert!(!flags.is_enabled("api_fetcher.lever").await);
    }
}
