/// Identity resolution boundary
///
/// Resolving a bearer credential to an account id is an external concern;
/// the pipeline trusts whatever implementation sits behind this trait and
/// takes no part in credential validation.
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a bearer token to an account id; `None` means unauthorized
    async fn resolve(&self, bearer_token: &str) -> Option<String>;
}

/// Token-table resolver backed by configuration
///
/// Maps pre-shared bearer tokens to account ids. Stands in for a real
/// identity service; swaps out behind the trait.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, bearer_token: &str) -> Option<String> {
        self.tokens.get(bearer_token).cloned()
    }
}

/// Pull the bearer token out of an Authorization header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let mut tokens = HashMap::new();
        tokens.insert("tok-123".to_string(), "acct-1".to_string());
        let resolver = StaticTokenResolver::new(tokens);

        assert_eq!(resolver.resolve("tok-123").await.as_deref(), Some("acct-1"));
        assert_eq!(resolver.resolve("nope").await, None);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
