//! Connection resolution capability.

use async_trait::async_trait;

use funcgate_core::ApplicationError;

/// Resolves the target endpoint URI for the client.
///
/// Kept behind a trait so deployments can plug in discovery services or
/// per-environment lookup; the client only asks for a URI when it opens.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    /// Returns the full URI of the function endpoint.
    ///
    /// # Errors
    ///
    /// Returns a structured error when no connection can be resolved; the
    /// client surfaces it from `open`.
    async fn resolve(&self, correlation_id: &str) -> Result<String, ApplicationError>;
}

/// A resolver that always returns one preconfigured URI.
#[derive(Debug, Clone)]
pub struct StaticConnectionResolver {
    uri: String,
}

impl StaticConnectionResolver {
    #[must_use]
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
        }
    }
}

#[async_trait]
impl ConnectionResolver for StaticConnectionResolver {
    async fn resolve(&self, correlation_id: &str) -> Result<String, ApplicationError> {
        if self.uri.is_empty() {
            return Err(ApplicationError::internal(
                correlation_id,
                "NO_CONNECTION",
                "Connection uri is not configured",
            ));
        }
        Ok(self.uri.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_returns_configured_uri() {
        let resolver = StaticConnectionResolver::new("http://localhost:8080/");
        let uri = resolver.resolve("c1").await.unwrap();
        assert_eq!(uri, "http://localhost:8080/");
    }

    #[tokio::test]
    async fn static_resolver_rejects_empty_uri() {
        let resolver = StaticConnectionResolver::new("");
        let err = resolver.resolve("c1").await.unwrap_err();
        assert_eq!(err.code, "NO_CONNECTION");
    }
}
