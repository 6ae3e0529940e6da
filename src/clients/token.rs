//! Bearer credential providers for outbound API calls.

use std::env;

/// Supplies the bearer credential attached to outbound requests
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, mostly for tests and single-tenant deployments
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the named environment variable on every call so rotated tokens
/// are picked up without a restart
#[derive(Debug, Clone)]
pub struct EnvToken {
    var_name: String,
}

impl EnvToken {
    pub fn new(var_name: String) -> Self {
        Self { var_name }
    }
}

impl TokenProvider for EnvToken {
    fn bearer_token(&self) -> Option<String> {
        env::var(&self.var_name).ok().filter(|token| !token.is_empty())
    }
}
