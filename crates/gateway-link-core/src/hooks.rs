// Identity-provider lifecycle hooks.
//
// The identity provider calls into a `HookRegistry` at two points around each
// auth endpoint: `Before` (pre-handler) and `After` (post-handler). Each
// registered `AuthHook` decides from the endpoint path whether it applies.
// Context is passed explicitly; hooks never reach into an ambient request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, GatewayLinkError};

/// When a hook fires relative to the endpoint handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTiming {
    Before,
    After,
}

impl HookTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// Reference to an identity-provider session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The session created by the endpoint that just ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub session: SessionRef,
}

/// Context handed to every hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    /// Endpoint route, either the pattern (`/callback/:id`) or a concrete path.
    pub path: String,
    /// Route parameters (e.g. `id` → upstream provider id).
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Set on `After` hooks of endpoints that created a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_session: Option<NewSession>,
    /// The session the request is acting on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRef>,
}

impl HookContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_new_session(mut self, user_id: impl Into<String>) -> Self {
        self.new_session = Some(NewSession {
            session: SessionRef {
                user_id: user_id.into(),
                id: None,
            },
        });
        self
    }

    pub fn with_session(mut self, user_id: impl Into<String>) -> Self {
        self.session = Some(SessionRef {
            user_id: user_id.into(),
            id: None,
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn new_session_user_id(&self) -> Option<&str> {
        self.new_session
            .as_ref()
            .map(|s| s.session.user_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn session_user_id(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|s| s.user_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Error a hook hands back to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl From<&GatewayLinkError> for HookError {
    fn from(err: &GatewayLinkError) -> Self {
        Self {
            code: err.code(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for HookError {}

/// What the identity provider should do after a hook ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResult {
    /// Proceed normally.
    Continue,
    /// Abort the endpoint and redirect (used to force a logout/re-login).
    Redirect(String),
    /// Abort the endpoint with an error.
    Fail(HookError),
}

impl HookResult {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// A lifecycle hook.
#[async_trait]
pub trait AuthHook: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Whether this hook applies to the given timing and context.
    fn matches(&self, timing: HookTiming, ctx: &HookContext) -> bool;

    /// Run the hook. Only called when `matches` returned `true`.
    async fn call(&self, timing: HookTiming, ctx: &HookContext) -> HookResult;
}

/// Ordered collection of hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn AuthHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.hooks.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn AuthHook>) {
        self.hooks.push(hook);
    }

    /// Run matching `Before` hooks in order; the first non-`Continue` result wins.
    pub async fn run_before(&self, ctx: &HookContext) -> HookResult {
        self.run(HookTiming::Before, ctx).await
    }

    /// Run matching `After` hooks in order; the first non-`Continue` result wins.
    ///
    /// Unlike fire-and-forget observers, an `After` failure is returned to the
    /// caller: a sign-in whose gateway link could not be established must fail.
    pub async fn run_after(&self, ctx: &HookContext) -> HookResult {
        self.run(HookTiming::After, ctx).await
    }

    async fn run(&self, timing: HookTiming, ctx: &HookContext) -> HookResult {
        for hook in &self.hooks {
            if !hook.matches(timing, ctx) {
                continue;
            }
            tracing::debug!(hook = hook.id(), timing = timing.as_str(), path = %ctx.path, "running hook");
            let result = hook.call(timing, ctx).await;
            if !result.is_continue() {
                return result;
            }
        }
        HookResult::Continue
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestHook {
        timing: HookTiming,
        path: &'static str,
        result: HookResult,
        calls: AtomicUsize,
    }

    impl TestHook {
        fn new(timing: HookTiming, path: &'static str, result: HookResult) -> Arc<Self> {
            Arc::new(Self {
                timing,
                path,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AuthHook for TestHook {
        fn id(&self) -> &str {
            "test"
        }

        fn matches(&self, timing: HookTiming, ctx: &HookContext) -> bool {
            timing == self.timing && ctx.path == self.path
        }

        async fn call(&self, _timing: HookTiming, _ctx: &HookContext) -> HookResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_empty_registry_continues() {
        let registry = HookRegistry::new();
        assert!(registry.run_after(&HookContext::new("/callback/:id")).await.is_continue());
    }

    #[tokio::test]
    async fn test_unmatched_hook_not_called() {
        let hook = TestHook::new(HookTiming::Before, "/sign-out", HookResult::Redirect("/x".into()));
        let mut registry = HookRegistry::new();
        registry.register(hook.clone());

        let result = registry.run_after(&HookContext::new("/sign-out")).await;
        assert!(result.is_continue());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_non_continue_short_circuits() {
        let first = TestHook::new(HookTiming::After, "/callback/:id", HookResult::Redirect("/auth/logout".into()));
        let second = TestHook::new(HookTiming::After, "/callback/:id", HookResult::Continue);
        let mut registry = HookRegistry::new();
        registry.register(first.clone());
        registry.register(second.clone());

        let result = registry.run_after(&HookContext::new("/callback/:id")).await;
        assert_eq!(result, HookResult::Redirect("/auth/logout".into()));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_context_accessors() {
        let ctx = HookContext::new("/callback/:id")
            .with_param("id", "fortytwo")
            .with_new_session("u1");
        assert_eq!(ctx.param("id"), Some("fortytwo"));
        assert_eq!(ctx.new_session_user_id(), Some("u1"));
        assert_eq!(ctx.session_user_id(), None);
    }

    #[test]
    fn test_empty_user_id_treated_as_missing() {
        let ctx = HookContext::new("/sign-out").with_session("");
        assert_eq!(ctx.session_user_id(), None);
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let ctx: HookContext = serde_json::from_value(serde_json::json!({
            "path": "/callback/:id",
            "params": {"id": "google"},
            "newSession": {"session": {"userId": "u9"}}
        }))
        .unwrap();
        assert_eq!(ctx.new_session_user_id(), Some("u9"));
        assert_eq!(ctx.param("id"), Some("google"));
    }

    #[test]
    fn test_registry_len() {
        let mut registry = HookRegistry::new();
        assert!(registry.is_empty());
        registry.register(TestHook::new(HookTiming::After, "/", HookResult::Continue));
        assert_eq!(registry.len(), 1);
    }
}
