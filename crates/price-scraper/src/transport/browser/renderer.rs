//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide), so the
//! browser transport's workflow can run against a scripted fake in tests.

use super::capture::NetworkResponse;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Page setup applied before navigation.
#[derive(Debug, Clone, Default)]
pub struct PageSetup {
    pub user_agent: String,
    pub accept_language: String,
    /// Extra headers sent with every request of the page.
    pub extra_headers: BTreeMap<String, String>,
    /// Script evaluated in every new document before page scripts run.
    pub init_script: String,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new, isolated rendering context.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context for rendering one page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Apply user agent, headers and the init script.
    async fn prepare(&mut self, setup: &PageSetup) -> Result<()>;
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until no request has been in flight for `quiet`, giving up
    /// after `cap`. Returns whether the network went idle.
    async fn wait_for_network_idle(&self, quiet: Duration, cap: Duration) -> bool;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Drain the responses observed since the last call.
    async fn take_responses(&self) -> Vec<NetworkResponse>;
    /// Close this context and release everything it owns.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Holds a render context for the duration of one fetch.
///
/// `release` closes the context; later calls are no-ops. Dropping an
/// unreleased scope only logs, since closing needs an async runtime.
pub struct ScopedContext {
    inner: Option<Box<dyn RenderContext>>,
}

impl ScopedContext {
    pub fn new(ctx: Box<dyn RenderContext>) -> Self {
        Self { inner: Some(ctx) }
    }

    pub fn get_mut(&mut self) -> Option<&mut (dyn RenderContext + 'static)> {
        self.inner.as_deref_mut()
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    pub async fn release(&mut self) {
        if let Some(ctx) = self.inner.take() {
            if let Err(e) = ctx.close().await {
                tracing::debug!("ignoring error while closing render context: {e:#}");
            }
        }
    }
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        if self.inner.is_some() {
            tracing::warn!("render context dropped without being released");
        }
    }
}
