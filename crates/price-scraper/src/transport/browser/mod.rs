//! Scripted-browser transport.
//!
//! Renders the page in a fresh headless browser context and returns the
//! freshest markup plus everything observed along the way (intercepted API
//! payloads, live DOM candidates, resource URLs) as instrumentation blocks.
//!
//! Every wait is bounded and best-effort: a slow navigation, a network that
//! never idles, a selector that never appears or a page that never hydrates
//! only cost their caps, and the transport still harvests whatever state
//! exists. The context is released on every exit path.

pub mod capture;
pub mod chromium;
pub mod renderer;
pub mod scripts;

use self::capture::ResponseCapture;
use self::renderer::{PageSetup, RenderContext, Renderer, ScopedContext};
use super::{Transport, TransportKind, USER_AGENT};
use crate::blocks::{append_blocks, DomCandidate, Instrumentation};
use crate::error::ScraperError;
use crate::types::TransportOptions;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Bounds for the browser transport's internal waits.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    /// Quiet window that counts as "network idle".
    pub network_quiet: Duration,
    /// Cap on the network-idle wait.
    pub network_idle_cap: Duration,
    /// Cap on the readiness-selector wait.
    pub selector_cap: Duration,
    pub selector_poll: Duration,
    /// Interval between hydration probes.
    pub hydration_interval: Duration,
    pub hydration_attempts: u32,
    /// Steps of the scroll-and-return cycle and the pause after each.
    pub scroll_steps: u32,
    pub scroll_pause: Duration,
    /// Maximum DOM candidates harvested by the live query pass.
    pub max_dom_candidates: usize,
    /// Slack added on top of the summed bounds for the overall deadline.
    pub deadline_margin: Duration,
    pub accept_language: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            network_quiet: Duration::from_millis(500),
            network_idle_cap: Duration::from_secs(12),
            selector_cap: Duration::from_secs(10),
            selector_poll: Duration::from_millis(250),
            hydration_interval: Duration::from_secs(1),
            hydration_attempts: 15,
            scroll_steps: 4,
            scroll_pause: Duration::from_millis(400),
            max_dom_candidates: 60,
            deadline_margin: Duration::from_secs(15),
            accept_language: "en-US,en;q=0.9,ar;q=0.8".to_string(),
        }
    }
}

/// Browser-based transport.
pub struct BrowserTransport {
    renderer: Arc<dyn Renderer>,
    settings: BrowserSettings,
    span: tracing::Span,
}

impl BrowserTransport {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            settings: BrowserSettings::default(),
            span: tracing::info_span!("transport", kind = "browser"),
        }
    }

    /// Browser transport backed by a locally installed Chromium.
    pub fn chromium() -> anyhow::Result<Self> {
        let renderer = chromium::ChromiumRenderer::new()?;
        Ok(Self::new(Arc::new(renderer)))
    }

    pub fn with_settings(mut self, settings: BrowserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Log under the given span instead of the default `transport` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Upper bound on a whole fetch: every internal wait at its cap, plus
    /// margin.
    pub fn deadline(&self, options: &TransportOptions) -> Duration {
        let s = &self.settings;
        let mut total = options.timeout + s.network_idle_cap + options.additional_wait;
        if options.wait_for_selector.is_some() {
            total += s.selector_cap;
        }
        total += s.hydration_interval * s.hydration_attempts;
        total += s.scroll_pause * (s.scroll_steps + 1);
        total + s.deadline_margin
    }

    async fn fetch_scoped(
        &self,
        url: &str,
        options: &TransportOptions,
    ) -> Result<String, ScraperError> {
        let ctx = self.renderer.new_context().await.map_err(|e| {
            ScraperError::from_anyhow(e.context("failed to start browser context"))
        })?;
        let mut scope = ScopedContext::new(ctx);
        let deadline = self.deadline(options);

        let outcome = match scope.get_mut() {
            Some(ctx) => tokio::time::timeout(deadline, self.harvest(ctx, url, options)).await,
            None => Ok(Err(ScraperError::unknown("render context unavailable"))),
        };

        scope.release().await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ScraperError::timeout(format!(
                "browser fetch of {url} exceeded {}ms",
                deadline.as_millis()
            ))),
        }
    }

    async fn harvest(
        &self,
        ctx: &mut dyn RenderContext,
        url: &str,
        options: &TransportOptions,
    ) -> Result<String, ScraperError> {
        let setup = PageSetup {
            user_agent: options
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| USER_AGENT.to_string()),
            accept_language: self.settings.accept_language.clone(),
            extra_headers: options
                .headers
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("user-agent"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            init_script: scripts::STEALTH_INIT.to_string(),
        };
        if let Err(e) = ctx.prepare(&setup).await {
            tracing::warn!("page setup incomplete: {e:#}");
        }

        let timeout_ms = options.timeout.as_millis() as u64;
        let page_url = match ctx.navigate(url, timeout_ms).await {
            Ok(nav) => {
                tracing::debug!(load_time_ms = nav.load_time_ms, final_url = %nav.final_url, "navigated");
                nav.final_url
            }
            Err(e) => {
                tracing::warn!("navigation problem, harvesting current state: {e:#}");
                url.to_string()
            }
        };

        if !ctx
            .wait_for_network_idle(self.settings.network_quiet, self.settings.network_idle_cap)
            .await
        {
            tracing::debug!("network never went idle");
        }

        if let Some(selector) = &options.wait_for_selector {
            if !self.wait_for_selector(ctx, selector).await {
                tracing::debug!(selector = %selector, "readiness selector not found");
            }
        }

        self.scroll_cycle(ctx).await;

        if options.wait_for_js || options.hydration_probe.is_some() {
            let probe = options
                .hydration_probe
                .as_deref()
                .unwrap_or(scripts::GENERIC_HYDRATION_PROBE);
            match self.poll_hydration(ctx, probe).await {
                Some(attempt) => tracing::debug!(attempt, "page hydrated"),
                None => tracing::info!(
                    attempts = self.settings.hydration_attempts,
                    "hydration signal never arrived, continuing"
                ),
            }
        }

        if !options.additional_wait.is_zero() {
            tokio::time::sleep(options.additional_wait).await;
        }

        let dom_candidates = self.query_dom_candidates(ctx).await;

        let snapshot = ctx.get_html().await;

        let mut capture = ResponseCapture::new(&page_url);
        for response in ctx.take_responses().await {
            capture.observe(response);
        }
        let (api_payloads, raw_html, resources) = capture.into_parts();

        let markup = choose_markup(snapshot, raw_html)?;

        let instrumentation = Instrumentation {
            api_payloads,
            dom_candidates,
            resources,
        };
        tracing::info!(
            bytes = markup.len(),
            api_payloads = instrumentation.api_payloads.len(),
            dom_candidates = instrumentation.dom_candidates.len(),
            resources = instrumentation.resources.len(),
            "harvested page"
        );

        Ok(append_blocks(&markup, &instrumentation))
    }

    async fn wait_for_selector(&self, ctx: &dyn RenderContext, selector: &str) -> bool {
        let script = scripts::selector_present(selector);
        let polls = (self.settings.selector_cap.as_millis()
            / self.settings.selector_poll.as_millis().max(1))
        .max(1);
        for _ in 0..polls {
            if is_truthy(ctx.execute_js(&script).await.ok()) {
                return true;
            }
            tokio::time::sleep(self.settings.selector_poll).await;
        }
        false
    }

    async fn scroll_cycle(&self, ctx: &dyn RenderContext) {
        let height = match ctx.execute_js(scripts::SCROLL_HEIGHT).await {
            Ok(v) => v.as_f64().unwrap_or(0.0) as i64,
            Err(e) => {
                tracing::debug!("scroll skipped: {e:#}");
                return;
            }
        };
        let steps = i64::from(self.settings.scroll_steps.max(1));
        for step in 1..=steps {
            let _ = ctx.execute_js(&scripts::scroll_to(height * step / steps)).await;
            tokio::time::sleep(self.settings.scroll_pause).await;
        }
        let _ = ctx.execute_js(&scripts::scroll_to(0)).await;
        tokio::time::sleep(self.settings.scroll_pause).await;
    }

    /// Probe until the page reports hydrated. Returns the successful attempt
    /// number, or `None` after `hydration_attempts` misses.
    async fn poll_hydration(&self, ctx: &dyn RenderContext, probe: &str) -> Option<u32> {
        let attempts = self.settings.hydration_attempts;
        for attempt in 1..=attempts {
            if is_truthy(ctx.execute_js(probe).await.ok()) {
                return Some(attempt);
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.hydration_interval).await;
            }
        }
        None
    }

    async fn query_dom_candidates(&self, ctx: &dyn RenderContext) -> Vec<DomCandidate> {
        let script = scripts::dom_candidates(self.settings.max_dom_candidates);
        match ctx.execute_js(&script).await {
            Ok(value) => serde_json::from_value::<Vec<DomCandidate>>(value).unwrap_or_else(|e| {
                tracing::debug!("unexpected DOM candidate shape: {e}");
                Vec::new()
            }),
            Err(e) => {
                tracing::debug!("DOM candidate query failed: {e:#}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn fetch(&self, url: &str, options: &TransportOptions) -> Result<String, ScraperError> {
        let span = self.span.clone();
        async move {
            tracing::info!(url, timeout_ms = options.timeout.as_millis() as u64, "fetch");
            let result = self.fetch_scoped(url, options).await;
            if let Err(e) = &result {
                tracing::warn!(kind = %e.kind, "fetch failed: {}", e.message);
            }
            result
        }
        .instrument(span)
        .await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Browser
    }
}

fn is_truthy(value: Option<serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(serde_json::Value::Array(a)) => !a.is_empty(),
        Some(serde_json::Value::Object(_)) => true,
        _ => false,
    }
}

/// Prefer the live DOM snapshot; fall back to the captured raw HTML when the
/// snapshot failed or came back smaller than that response.
fn choose_markup(
    snapshot: anyhow::Result<String>,
    raw_html: Option<String>,
) -> Result<String, ScraperError> {
    match (snapshot, raw_html) {
        (Ok(live), Some(raw)) if live.len() < raw.len() => {
            tracing::debug!(
                live = live.len(),
                raw = raw.len(),
                "snapshot smaller than captured document, using captured document"
            );
            Ok(raw)
        }
        (Ok(live), _) => Ok(live),
        (Err(e), Some(raw)) => {
            tracing::warn!("snapshot failed, using captured document: {e:#}");
            Ok(raw)
        }
        (Err(e), None) => Err(ScraperError::from_anyhow(e.context("failed to capture page markup"))),
    }
}

#[cfg(test)]
mod tests {
    use super::capture::NetworkResponse;
    use super::renderer::NavigationResult;
    use super::*;
    use crate::blocks::{decode_api_payloads, decode_dom_candidates, decode_resources};
    use crate::error::ErrorKind;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Script {
        fail_launch: bool,
        fail_navigation: bool,
        html: Option<String>,
        hang_on_html: bool,
        hydrate_on_attempt: Option<usize>,
        selector_missing: bool,
        never_idle: bool,
        dom: Value,
        responses: Vec<NetworkResponse>,
    }

    #[derive(Default)]
    struct Tally {
        closes: AtomicUsize,
        hydration_checks: AtomicUsize,
        scripts: Mutex<Vec<String>>,
        setups: Mutex<Vec<PageSetup>>,
    }

    struct FakeRenderer {
        script: Script,
        tally: Arc<Tally>,
    }

    struct FakeContext {
        script: Script,
        tally: Arc<Tally>,
    }

    const HYDRATION_PROBE: &str = "window.__HYDRATED__ === true";

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn new_context(&self) -> anyhow::Result<Box<dyn RenderContext>> {
            if self.script.fail_launch {
                anyhow::bail!("no chromium here");
            }
            Ok(Box::new(FakeContext {
                script: self.script.clone(),
                tally: Arc::clone(&self.tally),
            }))
        }
        fn active_contexts(&self) -> usize {
            0
        }
    }

    #[async_trait]
    impl RenderContext for FakeContext {
        async fn prepare(&mut self, setup: &PageSetup) -> anyhow::Result<()> {
            self.tally.setups.lock().unwrap().push(setup.clone());
            Ok(())
        }
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> anyhow::Result<NavigationResult> {
            if self.script.fail_navigation {
                anyhow::bail!("net::ERR_CONNECTION_RESET");
            }
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 5,
            })
        }
        async fn wait_for_network_idle(&self, _quiet: Duration, cap: Duration) -> bool {
            if self.script.never_idle {
                tokio::time::sleep(cap).await;
                return false;
            }
            true
        }
        async fn execute_js(&self, script: &str) -> anyhow::Result<Value> {
            self.tally.scripts.lock().unwrap().push(script.to_string());
            if script == HYDRATION_PROBE {
                let n = self.tally.hydration_checks.fetch_add(1, Ordering::SeqCst) + 1;
                return Ok(Value::Bool(self.script.hydrate_on_attempt == Some(n)));
            }
            if script.contains("const LIMIT") {
                return Ok(self.script.dom.clone());
            }
            if self.script.selector_missing && script.contains("!== null") {
                return Ok(Value::Bool(false));
            }
            if script == scripts::SCROLL_HEIGHT {
                return Ok(json!(4000));
            }
            Ok(Value::Bool(true))
        }
        async fn get_html(&self) -> anyhow::Result<String> {
            if self.script.hang_on_html {
                std::future::pending::<()>().await;
            }
            self.script
                .html
                .clone()
                .ok_or_else(|| anyhow::anyhow!("target closed"))
        }
        async fn take_responses(&self) -> Vec<NetworkResponse> {
            self.script.responses.clone()
        }
        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.tally.closes.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("close errors are swallowed")
        }
    }

    fn transport(script: Script) -> (BrowserTransport, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        let renderer = FakeRenderer {
            script,
            tally: Arc::clone(&tally),
        };
        (BrowserTransport::new(Arc::new(renderer)), tally)
    }

    fn options() -> TransportOptions {
        TransportOptions::default()
            .with_wait_for_js(true)
            .with_hydration_probe(HYDRATION_PROBE)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_appends_instrumentation_and_releases() {
        let (t, tally) = transport(Script {
            html: Some("<html><body>rendered</body></html>".into()),
            hydrate_on_attempt: Some(3),
            dom: json!([{"name": "Galaxy S24 Ultra", "price": "SAR 4,899", "url": "https://x/p/1"}]),
            responses: vec![NetworkResponse {
                url: "https://shop.example.com/api/search?q=galaxy".into(),
                status: 200,
                mime_type: "application/json".into(),
                body: Some(r#"{"products":[{"name":"Galaxy S24","price":3199}]}"#.into()),
            }],
            ..Default::default()
        });

        let content = t
            .fetch("https://shop.example.com/search?q=galaxy", &options())
            .await
            .unwrap();

        assert!(content.starts_with("<html><body>rendered</body></html>"));
        assert_eq!(decode_api_payloads(&content).len(), 1);
        assert_eq!(decode_dom_candidates(&content)[0].name, "Galaxy S24 Ultra");
        assert_eq!(decode_resources(&content).len(), 1);
        assert_eq!(tally.hydration_checks.load(Ordering::SeqCst), 3);
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);

        let setups = tally.setups.lock().unwrap();
        assert_eq!(setups.len(), 1);
        assert!(setups[0].init_script.contains("webdriver"));
        assert_eq!(setups[0].user_agent, USER_AGENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydration_gives_up_after_fifteen_attempts() {
        let (t, tally) = transport(Script {
            html: Some("<html></html>".into()),
            hydrate_on_attempt: None,
            dom: json!([]),
            ..Default::default()
        });

        let start = tokio::time::Instant::now();
        let content = t.fetch("https://shop.example.com/", &options()).await;
        assert!(content.is_ok());
        assert_eq!(tally.hydration_checks.load(Ordering::SeqCst), 15);
        assert!(start.elapsed() >= Duration::from_secs(14));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_is_not_fatal() {
        let (t, tally) = transport(Script {
            fail_navigation: true,
            html: Some("<html>partial</html>".into()),
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            ..Default::default()
        });

        let content = t.fetch("https://shop.example.com/", &options()).await.unwrap();
        assert!(content.contains("partial"));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_raises_unknown_and_releases() {
        let (t, tally) = transport(Script {
            html: None,
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            ..Default::default()
        });

        let err = t.fetch("https://shop.example.com/", &options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("target closed"));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_falls_back_to_captured_document() {
        let document = format!("<html>{}</html>", "p".repeat(capture::MIN_PAGE_BYTES));
        let (t, tally) = transport(Script {
            html: None,
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            responses: vec![NetworkResponse {
                url: "https://shop.example.com/".into(),
                status: 200,
                mime_type: "text/html".into(),
                body: Some(document.clone()),
            }],
            ..Default::default()
        });

        let content = t.fetch("https://shop.example.com/", &options()).await.unwrap();
        assert!(content.starts_with(&document));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_deadline_times_out_and_releases() {
        let (t, tally) = transport(Script {
            hang_on_html: true,
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            ..Default::default()
        });

        let opts = options().with_timeout(Duration::from_secs(5));
        let deadline = t.deadline(&opts);
        let start = tokio::time::Instant::now();
        let err = t.fetch("https://shop.example.com/", &opts).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(start.elapsed() >= deadline);
        assert!(start.elapsed() < deadline + Duration::from_secs(1));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_unknown() {
        let (t, tally) = transport(Script {
            fail_launch: true,
            ..Default::default()
        });
        let err = t.fetch("https://shop.example.com/", &options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(tally.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scoped_context_release_is_idempotent() {
        let tally = Arc::new(Tally::default());
        let ctx = FakeContext {
            script: Script::default(),
            tally: Arc::clone(&tally),
        };
        let mut scope = ScopedContext::new(Box::new(ctx));
        scope.release().await;
        scope.release().await;
        assert!(scope.is_released());
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selector_and_user_agent_override() {
        let (t, tally) = transport(Script {
            html: Some("<html></html>".into()),
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            ..Default::default()
        });
        let opts = options()
            .with_wait_for_selector("div.results")
            .with_header("User-Agent", "custom/2.0")
            .with_header("X-Debug", "1");
        t.fetch("https://shop.example.com/", &opts).await.unwrap();

        let scripts = tally.scripts.lock().unwrap();
        assert!(scripts.iter().any(|s| s.contains("div.results")));
        let setups = tally.setups.lock().unwrap();
        assert_eq!(setups[0].user_agent, "custom/2.0");
        assert_eq!(setups[0].extra_headers.get("X-Debug").map(String::as_str), Some("1"));
        assert!(!setups[0].extra_headers.contains_key("User-Agent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_selector_costs_its_cap() {
        let (t, tally) = transport(Script {
            html: Some("<html>grid never rendered</html>".into()),
            hydrate_on_attempt: Some(1),
            selector_missing: true,
            dom: json!([]),
            ..Default::default()
        });
        let opts = options().with_wait_for_selector("div.results");

        let start = tokio::time::Instant::now();
        let content = t.fetch("https://shop.example.com/", &opts).await.unwrap();
        assert!(content.contains("grid never rendered"));
        assert!(start.elapsed() >= t.settings().selector_cap);
        assert!(start.elapsed() < t.deadline(&opts));

        let selector_checks = tally
            .scripts
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.contains("div.results"))
            .count();
        assert_eq!(selector_checks, 40);
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_network_costs_idle_cap() {
        let (t, tally) = transport(Script {
            html: Some("<html>still polling</html>".into()),
            hydrate_on_attempt: Some(1),
            never_idle: true,
            dom: json!([]),
            ..Default::default()
        });

        let start = tokio::time::Instant::now();
        let content = t.fetch("https://shop.example.com/", &options()).await.unwrap();
        assert!(content.contains("still polling"));
        assert!(start.elapsed() >= t.settings().network_idle_cap);
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_snapshot_loses_to_captured_document() {
        let document = format!("<html>{}</html>", "p".repeat(capture::MIN_PAGE_BYTES));
        let (t, tally) = transport(Script {
            html: Some("<html>shell</html>".into()),
            hydrate_on_attempt: Some(1),
            dom: json!([]),
            responses: vec![NetworkResponse {
                url: "https://shop.example.com/".into(),
                status: 200,
                mime_type: "text/html".into(),
                body: Some(document.clone()),
            }],
            ..Default::default()
        });

        let content = t.fetch("https://shop.example.com/", &options()).await.unwrap();
        assert!(content.starts_with(&document));
        assert!(!content.contains("shell"));
        assert_eq!(tally.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_choose_markup_falls_back_to_larger_raw() {
        let raw = "x".repeat(100);
        let chosen = choose_markup(Ok("<html>tiny</html>".into()), Some(raw.clone())).unwrap();
        assert_eq!(chosen, raw);
        let chosen = choose_markup(Err(anyhow::anyhow!("gone")), Some(raw.clone())).unwrap();
        assert_eq!(chosen, raw);
    }

    #[test]
    fn test_choose_markup_prefers_snapshot() {
        let chosen = choose_markup(Ok("<html>live</html>".into()), Some("<a>".into())).unwrap();
        assert_eq!(chosen, "<html>live</html>");
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(Some(json!(true))));
        assert!(is_truthy(Some(json!(3))));
        assert!(!is_truthy(Some(json!(0))));
        assert!(!is_truthy(Some(Value::Null)));
        assert!(!is_truthy(None));
    }
}
