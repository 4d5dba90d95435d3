//! Chromium-based renderer using chromiumoxide.
//!
//! Every context is a separate headless Chromium process with its own
//! throwaway profile directory, so nothing leaks between fetches. Network
//! events are tracked from the moment the page exists: in-flight request
//! count for idle detection, and finished responses (with bodies for
//! documents, XHR and fetch traffic) for the capture pass.

use super::capture::NetworkResponse;
use super::renderer::{NavigationResult, PageSetup, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, Headers, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Bound on shutting a context's browser down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable overriding Chromium discovery.
pub const CHROMIUM_PATH_ENV: &str = "PRICE_SCRAPER_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. PRICE_SCRAPER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.price-scraper/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".price-scraper/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".price-scraper/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".price-scraper/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".price-scraper/chromium/chrome-linux64/chrome"),
                home.join(".price-scraper/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer. Launches one browser process per context.
pub struct ChromiumRenderer {
    chrome_path: PathBuf,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Locate Chromium; the browser itself is launched per context.
    pub fn new() -> Result<Self> {
        let chrome_path = find_chromium().with_context(|| {
            format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}.")
        })?;
        Ok(Self::with_executable(chrome_path))
    }

    pub fn with_executable(chrome_path: PathBuf) -> Self {
        Self {
            chrome_path,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig> {
        BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .user_data_dir(profile_dir)
            .window_size(1366, 900)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=en-US")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))
    }
}

fn unique_profile_dir() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "price-scraper-{}-{n}-{nanos}",
        std::process::id()
    ))
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let profile_dir = unique_profile_dir();
        let config = self.browser_config(&profile_dir)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(anyhow::Error::new(e).context("failed to create new page"));
            }
        };

        let network = Arc::new(Mutex::new(NetworkLog::new()));
        let listeners = match spawn_network_listeners(&page, Arc::clone(&network)).await {
            Ok(listeners) => listeners,
            Err(e) => {
                tracing::warn!("network capture unavailable: {e:#}");
                Vec::new()
            }
        };

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            browser,
            page,
            handler_task,
            listeners,
            network,
            profile_dir,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

// ── Network tracking ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingResponse {
    url: String,
    status: u16,
    mime_type: String,
    wants_body: bool,
}

struct NetworkLog {
    /// Request ids still in flight. Redirect hops reuse their request id.
    inflight: HashSet<String>,
    last_activity: Instant,
    pending: HashMap<String, PendingResponse>,
    finished: Vec<NetworkResponse>,
}

impl NetworkLog {
    fn new() -> Self {
        Self {
            inflight: HashSet::new(),
            last_activity: Instant::now(),
            pending: HashMap::new(),
            finished: Vec::new(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn on_request(&mut self, request_id: &str) {
        self.inflight.insert(request_id.to_string());
        self.touch();
    }

    fn on_response(&mut self, request_id: &str, response: PendingResponse) {
        self.pending.insert(request_id.to_string(), response);
        self.touch();
    }

    /// Returns the response recorded for the request, if any.
    fn on_finished(&mut self, request_id: &str) -> Option<PendingResponse> {
        self.inflight.remove(request_id);
        self.touch();
        self.pending.remove(request_id)
    }

    fn on_failed(&mut self, request_id: &str) {
        self.inflight.remove(request_id);
        self.pending.remove(request_id);
        self.touch();
    }

    fn is_idle(&self, quiet: Duration) -> bool {
        self.inflight.is_empty() && self.last_activity.elapsed() >= quiet
    }
}

fn wants_body(resource_type: &ResourceType, mime_type: &str) -> bool {
    matches!(
        resource_type,
        ResourceType::Document | ResourceType::Xhr | ResourceType::Fetch
    ) || mime_type.contains("json")
}

async fn spawn_network_listeners(
    page: &Page,
    network: Arc<Mutex<NetworkLog>>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let mut failed = page.event_listener::<EventLoadingFailed>().await?;

    let log = Arc::clone(&network);
    let requests_task = tokio::spawn(async move {
        while let Some(event) = requests.next().await {
            if let Ok(mut log) = log.lock() {
                log.on_request(event.request_id.inner());
            }
        }
    });

    let log = Arc::clone(&network);
    let responses_task = tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            let pending = PendingResponse {
                url: event.response.url.clone(),
                status: u16::try_from(event.response.status).unwrap_or(0),
                mime_type: event.response.mime_type.clone(),
                wants_body: wants_body(&event.r#type, &event.response.mime_type),
            };
            if let Ok(mut log) = log.lock() {
                log.on_response(event.request_id.inner(), pending);
            }
        }
    });

    let log = Arc::clone(&network);
    let body_page = page.clone();
    let finished_task = tokio::spawn(async move {
        while let Some(event) = finished.next().await {
            let pending = match log.lock() {
                Ok(mut log) => log.on_finished(event.request_id.inner()),
                Err(_) => None,
            };
            let Some(pending) = pending else {
                continue;
            };

            let body = if pending.wants_body {
                match body_page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(resp) if resp.result.base64_encoded => STANDARD
                        .decode(&resp.result.body)
                        .ok()
                        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
                    Ok(resp) => Some(resp.result.body.clone()),
                    Err(_) => None,
                }
            } else {
                None
            };

            if let Ok(mut log) = log.lock() {
                log.finished.push(NetworkResponse {
                    url: pending.url,
                    status: pending.status,
                    mime_type: pending.mime_type,
                    body,
                });
            }
        }
    });

    let log = network;
    let failed_task = tokio::spawn(async move {
        while let Some(event) = failed.next().await {
            if let Ok(mut log) = log.lock() {
                log.on_failed(event.request_id.inner());
            }
        }
    });

    Ok(vec![requests_task, responses_task, finished_task, failed_task])
}

// ── Context ─────────────────────────────────────────────────────────────────

/// A single Chromium process and page.
pub struct ChromiumContext {
    browser: Browser,
    page: Page,
    /// Drives the CDP connection; must outlive the close commands.
    handler_task: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
    network: Arc<Mutex<NetworkLog>>,
    profile_dir: PathBuf,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn prepare(&mut self, setup: &PageSetup) -> Result<()> {
        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(setup.user_agent.clone())
            .accept_language(setup.accept_language.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("invalid user agent override: {e}"))?;
        self.page
            .execute(ua)
            .await
            .context("failed to override user agent")?;

        if !setup.extra_headers.is_empty() {
            let headers = serde_json::to_value(&setup.extra_headers)?;
            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .context("failed to set extra headers")?;
        }

        if !setup.init_script.is_empty() {
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                    setup.init_script.clone(),
                ))
                .await
                .context("failed to install init script")?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_network_idle(&self, quiet: Duration, cap: Duration) -> bool {
        let deadline = Instant::now() + cap;
        loop {
            let idle = match self.network.lock() {
                Ok(log) => log.is_idle(quiet),
                Err(_) => return false,
            };
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn take_responses(&self) -> Vec<NetworkResponse> {
        match self.network.lock() {
            Ok(mut log) => std::mem::take(&mut log.finished),
            Err(_) => Vec::new(),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.active_count.fetch_sub(1, Ordering::Relaxed);
        for task in &this.listeners {
            task.abort();
        }

        let shutdown = async {
            let _ = this.page.clone().close().await;
            let _ = this.browser.close().await;
            let _ = this.browser.wait().await;
        };
        let clean = tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_ok();
        if !clean {
            // Dropping the Browser kills the child process.
            tracing::warn!("Chromium did not shut down within {}s", CLOSE_TIMEOUT.as_secs());
        }
        this.handler_task.abort();

        let _ = tokio::fs::remove_dir_all(&this.profile_dir).await;
        if clean {
            Ok(())
        } else {
            bail!("browser close timed out")
        }
    }
}
