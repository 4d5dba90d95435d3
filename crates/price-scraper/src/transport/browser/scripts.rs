//! JavaScript evaluated inside rendered pages.

/// Installed before any page script runs. Masks the most common headless
/// fingerprints: empty plugin list, missing languages, the webdriver flag,
/// the permissions API answering "denied" for notifications, and a missing
/// `window.chrome`.
pub const STEALTH_INIT: &str = r#"
(() => {
  const define = (obj, prop, value) => {
    try { Object.defineProperty(obj, prop, { get: () => value, configurable: true }); } catch (_) {}
  };
  define(navigator, 'webdriver', undefined);
  define(navigator, 'languages', ['en-US', 'en', 'ar']);
  define(navigator, 'plugins', [
    { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
    { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
    { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' },
  ]);
  if (!window.chrome) {
    window.chrome = { runtime: {}, loadTimes: () => ({}), csi: () => ({}) };
  }
  if (navigator.permissions && navigator.permissions.query) {
    const original = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) =>
      parameters && parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission, onchange: null })
        : original(parameters);
  }
})();
"#;

/// Generic hydration signal used when a marketplace supplies none: any
/// element that looks like a rendered price.
pub const GENERIC_HYDRATION_PROBE: &str = r#"
(() => document.querySelectorAll(
  '[class*="price" i], [data-price], [itemprop="price"], [data-qa*="price" i]'
).length > 0)()
"#;

/// Height of the scrollable document.
pub const SCROLL_HEIGHT: &str =
    "Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight)";

/// Scroll the window to an absolute vertical offset.
pub fn scroll_to(y: i64) -> String {
    format!("(() => {{ window.scrollTo(0, {y}); return true; }})()")
}

/// Whether `selector` currently matches an element.
pub fn selector_present(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!("(() => {{ try {{ return document.querySelector({quoted}) !== null; }} catch (_) {{ return false; }} }})()")
}

/// Harvest name/price/url triples straight from the live document.
///
/// Product containers are found through loose selectors; within each the
/// name comes from a heading, title attribute or link text and the price
/// from the first price-styled element.
pub fn dom_candidates(limit: usize) -> String {
    format!(
        r#"
(() => {{
  const LIMIT = {limit};
  const text = (el) => (el && (el.innerText || el.textContent) || '').replace(/\s+/g, ' ').trim();
  const containers = document.querySelectorAll([
    '[data-component-type="s-search-result"]',
    '[data-qa*="product" i]',
    '[class*="product-tile" i]',
    '[class*="productContainer" i]',
    '[class*="product-card" i]',
    '[class*="product-item" i]',
    '[itemtype*="Product"]',
    'li[class*="product" i]',
    'article[class*="product" i]'
  ].join(','));
  const out = [];
  const seen = new Set();
  for (const c of containers) {{
    if (out.length >= LIMIT) break;
    const priceEl = c.querySelector('[data-price], [itemprop="price"], .a-price .a-offscreen, [class*="price" i]');
    if (!priceEl) continue;
    const price = priceEl.getAttribute('data-price') || priceEl.getAttribute('content') || text(priceEl);
    const nameEl = c.querySelector('h2, h3, [data-qa*="name" i], [class*="name" i], [class*="title" i], a[title]');
    const name = (nameEl && (nameEl.getAttribute('title') || text(nameEl))) || '';
    const link = c.querySelector('a[href]');
    const img = c.querySelector('img[src]');
    if (!name || !price) continue;
    const key = name + '|' + price;
    if (seen.has(key)) continue;
    seen.add(key);
    out.push({{
      name: name.slice(0, 300),
      price: String(price).slice(0, 60),
      url: link ? link.href : undefined,
      image: img ? img.src : undefined
    }});
  }}
  return out;
}})()
"#
    )
}
