//! In-page measurement scripts.
//!
//! Every measurement a stage takes is a JavaScript expression evaluated through
//! [`BrowserDriver::evaluate`](crate::driver::BrowserDriver::evaluate). The
//! expressions live here so that stages, the audit engine and the scripted
//! test driver all agree on the exact text.

use serde_json::Value;

/// Navigation timing: milliseconds from navigation start to load event end.
pub const LOAD_TIME: &str = r"(() => {
  const nav = performance.getEntriesByType('navigation')[0];
  if (!nav || !nav.loadEventEnd) { return null; }
  return nav.loadEventEnd - nav.startTime;
})()";

/// Used JS heap in bytes, `null` when the engine does not expose it.
pub const HEAP_USED: &str =
    r"(performance.memory ? performance.memory.usedJSHeapSize : null)";

/// Time for two animation frames to elapse, a proxy for main-thread render cost.
pub const RENDER_TIME: &str = r"new Promise((resolve) => {
  const start = performance.now();
  requestAnimationFrame(() => requestAnimationFrame(() => resolve(performance.now() - start)));
})";

/// Passively observed paint and layout-shift entries, buffered since load.
pub const WEB_VITALS: &str = r"new Promise((resolve) => {
  const vitals = { fcp: null, lcp: null, cls: 0 };
  const observe = (type, fn) => {
    try { new PerformanceObserver((list) => list.getEntries().forEach(fn)).observe({ type, buffered: true }); }
    catch (e) { /* unsupported entry type */ }
  };
  observe('paint', (e) => { if (e.name === 'first-contentful-paint') { vitals.fcp = e.startTime; } });
  observe('largest-contentful-paint', (e) => { vitals.lcp = e.startTime; });
  observe('layout-shift', (e) => { if (!e.hadRecentInput) { vitals.cls += e.value; } });
  setTimeout(() => resolve(vitals), 1000);
})";

/// Number of `main` landmarks.
pub const MAIN_LANDMARKS: &str = r#"document.querySelectorAll('main, [role="main"]').length"#;

/// Number of level-one headings.
pub const H1_COUNT: &str =
    r#"document.querySelectorAll('h1, [role="heading"][aria-level="1"]').length"#;

/// Tag and label of the focused element, `null` when focus is on the body.
pub const FOCUS_STATE: &str = r"(() => {
  const el = document.activeElement;
  if (!el || el === document.body) { return null; }
  return { tag: el.tagName.toLowerCase(), label: el.getAttribute('aria-label') || el.textContent.trim().slice(0, 40) };
})()";

/// Presence of the APIs the app cannot run without.
pub const FEATURE_SUPPORT: &str = r"({
  localStorage: typeof window.localStorage !== 'undefined',
  fetch: typeof window.fetch === 'function',
  promise: typeof window.Promise === 'function'
})";

/// Link, storage and content-security facts for the security stage.
pub const SECURITY_SCAN: &str = r#"(() => {
  const links = Array.from(document.querySelectorAll('a[href]'));
  const https = location.protocol === 'https:';
  const insecure = Array.from(document.querySelectorAll('[src], link[href]'))
    .map((el) => el.getAttribute('src') || el.getAttribute('href') || '')
    .filter((url) => url.startsWith('http:'));
  return {
    protocol: location.protocol,
    hostname: location.hostname,
    javascriptLinks: links.filter((a) => a.getAttribute('href').trim().toLowerCase().startsWith('javascript:')).length,
    blankWithoutNoopener: links.filter((a) => a.target === '_blank' && !/noopener|noreferrer/.test(a.rel)).length,
    cspMeta: document.querySelector('meta[http-equiv="Content-Security-Policy"]') !== null,
    mixedContent: https ? insecure.length : 0,
    storageKeys: Object.keys(localStorage)
  };
})()"#;

/// Document metadata for the production-readiness stage.
pub const DOCUMENT_AUDIT: &str = r#"(() => ({
  title: document.title,
  lang: document.documentElement.getAttribute('lang'),
  viewportMeta: document.querySelector('meta[name="viewport"]') !== null,
  manifest: document.querySelector('link[rel="manifest"]') !== null,
  brokenImages: Array.from(document.images).filter((img) => img.complete && img.naturalWidth === 0).length
}))()"#;

/// Summary of loaded resources: script bytes plus slow-request counts.
#[must_use]
pub fn resource_summary(slow_ms: f64) -> String {
    format!(
        r"(() => {{
  const entries = performance.getEntriesByType('resource');
  const scripts = entries.filter((e) => e.initiatorType === 'script');
  return {{
    scriptBytes: scripts.reduce((sum, e) => sum + (e.transferSize || e.encodedBodySize || 0), 0),
    requests: entries.length,
    slow: entries.filter((e) => e.duration > {slow_ms}).length
  }};
}})()"
    )
}

/// Up to `cap` text-bearing elements with their computed text and effective
/// background colours.
#[must_use]
pub fn contrast_sample(cap: usize) -> String {
    format!(
        r"(() => {{
  const opaque = (c) => c && c !== 'transparent' && !/rgba\(.*,\s*0\)$/.test(c);
  const background = (el) => {{
    for (let node = el; node; node = node.parentElement) {{
      const bg = getComputedStyle(node).backgroundColor;
      if (opaque(bg)) {{ return bg; }}
    }}
    return 'rgb(255, 255, 255)';
  }};
  return Array.from(document.querySelectorAll('p, span, a, button, label, li, h1, h2, h3, h4, h5, h6'))
    .filter((el) => el.textContent.trim().length > 0)
    .slice(0, {cap})
    .map((el) => ({{
      color: getComputedStyle(el).color,
      background: background(el),
      context: el.tagName.toLowerCase() + ': ' + el.textContent.trim().slice(0, 40)
    }}));
}})()"
    )
}

/// Whether an element matching `selector` exists.
#[must_use]
pub fn element_present(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

/// Number of elements matching `selector`.
#[must_use]
pub fn element_count(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", js_string(selector))
}

/// Raw `localStorage` value for `key`.
#[must_use]
pub fn storage_item(key: &str) -> String {
    format!("localStorage.getItem({})", js_string(key))
}

/// Load axe-core from `url` unless already present.
#[must_use]
pub fn inject_axe(url: &str) -> String {
    format!(
        r"new Promise((resolve, reject) => {{
  if (window.axe) {{ resolve(true); return; }}
  const script = document.createElement('script');
  script.src = {};
  script.onload = () => resolve(true);
  script.onerror = () => reject(new Error('axe-core failed to load'));
  document.head.appendChild(script);
}})",
        js_string(url)
    )
}

/// Run axe-core restricted to `tags` and reduce the result to counts plus
/// violation summaries.
#[must_use]
pub fn run_axe(tags: &[String]) -> String {
    let values = serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string());
    format!(
        r"axe.run(document, {{ runOnly: {{ type: 'tag', values: {values} }} }}).then((r) => ({{
  violations: r.violations.map((v) => ({{ id: v.id, impact: v.impact, description: v.description, help: v.help, nodes: v.nodes.length }})),
  passes: r.passes.length,
  incomplete: r.incomplete.length,
  inapplicable: r.inapplicable.length
}}))"
    )
}

fn js_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string())
}

/// Numeric view of a script result. `null`, strings and non-finite numbers
/// yield `None`.
#[must_use]
pub fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Numeric field of an object result.
#[must_use]
pub fn field_number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(number)
}

/// Boolean field of an object result, `false` when absent.
#[must_use]
pub fn field_flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}
