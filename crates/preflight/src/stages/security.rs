//! Client-side security posture of the loaded app.
//!
//! One in-page scan feeds every check: transport, `javascript:` links,
//! credential-looking storage keys, `target=_blank` without `noopener`, a CSP
//! meta tag, and mixed content. A missing CSP is only a warning since the
//! policy is usually sent as a header the page cannot see.

use super::open_app;
use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::metric::{evaluate, CheckResult, Unit};
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use crate::stage::{Stage, StageRecorder};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

fn secret_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)token|secret|password|passwd|api[_-]?key|credential").ok())
        .as_ref()
}

/// Storage keys that look like they hold credentials
#[must_use]
pub fn suspicious_storage_keys(keys: &[String]) -> Vec<String> {
    let Some(pattern) = secret_key_pattern() else {
        return Vec::new();
    };
    keys.iter()
        .filter(|k| pattern.is_match(k))
        .cloned()
        .collect()
}

/// Scans the app for client-side security problems
#[derive(Debug, Clone)]
pub struct SecurityStage {
    config: Arc<SuiteConfig>,
}

impl SecurityStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

async fn scan(driver: &mut dyn BrowserDriver, config: &SuiteConfig) -> PreflightResult<Value> {
    open_app(driver, config).await?;
    let scan = driver.evaluate(scripts::SECURITY_SCAN).await?;
    if scan.is_object() {
        Ok(scan)
    } else {
        Err(PreflightError::unexpected("security scan", "expected an object"))
    }
}

fn transport(scan: &Value) -> CheckResult {
    let protocol = scan.get("protocol").and_then(Value::as_str).unwrap_or("");
    let host = scan.get("hostname").and_then(Value::as_str).unwrap_or("");
    let ok = protocol == "https:" || LOCAL_HOSTS.contains(&host);
    let check = CheckResult::boolean("https", ok);
    if ok {
        check
    } else {
        check.with_message(format!("served over {protocol} from {host}"))
    }
}

fn none_found(scan: &Value, key: &str, name: &str) -> CheckResult {
    evaluate(name, scripts::field_number(scan, key), 0.0, Unit::Count)
}

#[async_trait]
impl Stage for SecurityStage {
    fn name(&self) -> &str {
        "security"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let scan = match scan(driver, &self.config).await {
            Ok(scan) => scan,
            Err(e) => {
                recorder.record(CheckResult::errored("scan", e.to_string()));
                return Ok(());
            }
        };

        recorder.record(transport(&scan));
        recorder.record(none_found(&scan, "javascriptLinks", "no-javascript-links"));

        let keys: Vec<String> = scan
            .get("storageKeys")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let suspicious = suspicious_storage_keys(&keys);
        let check = CheckResult::boolean("no-secrets-in-storage", suspicious.is_empty());
        recorder.record(if suspicious.is_empty() {
            check
        } else {
            check.with_message(format!("localStorage keys: {}", suspicious.join(", ")))
        });

        recorder.record(none_found(&scan, "blankWithoutNoopener", "noopener"));

        if scripts::field_flag(&scan, "cspMeta") {
            recorder.record(CheckResult::boolean("csp", true));
        } else {
            recorder.warn("no Content-Security-Policy meta tag; verify the response header");
        }

        recorder.record(none_found(&scan, "mixedContent", "no-mixed-content"));
        Ok(())
    }
}
