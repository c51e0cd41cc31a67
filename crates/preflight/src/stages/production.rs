//! Production readiness of the served document.

use super::open_app;
use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::metric::{evaluate, CheckResult, Unit};
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use crate::stage::{Stage, StageRecorder};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Title, language, viewport meta, manifest, images, error overlay
#[derive(Debug, Clone)]
pub struct ProductionStage {
    config: Arc<SuiteConfig>,
}

impl ProductionStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

async fn document(driver: &mut dyn BrowserDriver, config: &SuiteConfig) -> PreflightResult<Value> {
    open_app(driver, config).await?;
    let audit = driver.evaluate(scripts::DOCUMENT_AUDIT).await?;
    if audit.is_object() {
        Ok(audit)
    } else {
        Err(PreflightError::unexpected("document audit", "expected an object"))
    }
}

fn non_empty(doc: &Value, key: &str, name: &str) -> CheckResult {
    let value = doc.get(key).and_then(Value::as_str).map(str::trim).unwrap_or("");
    let check = CheckResult::boolean(name, !value.is_empty());
    if value.is_empty() {
        check.with_message(format!("document {key} is empty"))
    } else {
        check.with_message(value.to_string())
    }
}

fn present(doc: &Value, key: &str, name: &str, what: &str) -> CheckResult {
    let ok = scripts::field_flag(doc, key);
    let check = CheckResult::boolean(name, ok);
    if ok {
        check
    } else {
        check.with_message(format!("no {what}"))
    }
}

#[async_trait]
impl Stage for ProductionStage {
    fn name(&self) -> &str {
        "production"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        let doc = match document(driver, config).await {
            Ok(doc) => doc,
            Err(e) => {
                recorder.record(CheckResult::errored("document", e.to_string()));
                return Ok(());
            }
        };

        recorder.record(non_empty(&doc, "title", "title"));
        recorder.record(non_empty(&doc, "lang", "lang"));
        recorder.record(present(&doc, "viewportMeta", "viewport-meta", "viewport meta tag"));
        recorder.record(present(&doc, "manifest", "manifest", "web app manifest link"));
        recorder.record(evaluate(
            "broken-images",
            scripts::field_number(&doc, "brokenImages"),
            0.0,
            Unit::Count,
        ));

        let overlay = scripts::element_present(&config.selectors.error_overlay);
        let outcome = driver.evaluate(&overlay).await.map(|shown| {
            let clean = shown.as_bool() == Some(false);
            let check = CheckResult::boolean("no-error-overlay", clean);
            if clean {
                check
            } else {
                check.with_message("error overlay is visible")
            }
        });
        recorder.record_result("no-error-overlay", outcome);
        Ok(())
    }
}
