//! Browser control for headless testing.
//!
//! Real browser control via the Chrome `DevTools` Protocol. When compiled with
//! the `browser` feature, [`ChromiumDriver`] implements
//! [`BrowserDriver`](crate::driver::BrowserDriver) on top of chromiumoxide.
//! Without the feature only the configuration type is available and callers
//! are expected to supply their own driver.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Timeout applied to every individual driver call, in milliseconds
    pub operation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            operation_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Per-call timeout
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc)]
mod cdp {
    use super::BrowserConfig;
    use crate::driver::{BrowserDriver, ColorScheme, Screenshot, Viewport};
    use crate::result::{PreflightError, PreflightResult};
    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::emulation::{
        MediaFeature, SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
        SetUserAgentOverrideParams,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::future::Future;
    use std::time::{Duration, Instant};

    const SELECTOR_POLL: Duration = Duration::from_millis(100);

    /// Browser session with a real CDP connection
    #[derive(Debug)]
    pub struct ChromiumDriver {
        config: BrowserConfig,
        browser: CdpBrowser,
        handle: tokio::task::JoinHandle<()>,
        page: Option<CdpPage>,
    }

    impl ChromiumDriver {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> PreflightResult<Self> {
            let mut builder = CdpConfig::builder();

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| PreflightError::BrowserLaunchError { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                PreflightError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(Self {
                config,
                browser,
                handle,
                page: None,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        fn page(&self) -> PreflightResult<&CdpPage> {
            self.page.as_ref().ok_or(PreflightError::NoPage)
        }

        async fn timed<T>(
            &self,
            fut: impl Future<Output = PreflightResult<T>> + Send,
        ) -> PreflightResult<T> {
            let limit = self.config.operation_timeout();
            tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| PreflightError::Timeout {
                    ms: limit.as_millis() as u64,
                })?
        }

        async fn find(&self, selector: &str) -> PreflightResult<Element> {
            self.page()?
                .find_element(selector)
                .await
                .map_err(|e| PreflightError::element(selector, e.to_string()))
        }
    }

    fn page_error(e: impl std::fmt::Display) -> PreflightError {
        PreflightError::PageError {
            message: e.to_string(),
        }
    }

    #[async_trait]
    impl BrowserDriver for ChromiumDriver {
        async fn new_page(&mut self, viewport: &Viewport) -> PreflightResult<()> {
            self.close_page().await?;
            let page = self
                .timed(async {
                    self.browser
                        .new_page("about:blank")
                        .await
                        .map_err(page_error)
                })
                .await?;
            let metrics = SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                1.0,
                viewport.mobile,
            );
            page.execute(metrics).await.map_err(page_error)?;
            self.page = Some(page);
            Ok(())
        }

        async fn set_user_agent(&mut self, user_agent: &str) -> PreflightResult<()> {
            let page = self.page()?;
            self.timed(async {
                page.execute(SetUserAgentOverrideParams::new(user_agent))
                    .await
                    .map(|_| ())
                    .map_err(page_error)
            })
            .await
        }

        async fn goto(&mut self, url: &str) -> PreflightResult<()> {
            let page = self.page()?;
            self.timed(async {
                page.goto(url)
                    .await
                    .map(|_| ())
                    .map_err(|e| PreflightError::NavigationError {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
            })
            .await
        }

        async fn wait_for_selector(
            &mut self,
            selector: &str,
            timeout: Duration,
        ) -> PreflightResult<()> {
            let page = self.page()?;
            let started = Instant::now();
            loop {
                if page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                if started.elapsed() >= timeout {
                    return Err(PreflightError::Timeout {
                        ms: timeout.as_millis() as u64,
                    });
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        }

        async fn click(&mut self, selector: &str) -> PreflightResult<()> {
            self.timed(async {
                let element = self.find(selector).await?;
                element
                    .click()
                    .await
                    .map(|_| ())
                    .map_err(|e| PreflightError::element(selector, e.to_string()))
            })
            .await
        }

        async fn keyboard_press(&mut self, key: &str) -> PreflightResult<()> {
            self.timed(async {
                let target = match self.find(":focus").await {
                    Ok(element) => element,
                    Err(_) => self.find("body").await?,
                };
                target
                    .press_key(key)
                    .await
                    .map(|_| ())
                    .map_err(page_error)
            })
            .await
        }

        async fn evaluate(&mut self, script: &str) -> PreflightResult<serde_json::Value> {
            let page = self.page()?;
            let params = EvaluateParams::builder()
                .expression(script)
                .await_promise(true)
                .return_by_value(true)
                .build()
                .map_err(PreflightError::script)?;
            self.timed(async {
                let result = page
                    .evaluate_expression(params)
                    .await
                    .map_err(|e| PreflightError::script(e.to_string()))?;
                Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
            })
            .await
        }

        async fn screenshot(&mut self) -> PreflightResult<Screenshot> {
            let page = self.page()?;
            self.timed(async {
                let params = CaptureScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build();

                let screenshot =
                    page.execute(params)
                        .await
                        .map_err(|e| PreflightError::ScreenshotError {
                            message: e.to_string(),
                        })?;

                base64::engine::general_purpose::STANDARD
                    .decode(&screenshot.data)
                    .map(Screenshot::new)
                    .map_err(|e| PreflightError::ScreenshotError {
                        message: e.to_string(),
                    })
            })
            .await
        }

        async fn element_screenshot(&mut self, selector: &str) -> PreflightResult<Screenshot> {
            self.timed(async {
                let element = self.find(selector).await?;
                element
                    .screenshot(CaptureScreenshotFormat::Png)
                    .await
                    .map(Screenshot::new)
                    .map_err(|e| PreflightError::ScreenshotError {
                        message: e.to_string(),
                    })
            })
            .await
        }

        async fn emulate_color_scheme(&mut self, scheme: ColorScheme) -> PreflightResult<()> {
            let page = self.page()?;
            let params = SetEmulatedMediaParams::builder()
                .feature(MediaFeature::new("prefers-color-scheme", scheme.as_str()))
                .build();
            self.timed(async { page.execute(params).await.map(|_| ()).map_err(page_error) })
                .await
        }

        async fn close_page(&mut self) -> PreflightResult<()> {
            if let Some(page) = self.page.take() {
                page.close().await.map_err(page_error)?;
            }
            Ok(())
        }

        async fn close(&mut self) -> PreflightResult<()> {
            self.close_page().await?;
            self.browser
                .close()
                .await
                .map_err(|e| PreflightError::BrowserLaunchError {
                    message: e.to_string(),
                })?;
            self.handle.abort();
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
