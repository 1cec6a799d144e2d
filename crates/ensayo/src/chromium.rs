//! Chromium session: real browser control over CDP via chromiumoxide.
//!
//! Only compiled with the `browser` feature. Element interactions are
//! performed through JavaScript evaluation against the locator's query
//! expression, so a handle is re-resolved on every interaction and
//! never goes stale across re-renders.

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use tracing::debug;

use crate::driver::{Driver, ElementHandle, SessionConfig};
use crate::locator::Locator;
use crate::plan::SelectDirective;
use crate::result::{EnsayoError, EnsayoResult};

/// One exclusively owned Chromium session.
#[derive(Debug)]
pub struct ChromiumSession {
    #[allow(dead_code)]
    config: SessionConfig,
    browser: CdpBrowser,
    #[allow(dead_code)]
    handler_task: tokio::task::JoinHandle<()>,
    page: CdpPage,
}

impl ChromiumSession {
    /// Launch a browser and open one page for this session.
    pub async fn launch(config: SessionConfig) -> EnsayoResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(ref ua) = config.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }

        let cdp_config = builder.build().map_err(|message| EnsayoError::Session { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| EnsayoError::Session {
                    message: e.to_string(),
                })?;

        // Drive the CDP event loop until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| EnsayoError::Session {
                message: e.to_string(),
            })?;

        Ok(Self {
            config,
            browser,
            handler_task,
            page,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, expr: String) -> EnsayoResult<T> {
        let result = self
            .page
            .evaluate(expr)
            .await
            .map_err(|e| EnsayoError::Interaction {
                message: e.to_string(),
            })?;
        result.into_value().map_err(|e| EnsayoError::Interaction {
            message: e.to_string(),
        })
    }

    /// Run an element-scoped JS body; `false` means the element
    /// vanished or the effect could not apply.
    async fn apply(&self, element: &ElementHandle, body: &str) -> EnsayoResult<()> {
        let expr = element_js(element.locator(), body);
        if self.eval::<bool>(expr).await? {
            Ok(())
        } else {
            Err(EnsayoError::Interaction {
                message: format!("element vanished or rejected the action: {}", element.locator()),
            })
        }
    }
}

fn element_js(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; {} return true; }})()",
        locator.to_query(),
        body
    )
}

fn select_body(directive: &SelectDirective) -> String {
    let pick = match directive {
        SelectDirective::ByValue(v) => {
            format!("const i = Array.from(el.options).findIndex(o => o.value === {v:?});")
        }
        SelectDirective::ByIndex(i) => format!("const i = {i} < el.options.length ? {i} : -1;"),
        SelectDirective::ByText(t) => format!(
            "const i = Array.from(el.options).findIndex(o => o.textContent.trim() === {t:?});"
        ),
    };
    format!(
        "{pick} if (i < 0) return false; el.selectedIndex = i; \
         el.dispatchEvent(new Event('change', {{bubbles: true}}));"
    )
}

#[async_trait]
impl Driver for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> EnsayoResult<()> {
        debug!(url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| EnsayoError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| EnsayoError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn find(&mut self, locator: &Locator) -> EnsayoResult<Option<ElementHandle>> {
        let attached = self.eval::<bool>(format!("!!({})", locator.to_query())).await?;
        Ok(attached.then(|| ElementHandle::new(locator.clone())))
    }

    async fn click(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.apply(element, "el.click();").await
    }

    async fn clear(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.apply(
            element,
            "el.value = ''; el.dispatchEvent(new Event('input', {bubbles: true}));",
        )
        .await
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> EnsayoResult<()> {
        let body = format!(
            "el.value = {text:?}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}}));"
        );
        self.apply(element, &body).await
    }

    async fn select_option(
        &mut self,
        element: &ElementHandle,
        directive: &SelectDirective,
    ) -> EnsayoResult<()> {
        self.apply(element, &select_body(directive)).await
    }

    async fn scroll_into_view(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.apply(element, "el.scrollIntoView({block: 'center', inline: 'center'});")
            .await
    }

    async fn hover(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.apply(
            element,
            "el.dispatchEvent(new MouseEvent('mouseover', {bubbles: true})); \
             el.dispatchEvent(new MouseEvent('mouseenter'));",
        )
        .await
    }

    async fn text(&mut self, element: &ElementHandle) -> EnsayoResult<String> {
        let expr = format!(
            "(() => {{ const el = {}; return el ? (el.textContent || '') : null; }})()",
            element.locator().to_query()
        );
        self.eval::<Option<String>>(expr)
            .await?
            .ok_or_else(|| EnsayoError::Interaction {
                message: format!("element vanished: {}", element.locator()),
            })
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> EnsayoResult<bool> {
        let expr = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             const s = window.getComputedStyle(el); \
             if (s.display === 'none' || s.visibility === 'hidden') return false; \
             const r = el.getBoundingClientRect(); \
             return r.width > 0 && r.height > 0; }})()",
            element.locator().to_query()
        );
        self.eval::<bool>(expr).await
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> EnsayoResult<bool> {
        let expr = format!(
            "(() => {{ const el = {}; return !!el && !el.disabled; }})()",
            element.locator().to_query()
        );
        self.eval::<bool>(expr).await
    }

    async fn screenshot(&mut self) -> EnsayoResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| EnsayoError::Screenshot {
                message: e.to_string(),
            })?;
        base64::engine::general_purpose::STANDARD
            .decode(&response.data)
            .map_err(|e| EnsayoError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| EnsayoError::Session {
                message: e.to_string(),
            })?;
        Ok(())
    }
}
