//! Chrome-backed tab host

use super::{ChromeDriver, SessionState, TabHost};
use crate::config::BrowserSettings;
use crate::crawler::RunObserver;
use crate::fetch::http::DEFAULT_USER_AGENT;
use crate::fetch::script::{self, ActionScript};
use crate::fetch::{FetchError, PageSnapshot};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Sub-resource types never loaded
const BLOCKED_RESOURCE_TYPES: &[ResourceType] =
    &[ResourceType::Image, ResourceType::Stylesheet, ResourceType::Font];

fn should_block(resource_type: &ResourceType) -> bool {
    BLOCKED_RESOURCE_TYPES.contains(resource_type)
}

/// One interception pattern per blocked type, matching any URL
fn blocking_patterns() -> Vec<RequestPattern> {
    BLOCKED_RESOURCE_TYPES
        .iter()
        .map(|kind| {
            RequestPattern::builder()
                .url_pattern("*")
                .resource_type(kind.clone())
                .build()
        })
        .collect()
}

/// An open tab plus the task failing its blocked requests
pub struct ChromeTab {
    page: Page,
    blocker: JoinHandle<()>,
}

pub struct ChromeHost {
    browser: Browser,
    handler: JoinHandle<()>,
    script: Option<ActionScript>,
    session: Option<SessionState>,
    timeout: Duration,
}

impl ChromeHost {
    /// Launches the Chrome process
    pub async fn launch(
        settings: &BrowserSettings,
        script: Option<ActionScript>,
    ) -> Result<Self, FetchError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut builder = BrowserConfig::builder()
            .request_timeout(timeout)
            .arg(format!("--user-agent={}", DEFAULT_USER_AGENT));
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::Fatal)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Fatal(format!("failed to launch browser: {}", e)))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let session = settings
            .session_state
            .as_deref()
            .and_then(SessionState::load_or_warn);

        info!("Chrome launched (headless: {})", settings.headless);
        Ok(Self {
            browser,
            handler,
            script,
            session,
            timeout,
        })
    }

    /// Fails every paused request of a blocked type, lets anything else through
    async fn start_blocker(page: &Page) -> Result<JoinHandle<()>, FetchError> {
        let fatal = |e: chromiumoxide::error::CdpError| FetchError::Fatal(e.to_string());

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(fatal)?;
        page.execute(EnableParams::builder().patterns(blocking_patterns()).build())
            .await
            .map_err(fatal)?;

        let page = page.clone();
        Ok(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let result = if should_block(&event.resource_type) {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = result {
                    debug!("Resolving paused request failed: {}", e);
                }
            }
        }))
    }

    async fn restore_session(&self, page: &Page) {
        let Some(session) = &self.session else {
            return;
        };

        let cookies: Vec<CookieParam> = session
            .cookies
            .iter()
            .filter_map(|c| {
                CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only)
                    .build()
                    .map_err(|e| warn!("Skipping saved cookie {}: {}", c.name, e))
                    .ok()
            })
            .collect();
        if !cookies.is_empty() {
            if let Err(e) = page.set_cookies(cookies).await {
                warn!("Failed to restore cookies: {}", e);
            }
        }
        if let Some(source) = session.local_storage_script() {
            if let Err(e) = page
                .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(source))
                .await
            {
                warn!("Failed to restore local storage: {}", e);
            }
        }
    }
}

#[async_trait]
impl TabHost for ChromeHost {
    type Tab = ChromeTab;

    async fn open_tab(&self) -> Result<ChromeTab, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        let blocker = Self::start_blocker(&page).await?;
        self.restore_session(&page).await;
        Ok(ChromeTab { page, blocker })
    }

    async fn visit(
        &self,
        tab: &ChromeTab,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<PageSnapshot>, FetchError> {
        let page = &tab.page;
        let navigation = async {
            page.goto(NavigateParams::new(url.as_str())).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(FetchError::Page(e.to_string())),
            Err(_) => return Err(FetchError::Timeout),
        }

        let mut driver = ChromeDriver::new(page.clone());
        script::execute(self.script.as_ref(), &mut driver, observer)
            .await
            .map_err(|e| FetchError::Page(e.to_string()))
    }

    async fn close_tab(&self, tab: ChromeTab) {
        tab.blocker.abort();
        if let Err(e) = tab.page.close().await {
            debug!("Closing page failed: {}", e);
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}
