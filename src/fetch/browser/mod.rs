//! Scripted headless-browser backend
//!
//! One Chrome process per run and one reused tab. Images, stylesheets and
//! fonts are blocked. After navigation the optional action script runs; when
//! a page fails the tab is closed and replaced, and if no replacement can be
//! opened the backend reports a fatal error.

mod chrome;
mod driver;
mod session;

pub use chrome::{ChromeHost, ChromeTab};
pub use driver::ChromeDriver;
pub use session::SessionState;

use super::script::ActionScript;
use super::{FetchBackend, FetchError, PageSnapshot};
use crate::config::BrowserSettings;
use crate::crawler::RunObserver;
use async_trait::async_trait;
use tracing::{error, info, warn};
use url::Url;

/// Owner of the browser process: opens, drives and closes tabs
#[async_trait]
pub trait TabHost: Send + Sync {
    type Tab: Send + Sync;

    async fn open_tab(&self) -> Result<Self::Tab, FetchError>;

    /// Navigates `tab` to `url` and runs the action script on it
    async fn visit(
        &self,
        tab: &Self::Tab,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<PageSnapshot>, FetchError>;

    async fn close_tab(&self, tab: Self::Tab);

    async fn close(&mut self);
}

pub struct BrowserBackend<H: TabHost = ChromeHost> {
    host: H,
    tab: Option<H::Tab>,
}

impl BrowserBackend<ChromeHost> {
    /// Launches Chrome and opens the first tab
    pub async fn launch(
        settings: &BrowserSettings,
        script: Option<ActionScript>,
    ) -> Result<Self, FetchError> {
        let host = ChromeHost::launch(settings, script).await?;
        Self::start(host).await
    }
}

impl<H: TabHost> BrowserBackend<H> {
    /// Wraps a running host and opens its first tab
    pub async fn start(host: H) -> Result<Self, FetchError> {
        let tab = host.open_tab().await?;
        info!("Browser backend ready");
        Ok(Self {
            host,
            tab: Some(tab),
        })
    }

    /// Replaces a wedged tab
    async fn recover_tab(&mut self, observer: &dyn RunObserver) -> Result<(), FetchError> {
        observer.progress("Attempting to recover browser page...");
        if let Some(old) = self.tab.take() {
            self.host.close_tab(old).await;
        }
        match self.host.open_tab().await {
            Ok(tab) => {
                self.tab = Some(tab);
                observer.progress("Browser page recovered. Continuing to next URL.");
                Ok(())
            }
            Err(e) => {
                error!("Failed to recover browser page: {}", e);
                observer.progress("Browser is unresponsive. Aborting run.");
                Err(FetchError::Fatal(format!("page recreation failed: {}", e)))
            }
        }
    }
}

#[async_trait]
impl<H: TabHost> FetchBackend for BrowserBackend<H> {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(
        &mut self,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<PageSnapshot>, FetchError> {
        if self.tab.is_none() {
            self.recover_tab(observer).await?;
        }

        let result = match &self.tab {
            Some(tab) => {
                observer.progress(&format!("Navigating to {}...", url));
                self.host.visit(tab, url, observer).await
            }
            None => return Err(FetchError::Fatal("no browser page".to_string())),
        };

        match result {
            Ok(snapshots) => Ok(snapshots),
            Err(e) => {
                warn!("Browser processing failed for {}: {}", url, e);
                self.recover_tab(observer).await?;
                Err(e)
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Some(tab) = self.tab.take() {
            self.host.close_tab(tab).await;
        }
        self.host.close().await;
    }
}
