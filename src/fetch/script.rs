//! Browser action scripts
//!
//! An action script is a JSON array of blocks, each tagged by `type` and
//! carrying only its own fields. Control blocks (`if_condition`, `repeat`)
//! nest further blocks under `children`.
//!
//! ```json
//! [
//!   {"type": "click", "by": "text", "text_value": "Accept cookies"},
//!   {"type": "repeat", "max_iterations": 20, "children": [
//!     {"type": "scrape"},
//!     {"type": "if_condition", "condition": "is_not_visible",
//!      "selector_value": "a.next", "children": [{"type": "break_loop"}]},
//!     {"type": "click", "selector_value": "a.next"},
//!     {"type": "wait", "duration": "1-3"}
//!   ]}
//! ]
//! ```
//!
//! Scripts run against a [`PageDriver`], with a [`ScriptContext`] exposing the
//! `scrape` / `log` / `is_cancelled` primitives. Failures inside a script are
//! reported and never abort the run.

use super::retry::random_between;
use super::PageSnapshot;
use crate::crawler::RunObserver;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const WAIT_FOR_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LOOP_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read action script: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid action script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no element matches {0}")]
    NotFound(Locator),

    #[error("timed out after {waited:?} waiting for {target} to be {state}")]
    Timeout {
        target: Locator,
        state: WaitState,
        waited: Duration,
    },

    #[error("browser command failed: {0}")]
    Driver(String),
}

/// How a block identifies its target element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateBy {
    #[default]
    Selector,
    Text,
    Both,
}

/// A resolved element locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    Text(String),
    /// Selector match that also contains the text
    Filtered { selector: Box<Locator>, text: String },
}

impl Locator {
    /// Builds a locator from a selector string, detecting path expressions
    pub fn selector(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with('/') || trimmed.starts_with('(') || trimmed.starts_with("..") {
            Self::XPath(trimmed.to_string())
        } else {
            Self::Css(trimmed.to_string())
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "selector {:?}", s),
            Self::XPath(s) => write!(f, "xpath {:?}", s),
            Self::Text(t) => write!(f, "text {:?}", t),
            Self::Filtered { selector, text } => write!(f, "{} with text {:?}", selector, text),
        }
    }
}

/// Locator fields shared by element blocks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub by: LocateBy,
    #[serde(default)]
    pub selector_value: String,
    #[serde(default)]
    pub text_value: String,
}

impl Target {
    pub fn locator(&self) -> Locator {
        match self.by {
            LocateBy::Selector => Locator::selector(&self.selector_value),
            LocateBy::Text => Locator::Text(self.text_value.clone()),
            LocateBy::Both => Locator::Filtered {
                selector: Box::new(Locator::selector(&self.selector_value)),
                text: self.text_value.clone(),
            },
        }
    }
}

/// States `wait_for_element` can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
    Enabled,
    Disabled,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Checks available to `if_condition`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    IsVisible,
    IsNotVisible,
    IsEnabled,
    IsDisabled,
}

/// Observed state of the first element matching a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementState {
    pub attached: bool,
    pub visible: bool,
    pub enabled: bool,
}

impl ElementState {
    fn satisfies(&self, state: WaitState) -> bool {
        match state {
            WaitState::Visible => self.visible,
            WaitState::Hidden => !self.visible,
            WaitState::Attached => self.attached,
            WaitState::Detached => !self.attached,
            WaitState::Enabled => self.attached && self.enabled,
            WaitState::Disabled => self.attached && !self.enabled,
        }
    }

    fn meets(&self, condition: Condition) -> bool {
        match condition {
            Condition::IsVisible => self.visible,
            Condition::IsNotVisible => !self.visible,
            Condition::IsEnabled => self.attached && self.enabled,
            Condition::IsDisabled => self.attached && !self.enabled,
        }
    }
}

/// One script step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Click {
        #[serde(flatten)]
        target: Target,
    },
    SelectForm {
        #[serde(flatten)]
        target: Target,
        #[serde(default)]
        option_text: String,
    },
    InputText {
        #[serde(flatten)]
        target: Target,
        #[serde(default)]
        input_text: String,
    },
    WaitForElement {
        #[serde(flatten)]
        target: Target,
        #[serde(default)]
        condition: WaitState,
    },
    Wait {
        #[serde(default = "default_duration")]
        duration: String,
    },
    Scroll {
        #[serde(default = "default_pixels")]
        pixels: i64,
    },
    Scrape,
    Log {
        #[serde(default)]
        message: String,
    },
    Evaluate {
        script: String,
    },
    IfCondition {
        #[serde(flatten)]
        target: Target,
        #[serde(default)]
        condition: Condition,
        #[serde(default)]
        children: Vec<Block>,
    },
    Repeat {
        #[serde(default)]
        max_iterations: Option<u32>,
        #[serde(default)]
        children: Vec<Block>,
    },
    BreakLoop,
}

fn default_duration() -> String {
    "1".to_string()
}

fn default_pixels() -> i64 {
    500
}

/// A parsed action script
#[derive(Debug, Clone, Default)]
pub struct ActionScript {
    pub blocks: Vec<Block>,
}

impl ActionScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ScriptError> {
        let blocks: Vec<Block> = serde_json::from_str(content)?;
        Ok(Self { blocks })
    }
}

/// Parses a `wait` duration: `"2"`, `"0.5"` or a random range `"1-3"`
pub fn parse_wait(duration: &str) -> Result<Duration, String> {
    let seconds = |s: &str| -> Option<Duration> {
        let value: f64 = s.trim().parse().ok()?;
        (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
    };

    let duration = duration.trim();
    let parsed = match duration.split_once('-') {
        Some((low, high)) => match (seconds(low), seconds(high)) {
            (Some(low), Some(high)) if low <= high => Some(random_between(low, high)),
            _ => None,
        },
        None => seconds(duration),
    };
    parsed.ok_or_else(|| format!("Invalid wait duration {:?}, defaulting to 1s", duration))
}

/// Browser operations a script can perform
#[async_trait]
pub trait PageDriver: Send {
    async fn click(&mut self, target: &Locator) -> Result<(), ScriptError>;

    /// Selects the option whose label is `label`
    async fn select_option(&mut self, target: &Locator, label: &str) -> Result<(), ScriptError>;

    /// Replaces the value of an input
    async fn fill(&mut self, target: &Locator, text: &str) -> Result<(), ScriptError>;

    async fn probe(&mut self, target: &Locator) -> Result<ElementState, ScriptError>;

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScriptError>;

    async fn evaluate(&mut self, script: &str) -> Result<(), ScriptError>;

    async fn snapshot(&mut self) -> Result<PageSnapshot, ScriptError>;
}

/// Primitives exposed to a running script
pub struct ScriptContext<'o> {
    observer: &'o dyn RunObserver,
    snapshots: Vec<PageSnapshot>,
    scrape_called: bool,
}

impl<'o> ScriptContext<'o> {
    pub fn new(observer: &'o dyn RunObserver) -> Self {
        Self {
            observer,
            snapshots: Vec::new(),
            scrape_called: false,
        }
    }

    /// Captures the current page for extraction
    pub async fn scrape(&mut self, driver: &mut dyn PageDriver) {
        self.scrape_called = true;
        match driver.snapshot().await {
            Ok(snapshot) => {
                self.log(&format!("scrape() called on {}", snapshot.final_url));
                self.snapshots.push(snapshot);
            }
            Err(e) => {
                warn!("scrape() failed: {}", e);
                self.log(&format!("Error during scrape(): {}", e));
            }
        }
    }

    pub fn log(&self, line: &str) {
        self.observer.progress(line);
    }

    pub fn is_cancelled(&self) -> bool {
        self.observer.is_cancelled()
    }

    pub fn scrape_called(&self) -> bool {
        self.scrape_called
    }

    pub fn into_snapshots(self) -> Vec<PageSnapshot> {
        self.snapshots
    }
}

/// Result of running a block list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Break,
}

/// Runs `script` (if any) on the current page and returns the snapshots to extract.
///
/// Script failures are reported through the context and swallowed. When the
/// script never calls `scrape`, or there is no script, the final page state
/// is captured; a failure there means the page itself is broken and is
/// returned as an error.
pub async fn execute(
    script: Option<&ActionScript>,
    driver: &mut dyn PageDriver,
    observer: &dyn RunObserver,
) -> Result<Vec<PageSnapshot>, ScriptError> {
    let mut ctx = ScriptContext::new(observer);

    if let Some(script) = script {
        if let Err(e) = run_blocks(&script.blocks, driver, &mut ctx).await {
            warn!("Action script failed: {}", e);
            ctx.log(&format!("Script error: {}", e));
        }
        if !ctx.scrape_called() {
            ctx.log("Script finished. Auto-scraping final page state...");
        }
    }

    if !ctx.scrape_called() {
        let snapshot = driver.snapshot().await?;
        ctx.snapshots.push(snapshot);
    }

    Ok(ctx.into_snapshots())
}

fn run_blocks<'a, 'o: 'a>(
    blocks: &'a [Block],
    driver: &'a mut dyn PageDriver,
    ctx: &'a mut ScriptContext<'o>,
) -> BoxFuture<'a, Result<Flow, ScriptError>> {
    Box::pin(async move {
        for block in blocks {
            if run_block(block, driver, ctx).await? == Flow::Break {
                return Ok(Flow::Break);
            }
        }
        Ok(Flow::Continue)
    })
}

async fn run_block(
    block: &Block,
    driver: &mut dyn PageDriver,
    ctx: &mut ScriptContext<'_>,
) -> Result<Flow, ScriptError> {
    match block {
        Block::Click { target } => {
            let locator = target.locator();
            ctx.log(&format!("Clicking {}", locator));
            driver.click(&locator).await?;
        }
        Block::SelectForm {
            target,
            option_text,
        } => {
            let locator = target.locator();
            ctx.log(&format!("Selecting option '{}' from {}", option_text, locator));
            driver.select_option(&locator, option_text).await?;
        }
        Block::InputText { target, input_text } => {
            let locator = target.locator();
            ctx.log(&format!("Typing '{}' into {}", input_text, locator));
            driver.fill(&locator, input_text).await?;
        }
        Block::WaitForElement { target, condition } => {
            let locator = target.locator();
            ctx.log(&format!("Waiting for {} to be {}...", locator, condition));
            wait_for(driver, &locator, *condition, WAIT_FOR_TIMEOUT).await?;
        }
        Block::Wait { duration } => {
            let pause = match parse_wait(duration) {
                Ok(pause) => pause,
                Err(msg) => {
                    ctx.log(&msg);
                    Duration::from_secs(1)
                }
            };
            ctx.log(&format!("Waiting for {:.2}s", pause.as_secs_f64()));
            tokio::time::sleep(pause).await;
        }
        Block::Scroll { pixels } => {
            ctx.log(&format!("Scrolling down {}px", pixels));
            driver.scroll_by(*pixels).await?;
        }
        Block::Scrape => ctx.scrape(driver).await,
        Block::Log { message } => ctx.log(message),
        Block::Evaluate { script } => {
            debug!("Evaluating script block ({} bytes)", script.len());
            driver.evaluate(script).await?;
        }
        Block::IfCondition {
            target,
            condition,
            children,
        } => {
            let locator = target.locator();
            let state = driver.probe(&locator).await?;
            if state.meets(*condition) {
                return run_blocks(children, driver, ctx).await;
            }
        }
        Block::Repeat {
            max_iterations,
            children,
        } => {
            ctx.log("Starting loop...");
            let mut iterations = 0u32;
            loop {
                if ctx.is_cancelled() {
                    ctx.log("Loop cancelled by user.");
                    break;
                }
                if max_iterations.is_some_and(|max| iterations >= max) {
                    ctx.log(&format!("Loop stopped after {} iteration(s)", iterations));
                    break;
                }
                iterations += 1;
                if run_blocks(children, driver, ctx).await? == Flow::Break {
                    break;
                }
                tokio::time::sleep(LOOP_PAUSE).await;
            }
        }
        Block::BreakLoop => {
            ctx.log("Breaking loop...");
            return Ok(Flow::Break);
        }
    }
    Ok(Flow::Continue)
}

/// Polls until the element reaches `state` or `timeout` elapses
async fn wait_for(
    driver: &mut dyn PageDriver,
    locator: &Locator,
    state: WaitState,
    timeout: Duration,
) -> Result<(), ScriptError> {
    let started = Instant::now();
    loop {
        if driver.probe(locator).await?.satisfies(state) {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(ScriptError::Timeout {
                target: locator.clone(),
                state,
                waited: started.elapsed(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CancelFlag, RunObserver};
    use std::sync::Mutex;
    use url::Url;

    /// Records driver calls; a page with a fixed number of "next" clicks
    struct MockDriver {
        calls: Vec<String>,
        pages_left: u32,
        page: u32,
        fail_snapshot: bool,
    }

    impl MockDriver {
        fn new(pages: u32) -> Self {
            Self {
                calls: Vec::new(),
                pages_left: pages,
                page: 1,
                fail_snapshot: false,
            }
        }
    }

    #[async_trait]
    impl PageDriver for MockDriver {
        async fn click(&mut self, target: &Locator) -> Result<(), ScriptError> {
            self.calls.push(format!("click {}", target));
            if *target == Locator::Css("a.missing".into()) {
                return Err(ScriptError::NotFound(target.clone()));
            }
            if *target == Locator::Css("a.next".into()) {
                self.pages_left = self.pages_left.saturating_sub(1);
                self.page += 1;
            }
            Ok(())
        }

        async fn select_option(&mut self, target: &Locator, label: &str) -> Result<(), ScriptError> {
            self.calls.push(format!("select {} {}", target, label));
            Ok(())
        }

        async fn fill(&mut self, target: &Locator, text: &str) -> Result<(), ScriptError> {
            self.calls.push(format!("fill {} {}", target, text));
            Ok(())
        }

        async fn probe(&mut self, target: &Locator) -> Result<ElementState, ScriptError> {
            let visible = match target {
                Locator::Css(s) if s == "a.next" => self.pages_left > 1,
                Locator::Css(s) if s == "#ready" => true,
                _ => false,
            };
            Ok(ElementState {
                attached: visible,
                visible,
                enabled: true,
            })
        }

        async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScriptError> {
            self.calls.push(format!("scroll {}", pixels));
            Ok(())
        }

        async fn evaluate(&mut self, script: &str) -> Result<(), ScriptError> {
            self.calls.push(format!("eval {}", script));
            Ok(())
        }

        async fn snapshot(&mut self) -> Result<PageSnapshot, ScriptError> {
            if self.fail_snapshot {
                return Err(ScriptError::Driver("target closed".into()));
            }
            Ok(PageSnapshot {
                final_url: Url::parse(&format!("https://x.com/list?page={}", self.page)).unwrap(),
                html: format!("<p>page {}</p>", self.page),
            })
        }
    }

    #[derive(Default)]
    struct Collecting {
        lines: Mutex<Vec<String>>,
        cancel: CancelFlag,
    }

    impl RunObserver for Collecting {
        fn is_cancelled(&self) -> bool {
            self.cancel.is_cancelled()
        }

        fn progress(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn script(json: &str) -> ActionScript {
        ActionScript::from_json_str(json).unwrap()
    }

    #[test]
    fn test_parse_blocks() {
        let parsed = script(
            r##"[
                {"type": "click", "by": "text", "text_value": "Accept"},
                {"type": "input_text", "selector_value": "#q", "input_text": "rust"},
                {"type": "wait", "duration": "1-3"},
                {"type": "repeat", "children": [{"type": "break_loop"}]}
            ]"##,
        );
        assert_eq!(parsed.blocks.len(), 4);
        assert!(matches!(&parsed.blocks[3], Block::Repeat { children, max_iterations: None } if children.len() == 1));
    }

    #[test]
    fn test_unknown_block_rejected() {
        assert!(ActionScript::from_json_str(r#"[{"type": "teleport"}]"#).is_err());
    }

    #[test]
    fn test_locator_detection() {
        assert_eq!(Locator::selector("//a"), Locator::XPath("//a".into()));
        assert_eq!(Locator::selector("(//a)[1]"), Locator::XPath("(//a)[1]".into()));
        assert_eq!(Locator::selector("../b"), Locator::XPath("../b".into()));
        assert_eq!(Locator::selector(" a.next "), Locator::Css("a.next".into()));
    }

    #[test]
    fn test_parse_wait() {
        assert_eq!(parse_wait("2"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_wait("0.5"), Ok(Duration::from_millis(500)));
        let ranged = parse_wait("1-3").unwrap();
        assert!(ranged >= Duration::from_secs(1) && ranged <= Duration::from_secs(3));
        assert!(parse_wait("soon").is_err());
        assert!(parse_wait("3-1").is_err());
    }

    #[tokio::test]
    async fn test_no_script_auto_scrapes() {
        let mut driver = MockDriver::new(1);
        let observer = Collecting::default();
        let snapshots = execute(None, &mut driver, &observer).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(observer.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_script_without_scrape_auto_scrapes_final_state() {
        let mut driver = MockDriver::new(3);
        let observer = Collecting::default();
        let s = script(r#"[{"type": "click", "selector_value": "a.next"}]"#);
        let snapshots = execute(Some(&s), &mut driver, &observer).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].final_url.as_str(), "https://x.com/list?page=2");
    }

    #[tokio::test]
    async fn test_pagination_loop_scrapes_each_page() {
        let mut driver = MockDriver::new(3);
        let observer = Collecting::default();
        let s = script(
            r#"[{"type": "repeat", "max_iterations": 10, "children": [
                {"type": "scrape"},
                {"type": "if_condition", "condition": "is_not_visible", "selector_value": "a.next",
                 "children": [{"type": "break_loop"}]},
                {"type": "click", "selector_value": "a.next"}
            ]}]"#,
        );
        let snapshots = execute(Some(&s), &mut driver, &observer).await.unwrap();
        let pages: Vec<_> = snapshots.iter().map(|s| s.html.clone()).collect();
        assert_eq!(pages, vec!["<p>page 1</p>", "<p>page 2</p>", "<p>page 3</p>"]);
    }

    #[tokio::test]
    async fn test_repeat_honours_max_iterations() {
        let mut driver = MockDriver::new(100);
        let observer = Collecting::default();
        let s = script(
            r#"[{"type": "repeat", "max_iterations": 2, "children": [{"type": "scroll", "pixels": 300}]}]"#,
        );
        execute(Some(&s), &mut driver, &observer).await.unwrap();
        assert_eq!(driver.calls, vec!["scroll 300", "scroll 300"]);
    }

    #[tokio::test]
    async fn test_repeat_stops_on_cancellation() {
        let mut driver = MockDriver::new(100);
        let observer = Collecting::default();
        observer.cancel.cancel();
        let s = script(r#"[{"type": "repeat", "children": [{"type": "scroll"}]}]"#);
        execute(Some(&s), &mut driver, &observer).await.unwrap();
        assert!(driver.calls.is_empty());
    }

    #[tokio::test]
    async fn test_script_error_is_reported_not_raised() {
        let mut driver = MockDriver::new(1);
        let observer = Collecting::default();
        let s = script(
            r#"[{"type": "click", "selector_value": "a.missing"}, {"type": "scroll"}]"#,
        );
        let snapshots = execute(Some(&s), &mut driver, &observer).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(!driver.calls.contains(&"scroll 500".to_string()));
        assert!(observer
            .lines
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.starts_with("Script error")));
    }

    #[tokio::test]
    async fn test_broken_page_surfaces_error() {
        let mut driver = MockDriver::new(1);
        driver.fail_snapshot = true;
        let observer = Collecting::default();
        assert!(execute(None, &mut driver, &observer).await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_element() {
        let mut driver = MockDriver::new(1);
        assert!(wait_for(&mut driver, &Locator::Css("#ready".into()), WaitState::Visible, Duration::from_millis(50))
            .await
            .is_ok());
        assert!(matches!(
            wait_for(&mut driver, &Locator::Css("#never".into()), WaitState::Visible, Duration::ZERO).await,
            Err(ScriptError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_text_and_both_locators_reach_driver() {
        let mut driver = MockDriver::new(1);
        let observer = Collecting::default();
        let s = script(
            r#"[
                {"type": "select_form", "by": "both", "selector_value": "select", "text_value": "Size", "option_text": "XL"},
                {"type": "input_text", "by": "text", "text_value": "Search", "input_text": "shoes"}
            ]"#,
        );
        execute(Some(&s), &mut driver, &observer).await.unwrap();
        assert_eq!(
            driver.calls,
            vec![
                r#"select selector "select" with text "Size" XL"#,
                r#"fill text "Search" shoes"#,
            ]
        );
    }
}
