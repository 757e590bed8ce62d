//! Action-script driver for a Chrome page
//!
//! Element lookups run in the page as JavaScript so CSS, XPath and text
//! locators share one resolution path.

use crate::fetch::script::{ElementState, Locator, PageDriver, ScriptError};
use crate::fetch::PageSnapshot;
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde_json::{json, Value};
use url::Url;

/// Defines `el`: the first element matching `loc`, or null
const FIND_ELEMENT: &str = r#"
const byXPath = (xp) => {
  const r = document.evaluate(xp, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const out = [];
  for (let i = 0; i < r.snapshotLength; i++) {
    const n = r.snapshotItem(i);
    out.push(n.nodeType === 1 ? n : n.parentElement);
  }
  return out.filter(Boolean);
};
const textOf = (e) => (e.innerText || e.textContent || '');
const all = (l) => {
  if (l.css !== undefined) return Array.from(document.querySelectorAll(l.css));
  if (l.xpath !== undefined) return byXPath(l.xpath);
  if (l.text !== undefined) {
    const root = document.body || document.documentElement;
    const hits = Array.from(root.querySelectorAll('*')).filter((e) => textOf(e).includes(l.text));
    return hits.filter((e) => !hits.some((o) => o !== e && e.contains(o)));
  }
  return all(l.within).filter((e) => textOf(e).includes(l.filter));
};
const el = all(loc)[0] || null;
"#;

const PROBE: &str = r#"
if (!el) return { attached: false, visible: false, enabled: false };
const style = window.getComputedStyle(el);
const boxed = el.offsetWidth > 0 || el.offsetHeight > 0 || el.getClientRects().length > 0;
return {
  attached: true,
  visible: boxed && style.visibility !== 'hidden' && style.display !== 'none',
  enabled: !el.disabled,
};
"#;

const CLICK: &str = r#"
if (!el) return false;
el.scrollIntoView({ block: 'center' });
el.click();
return true;
"#;

const FILL: &str = r#"
if (!el) return false;
el.focus();
el.value = arg;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return true;
"#;

const SELECT: &str = r#"
if (!el || !el.options) return false;
const opt = Array.from(el.options).find((o) => o.label.trim() === arg || o.text.trim() === arg);
if (!opt) return false;
el.value = opt.value;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return true;
"#;

fn locator_json(locator: &Locator) -> Value {
    match locator {
        Locator::Css(s) => json!({ "css": s }),
        Locator::XPath(s) => json!({ "xpath": s }),
        Locator::Text(t) => json!({ "text": t }),
        Locator::Filtered { selector, text } => {
            json!({ "within": locator_json(selector), "filter": text })
        }
    }
}

/// Wraps an element action into a self-invoking expression
fn element_script(locator: &Locator, arg: &str, action: &str) -> String {
    format!(
        "(() => {{ const loc = {}; const arg = {}; {} {} }})()",
        locator_json(locator),
        Value::String(arg.to_string()),
        FIND_ELEMENT,
        action
    )
}

fn driver_error(e: impl std::fmt::Display) -> ScriptError {
    ScriptError::Driver(e.to_string())
}

/// Drives one Chrome tab
pub struct ChromeDriver {
    page: Page,
}

impl ChromeDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn run(&self, expression: String) -> Result<Option<Value>, ScriptError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(driver_error)?;
        let result = self.page.evaluate_expression(params).await.map_err(driver_error)?;
        Ok(result.value().cloned())
    }

    async fn element_action(
        &self,
        locator: &Locator,
        arg: &str,
        action: &str,
    ) -> Result<(), ScriptError> {
        match self.run(element_script(locator, arg, action)).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(ScriptError::NotFound(locator.clone())),
        }
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn click(&mut self, target: &Locator) -> Result<(), ScriptError> {
        self.element_action(target, "", CLICK).await
    }

    async fn select_option(&mut self, target: &Locator, label: &str) -> Result<(), ScriptError> {
        self.element_action(target, label, SELECT).await
    }

    async fn fill(&mut self, target: &Locator, text: &str) -> Result<(), ScriptError> {
        self.element_action(target, text, FILL).await
    }

    async fn probe(&mut self, target: &Locator) -> Result<ElementState, ScriptError> {
        let value = self.run(element_script(target, "", PROBE)).await?;
        let flag = |name: &str| {
            value
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        Ok(ElementState {
            attached: flag("attached"),
            visible: flag("visible"),
            enabled: flag("enabled"),
        })
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), ScriptError> {
        self.run(format!("window.scrollBy(0, {})", pixels)).await?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<(), ScriptError> {
        self.run(script.to_string()).await?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, ScriptError> {
        let html = self.page.content().await.map_err(driver_error)?;
        let current = self
            .page
            .url()
            .await
            .map_err(driver_error)?
            .ok_or_else(|| ScriptError::Driver("page has no URL".to_string()))?;
        let final_url = Url::parse(&current).map_err(driver_error)?;
        Ok(PageSnapshot { final_url, html })
    }
}
