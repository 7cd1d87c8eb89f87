//! Suite definition: pages, viewports and the checks that apply to them
//!
//! The suite is plain data. `Suite::builtin()` is the default table for the
//! site under test; `Suite::from_toml` loads the same shape from a file.
//! Adding a page or a check is an edit to the table, never to the runner.

use crate::predicate::{
    CardPairing, Check, ElementVisible, HeroVisible, ImageAspect, ImageChild,
    NoHorizontalOverflow, Predicate, StackedOrder,
};
use crate::probe::ProbePlan;
use crate::viewport::ViewportProfile;
use crate::{Error, HarnessConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A predicate bound to a page, optionally limited to some viewports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCheck {
    /// Viewport names this check runs on; all of the page's viewports when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewports: Option<Vec<String>>,
    #[serde(flatten)]
    pub predicate: Predicate,
}

impl PageCheck {
    pub fn always(predicate: Predicate) -> Self {
        PageCheck {
            viewports: None,
            predicate,
        }
    }

    pub fn only_on(viewport: &str, predicate: Predicate) -> Self {
        PageCheck {
            viewports: Some(vec![viewport.to_string()]),
            predicate,
        }
    }

    fn applies_to(&self, viewport: &ViewportProfile) -> bool {
        match &self.viewports {
            Some(names) => names.iter().any(|n| n == &viewport.name),
            None => true,
        }
    }
}

/// A page under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Path relative to the base URL, e.g. `home.html`
    pub path: String,
    /// Optional fragment, without the `#`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// When set, the page runs only on this viewport instead of the suite's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportProfile>,
    #[serde(default)]
    pub checks: Vec<PageCheck>,
}

impl PageSpec {
    pub fn new(path: impl Into<String>) -> Self {
        PageSpec {
            path: path.into(),
            fragment: None,
            viewport: None,
            checks: Vec::new(),
        }
    }

    pub fn fragment(mut self, fragment: &str) -> Self {
        self.fragment = Some(fragment.to_string());
        self
    }

    pub fn viewport(mut self, viewport: ViewportProfile) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn check(mut self, check: PageCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// The three checks every page gets: overflow, hero, images
    pub fn with_layout_basics(self) -> Self {
        self.check(PageCheck::always(Predicate::NoHorizontalOverflow(
            NoHorizontalOverflow::default(),
        )))
        .check(PageCheck::always(Predicate::HeroVisible(HeroVisible::default())))
        .check(PageCheck::always(Predicate::ImageAspect(ImageAspect::default())))
    }

    /// Identity used in results: `path` or `path#fragment`
    pub fn label(&self) -> String {
        match &self.fragment {
            Some(f) => format!("{}#{}", self.path, f),
            None => self.path.clone(),
        }
    }

    /// Absolute URL of the page under `base`
    pub fn url(&self, base: &url::Url) -> Result<url::Url> {
        let mut url = base
            .join(self.path.trim_start_matches('/'))
            .map_err(|e| Error::ConfigError(format!("page `{}`: {}", self.path, e)))?;
        url.set_fragment(self.fragment.as_deref());
        Ok(url)
    }
}

/// One (page, viewport) pair with the checks that apply to it
#[derive(Debug, Clone)]
pub struct Case {
    pub page: PageSpec,
    pub viewport: ViewportProfile,
    pub url: url::Url,
    pub checks: Vec<Predicate>,
}

impl Case {
    pub fn label(&self) -> String {
        format!("{} @ {}", self.page.label(), self.viewport.name)
    }

    pub fn plan(&self) -> ProbePlan {
        let mut plan = ProbePlan::new();
        for check in &self.checks {
            plan.extend(check.queries());
        }
        plan
    }
}

/// Page and viewport name filters from the command line
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Substrings matched against the page label
    pub pages: Vec<String>,
    /// Exact viewport names
    pub viewports: Vec<String>,
}

impl Filter {
    fn page_matches(&self, page: &PageSpec) -> bool {
        let label = page.label();
        self.pages.is_empty() || self.pages.iter().any(|p| label.contains(p.as_str()))
    }

    fn viewport_matches(&self, viewport: &ViewportProfile) -> bool {
        self.viewports.is_empty() || self.viewports.iter().any(|v| v == &viewport.name)
    }
}

/// Pages x viewports, plus optional harness settings from the suite file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub harness: Option<HarnessConfig>,
    #[serde(default = "ViewportProfile::presets")]
    pub viewports: Vec<ViewportProfile>,
    pub pages: Vec<PageSpec>,
}

impl Suite {
    /// The default page table for the site under test.
    pub fn builtin() -> Self {
        let mobile = ViewportProfile::mobile();
        let hero_stack = || Predicate::StackedOrder(StackedOrder::default());

        let pages = vec![
            PageSpec::new("home.html")
                .with_layout_basics()
                .check(PageCheck::only_on(
                    &mobile.name,
                    Predicate::ElementVisible(ElementVisible {
                        selector: "section.hero h1".into(),
                    }),
                ))
                .check(PageCheck::only_on(&mobile.name, hero_stack())),
            PageSpec::new("training.html")
                .with_layout_basics()
                .check(PageCheck::only_on(&mobile.name, hero_stack())),
            PageSpec::new("Boarding.html").with_layout_basics(),
            PageSpec::new("Contact_us.html")
                .with_layout_basics()
                .check(PageCheck::always(Predicate::CardPairing(CardPairing::default()))),
            PageSpec::new("Videos.html").with_layout_basics(),
            PageSpec::new("About_us.html")
                .viewport(mobile.clone())
                .check(PageCheck::always(hero_stack())),
            PageSpec::new("training.html")
                .fragment("ttp")
                .viewport(mobile.clone())
                .check(PageCheck::always(Predicate::StackedOrder(StackedOrder {
                    container: "#ttp .container".into(),
                    image_child: ImageChild::First,
                    ..StackedOrder::default()
                }))),
        ];

        Suite {
            harness: None,
            viewports: ViewportProfile::presets(),
            pages,
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let suite: Suite = toml::from_str(text)?;
        Ok(suite)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read suite file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Reject a malformed suite before any case runs.
    pub fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(Error::ConfigError("suite has no pages".into()));
        }
        if self.viewports.is_empty() {
            return Err(Error::ConfigError("suite has no viewports".into()));
        }

        let mut names = HashSet::new();
        for v in &self.viewports {
            if !v.is_valid() {
                return Err(Error::ConfigError(format!("invalid viewport profile {:?}", v)));
            }
            if !names.insert(v.name.as_str()) {
                return Err(Error::ConfigError(format!("duplicate viewport `{}`", v.name)));
            }
        }

        for page in &self.pages {
            let path = page.path.trim();
            if path.is_empty() {
                return Err(Error::ConfigError("page with empty path".into()));
            }
            if path.contains("://") || path.starts_with("//") {
                return Err(Error::ConfigError(format!(
                    "page `{}` must be a path relative to the base URL",
                    path
                )));
            }
            if path.contains(['#', '?']) {
                return Err(Error::ConfigError(format!(
                    "page `{}`: put the fragment in `fragment`, paths carry no `#` or `?`",
                    path
                )));
            }
            if let Some(v) = &page.viewport {
                if !v.is_valid() {
                    return Err(Error::ConfigError(format!(
                        "page `{}` has invalid viewport override {:?}",
                        page.label(),
                        v
                    )));
                }
            }
            if page.checks.is_empty() {
                return Err(Error::ConfigError(format!("page `{}` has no checks", page.label())));
            }
            let mut seen = HashSet::new();
            for check in &page.checks {
                check.predicate.validate().map_err(|e| {
                    Error::ConfigError(format!(
                        "page `{}`, {}: {}",
                        page.label(),
                        check.predicate.name(),
                        e
                    ))
                })?;
                for name in check.viewports.iter().flatten() {
                    let known = names.contains(name.as_str())
                        || page.viewport.as_ref().is_some_and(|v| &v.name == name);
                    if !known {
                        return Err(Error::ConfigError(format!(
                            "page `{}` restricts {} to unknown viewport `{}`",
                            page.label(),
                            check.predicate.name(),
                            name
                        )));
                    }
                }
                if !seen.insert(check.predicate.name()) {
                    return Err(Error::ConfigError(format!(
                        "page `{}` registers {} twice",
                        page.label(),
                        check.predicate.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Expand the suite into runnable cases: every page on every applicable
    /// viewport, skipping pairs where no check applies.
    pub fn cases(&self, base: &url::Url, filter: &Filter) -> Result<Vec<Case>> {
        if let Some(unknown) = filter.viewports.iter().find(|name| {
            !self.viewports.iter().any(|v| &v.name == *name)
                && !self
                    .pages
                    .iter()
                    .any(|p| p.viewport.as_ref().is_some_and(|v| &v.name == *name))
        }) {
            return Err(Error::ConfigError(format!("unknown viewport `{}`", unknown)));
        }

        let mut cases = Vec::new();
        for page in self.pages.iter().filter(|p| filter.page_matches(p)) {
            let viewports: Vec<&ViewportProfile> = match &page.viewport {
                Some(v) => vec![v],
                None => self.viewports.iter().collect(),
            };
            for viewport in viewports.into_iter().filter(|v| filter.viewport_matches(v)) {
                let checks: Vec<Predicate> = page
                    .checks
                    .iter()
                    .filter(|c| c.applies_to(viewport))
                    .map(|c| c.predicate.clone())
                    .collect();
                if checks.is_empty() {
                    continue;
                }
                cases.push(Case {
                    page: page.clone(),
                    viewport: viewport.clone(),
                    url: page.url(base)?,
                    checks,
                });
            }
        }

        if cases.is_empty() {
            return Err(Error::ConfigError(
                "filters left no (page, viewport) pair to run".into(),
            ));
        }
        Ok(cases)
    }
}
