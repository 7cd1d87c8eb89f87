//! Read-only DOM query plan and the in-page extraction script
//!
//! Predicates declare what they need to see as `Query` values. A case merges
//! the queries of every applicable predicate into one `ProbePlan`, runs the
//! generated script in the page and parses the JSON it returns into a
//! `GeometryFact`. The script never mutates the document.

use crate::geometry::GeometryFact;
use crate::Result;
use serde::Serialize;

/// One read-only DOM query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    /// Every element matching `selector`. `required` queries hold the wait
    /// loop open until at least one match exists.
    Elements { selector: String, required: bool },
    /// First match of `selector` plus its direct `div` children
    Split { selector: String },
}

impl Query {
    pub fn elements(selector: impl Into<String>) -> Self {
        Query::Elements {
            selector: selector.into(),
            required: false,
        }
    }

    pub fn required(selector: impl Into<String>) -> Self {
        Query::Elements {
            selector: selector.into(),
            required: true,
        }
    }

    pub fn split(selector: impl Into<String>) -> Self {
        Query::Split {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Query::Elements { selector, .. } | Query::Split { selector } => selector,
        }
    }

    fn is_required(&self) -> bool {
        match self {
            Query::Elements { required, .. } => *required,
            Query::Split { .. } => true,
        }
    }
}

/// The merged set of queries for one case
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbePlan {
    queries: Vec<Query>,
}

impl ProbePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query, merging it with an existing one for the same selector
    /// and kind (`required` is sticky).
    pub fn add(&mut self, query: Query) {
        for existing in self.queries.iter_mut() {
            match (existing, &query) {
                (
                    Query::Elements { selector, required },
                    Query::Elements {
                        selector: s,
                        required: r,
                    },
                ) if selector == s => {
                    *required |= *r;
                    return;
                }
                (Query::Split { selector }, Query::Split { selector: s }) if selector == s => {
                    return;
                }
                _ => {}
            }
        }
        self.queries.push(query);
    }

    pub fn extend<I: IntoIterator<Item = Query>>(&mut self, queries: I) {
        for q in queries {
            self.add(q);
        }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Required selectors that matched nothing in `fact`.
    pub fn missing(&self, fact: &GeometryFact) -> Vec<String> {
        self.queries
            .iter()
            .filter(|q| q.is_required() && !fact.matched(q.selector()))
            .map(|q| q.selector().to_string())
            .collect()
    }

    /// Build the extraction script. It returns the fact as a JSON string so
    /// backends only have to hand back text.
    pub fn script(&self) -> String {
        let queries = serde_json::to_string(&self.queries).unwrap_or_else(|_| "[]".to_string());
        PROBE_TEMPLATE.replace("{{QUERIES}}", &queries)
    }

    pub fn parse(raw: &str) -> Result<GeometryFact> {
        let raw = raw.trim();
        // CDP hands strings back JSON-quoted; unwrap one level when present.
        if raw.starts_with('"') {
            let inner: String = serde_json::from_str(raw)?;
            return Ok(serde_json::from_str(&inner)?);
        }
        Ok(serde_json::from_str(raw)?)
    }
}

const PROBE_TEMPLATE: &str = r#"(function(){
    const queries = {{QUERIES}};
    const px = function(v){ const n = parseFloat(v); return isNaN(n) ? 0 : n; };
    const describe = function(el){
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        return {
            x: r.x, y: r.y, width: r.width, height: r.height,
            visible: r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none',
            padding_left: px(s.paddingLeft)
        };
    };
    const nav = (performance.getEntriesByType && performance.getEntriesByType('navigation')[0]) || null;
    const root = document.documentElement;
    const out = {
        url: location.href,
        ready_state: document.readyState,
        http_status: nav && nav.responseStatus ? nav.responseStatus : null,
        document: { scroll_width: root.scrollWidth, client_width: root.clientWidth },
        elements: {},
        splits: {}
    };
    for (const q of queries) {
        if (q.kind === 'elements') {
            out.elements[q.selector] = Array.from(document.querySelectorAll(q.selector)).map(describe);
        } else if (q.kind === 'split') {
            const c = document.querySelector(q.selector);
            out.splits[q.selector] = c ? {
                container: describe(c),
                children: Array.from(c.children).filter(function(e){ return e.tagName === 'DIV'; }).map(function(child){
                    const imgs = child.querySelectorAll('img');
                    const d = describe(child);
                    d.image_count = imgs.length;
                    d.image_visible = imgs.length > 0 && describe(imgs[0]).visible;
                    return d;
                })
            } : null;
        }
    }
    return JSON.stringify(out);
})()"#;
