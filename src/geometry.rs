//! Geometry facts measured from a loaded page
//!
//! A `GeometryFact` is the complete set of values one probe run captured for
//! a single page + viewport. It is produced fresh per case, never mutated by
//! predicates, and never persisted beyond the run report.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A CSS pixel bounding box as reported by `getBoundingClientRect`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// width / height, or `None` for a box with no rendered area
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.has_area() {
            Some(self.width / self.height)
        } else {
            None
        }
    }
}

/// Measurements for one matched element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementFact {
    #[serde(flatten)]
    pub rect: Rect,
    /// Non-empty box and not hidden by `display` / `visibility`
    pub visible: bool,
    /// Resolved `padding-left` in px
    #[serde(default)]
    pub padding_left: f64,
}

impl ElementFact {
    pub fn visible(rect: Rect) -> Self {
        ElementFact {
            rect,
            visible: true,
            padding_left: 0.0,
        }
    }

    pub fn hidden() -> Self {
        ElementFact {
            rect: Rect::default(),
            visible: false,
            padding_left: 0.0,
        }
    }

    pub fn with_padding_left(mut self, px: f64) -> Self {
        self.padding_left = px;
        self
    }
}

/// A direct `div` child of a split container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitChild {
    #[serde(flatten)]
    pub element: ElementFact,
    /// Number of `img` descendants
    #[serde(default)]
    pub image_count: u32,
    /// Whether the first `img` descendant is visible
    #[serde(default)]
    pub image_visible: bool,
}

impl SplitChild {
    pub fn copy(rect: Rect) -> Self {
        SplitChild {
            element: ElementFact::visible(rect),
            image_count: 0,
            image_visible: false,
        }
    }

    pub fn poster(rect: Rect) -> Self {
        SplitChild {
            element: ElementFact::visible(rect),
            image_count: 1,
            image_visible: true,
        }
    }
}

/// A two-column container and its direct `div` children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitFact {
    pub container: ElementFact,
    pub children: Vec<SplitChild>,
}

/// Document-level scroll metrics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentMetrics {
    pub scroll_width: f64,
    pub client_width: f64,
}

/// Everything measured for one page + viewport
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryFact {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ready_state: String,
    /// HTTP status of the navigation entry, when the browser exposes it
    #[serde(default)]
    pub http_status: Option<u16>,
    pub document: DocumentMetrics,
    /// Matches per selector, in document order
    #[serde(default)]
    pub elements: BTreeMap<String, Vec<ElementFact>>,
    /// Split containers per selector; `None` when the container is absent
    #[serde(default)]
    pub splits: BTreeMap<String, Option<SplitFact>>,
}

impl GeometryFact {
    pub fn new(scroll_width: f64, client_width: f64) -> Self {
        GeometryFact {
            ready_state: "complete".into(),
            document: DocumentMetrics {
                scroll_width,
                client_width,
            },
            ..Default::default()
        }
    }

    pub fn with_elements(mut self, selector: &str, elements: Vec<ElementFact>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    pub fn with_split(mut self, selector: &str, split: Option<SplitFact>) -> Self {
        self.splits.insert(selector.to_string(), split);
        self
    }

    /// All matches for `selector`; empty when the selector matched nothing or
    /// was never queried.
    pub fn elements(&self, selector: &str) -> &[ElementFact] {
        self.elements
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, selector: &str) -> Option<&ElementFact> {
        self.elements(selector).first()
    }

    pub fn split(&self, selector: &str) -> Option<&SplitFact> {
        self.splits.get(selector).and_then(Option::as_ref)
    }

    /// Whether `selector` matched at least once (elements or split container).
    pub fn matched(&self, selector: &str) -> bool {
        !self.elements(selector).is_empty() || self.split(selector).is_some()
    }

    /// Whether the navigation landed on an HTTP error page.
    pub fn is_error_page(&self) -> bool {
        matches!(self.http_status, Some(status) if status >= 400)
    }

    /// SHA-256 over the canonical JSON encoding; equal facts give equal digests.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_has_no_aspect_ratio() {
        assert_eq!(Rect::new(0.0, 0.0, 0.0, 120.0).aspect_ratio(), None);
        assert_eq!(Rect::new(0.0, 0.0, 200.0, 100.0).aspect_ratio(), Some(2.0));
    }

    #[test]
    fn parses_probe_json() {
        let raw = r##"{
            "url": "http://localhost:4173/home.html",
            "ready_state": "complete",
            "http_status": 200,
            "document": {"scroll_width": 1440, "client_width": 1440},
            "elements": {
                "section.hero": [{"x": 0, "y": 64, "width": 1440, "height": 600, "visible": true, "padding_left": 0}]
            },
            "splits": {
                "#ttp .container": {
                    "container": {"x": 0, "y": 0, "width": 390, "height": 900, "visible": true, "padding_left": 16},
                    "children": [
                        {"x": 16, "y": 0, "width": 358, "height": 300, "visible": true, "padding_left": 0, "image_count": 1, "image_visible": true},
                        {"x": 16, "y": 320, "width": 358, "height": 500, "visible": true, "padding_left": 0, "image_count": 0, "image_visible": false}
                    ]
                },
                "#missing .container": null
            }
        }"##;
        let fact: GeometryFact = serde_json::from_str(raw).unwrap();
        assert_eq!(fact.http_status, Some(200));
        assert!(fact.first("section.hero").unwrap().visible);
        let split = fact.split("#ttp .container").unwrap();
        assert_eq!(split.children.len(), 2);
        assert_eq!(split.children[0].image_count, 1);
        assert_eq!(split.children[1].element.rect.y, 320.0);
        assert!(fact.split("#missing .container").is_none());
        assert!(!fact.matched("#missing .container"));
    }

    #[test]
    fn digest_is_stable_for_equal_facts() {
        let a = GeometryFact::new(1440.0, 1440.0)
            .with_elements("img", vec![ElementFact::visible(Rect::new(0.0, 0.0, 10.0, 10.0))]);
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());
        let c = GeometryFact::new(1441.0, 1440.0);
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn error_status_is_detected() {
        let mut fact = GeometryFact::new(100.0, 100.0);
        assert!(!fact.is_error_page());
        fact.http_status = Some(404);
        assert!(fact.is_error_page());
    }
}
