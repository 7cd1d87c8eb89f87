//! Declarative layout predicates
//!
//! Every predicate is a pure function from a `GeometryFact` (plus its own
//! thresholds) to a `Verdict`. Predicates never talk to the browser; the
//! queries they need are declared up front through `queries()` and answered
//! by the probe before evaluation starts.

use crate::geometry::{GeometryFact, SplitChild};
use crate::probe::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Measured values attached to a failing verdict, keyed by a short label
pub type Measurements = BTreeMap<String, f64>;

/// Outcome of evaluating one predicate against one fact
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail {
        message: String,
        measurements: Measurements,
    },
    /// A selector the predicate depends on matched nothing. Reported as an
    /// infrastructure error rather than a layout failure.
    Missing { selector: String },
}

impl Verdict {
    fn fail<I>(message: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, f64)>,
    {
        Verdict::Fail {
            message: message.into(),
            measurements: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn missing(selector: &str) -> Self {
        Verdict::Missing {
            selector: selector.to_string(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Shared surface of every predicate
pub trait Check {
    /// Stable name used to attribute results
    fn name(&self) -> String;
    /// DOM queries the predicate needs answered
    fn queries(&self) -> Vec<Query>;
    /// Evaluate against a fact; must be deterministic and side-effect-free
    fn evaluate(&self, fact: &GeometryFact) -> Verdict;
    /// Threshold sanity, checked before a run starts
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

fn finite_non_negative(label: &str, v: f64) -> std::result::Result<(), String> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a finite, non-negative number (got {})", label, v))
    }
}

fn non_empty(label: &str, selector: &str) -> std::result::Result<(), String> {
    if selector.trim().is_empty() {
        Err(format!("{} selector must not be empty", label))
    } else {
        Ok(())
    }
}

/// `documentScrollWidth <= documentClientWidth + tolerance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoHorizontalOverflow {
    /// Allowance for sub-pixel rounding
    pub tolerance: f64,
}

impl Default for NoHorizontalOverflow {
    fn default() -> Self {
        NoHorizontalOverflow { tolerance: 1.0 }
    }
}

impl Check for NoHorizontalOverflow {
    fn name(&self) -> String {
        "no-horizontal-overflow".into()
    }

    fn queries(&self) -> Vec<Query> {
        Vec::new()
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        let d = fact.document;
        if d.scroll_width <= d.client_width + self.tolerance {
            Verdict::Pass
        } else {
            Verdict::fail(
                "page overflows horizontally",
                [("scroll_width", d.scroll_width), ("client_width", d.client_width)],
            )
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        finite_non_negative("tolerance", self.tolerance)
    }
}

/// Hero section and its inner container are visible, container padded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeroVisible {
    pub hero: String,
    pub container: String,
    /// Inclusive lower bound for the container's `padding-left`
    pub min_padding_left: f64,
}

impl Default for HeroVisible {
    fn default() -> Self {
        HeroVisible {
            hero: "section.hero".into(),
            container: "section.hero .container".into(),
            min_padding_left: 16.0,
        }
    }
}

impl Check for HeroVisible {
    fn name(&self) -> String {
        "hero-visible".into()
    }

    fn queries(&self) -> Vec<Query> {
        vec![
            Query::required(self.hero.clone()),
            Query::required(self.container.clone()),
        ]
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        let Some(hero) = fact.first(&self.hero) else {
            return Verdict::missing(&self.hero);
        };
        if !hero.visible {
            return Verdict::fail(
                format!("hero `{}` is not visible", self.hero),
                [("hero_width", hero.rect.width), ("hero_height", hero.rect.height)],
            );
        }
        let Some(container) = fact.first(&self.container) else {
            return Verdict::missing(&self.container);
        };
        if !container.visible {
            return Verdict::fail(
                format!("hero container `{}` is not visible", self.container),
                [
                    ("container_width", container.rect.width),
                    ("container_height", container.rect.height),
                ],
            );
        }
        if container.padding_left < self.min_padding_left {
            return Verdict::fail(
                format!(
                    "hero container padding-left is below {}px",
                    self.min_padding_left
                ),
                [("padding_left", container.padding_left)],
            );
        }
        Verdict::Pass
    }

    fn validate(&self) -> std::result::Result<(), String> {
        non_empty("hero", &self.hero)?;
        non_empty("container", &self.container)?;
        finite_non_negative("min_padding_left", self.min_padding_left)
    }
}

/// Rendered width/height of visible images stays within an open interval.
///
/// Zero-area images are accepted: they are treated as not laid out yet
/// rather than distorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageAspect {
    pub images: String,
    /// Selector of a normally hidden image (lightbox) left out of the check
    pub exclude: Option<String>,
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for ImageAspect {
    fn default() -> Self {
        ImageAspect {
            images: "img".into(),
            exclude: Some("#lightbox-img".into()),
            min_ratio: 0.3,
            max_ratio: 3.5,
        }
    }
}

impl ImageAspect {
    /// The selector actually queried, with the exclusion folded in.
    pub fn selector(&self) -> String {
        match &self.exclude {
            Some(ex) if !ex.trim().is_empty() => format!("{}:not({})", self.images, ex),
            _ => self.images.clone(),
        }
    }
}

impl Check for ImageAspect {
    fn name(&self) -> String {
        "images-not-distorted".into()
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::elements(self.selector())]
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        let selector = self.selector();
        for (index, img) in fact.elements(&selector).iter().enumerate() {
            if !img.visible {
                continue;
            }
            let Some(ratio) = img.rect.aspect_ratio() else {
                continue;
            };
            if !(ratio > self.min_ratio && ratio < self.max_ratio) {
                return Verdict::fail(
                    format!(
                        "image #{} aspect ratio {:.3} is outside ({}, {})",
                        index, ratio, self.min_ratio, self.max_ratio
                    ),
                    [
                        ("index", index as f64),
                        ("width", img.rect.width),
                        ("height", img.rect.height),
                        ("ratio", ratio),
                    ],
                );
            }
        }
        Verdict::Pass
    }

    fn validate(&self) -> std::result::Result<(), String> {
        non_empty("images", &self.images)?;
        finite_non_negative("min_ratio", self.min_ratio)?;
        finite_non_negative("max_ratio", self.max_ratio)?;
        if self.min_ratio >= self.max_ratio {
            return Err(format!(
                "min_ratio ({}) must be below max_ratio ({})",
                self.min_ratio, self.max_ratio
            ));
        }
        Ok(())
    }
}

/// Exactly two cards; when side by side their heights stay close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CardPairing {
    pub cards: String,
    /// Horizontal offset above which the cards count as side by side
    pub side_by_side_threshold: f64,
    /// Largest allowed height difference for side-by-side cards
    pub max_height_delta: f64,
}

impl Default for CardPairing {
    fn default() -> Self {
        CardPairing {
            cards: ".contact-info-grid .info-card".into(),
            side_by_side_threshold: 40.0,
            max_height_delta: 140.0,
        }
    }
}

impl Check for CardPairing {
    fn name(&self) -> String {
        "card-pairing".into()
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::required(self.cards.clone())]
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        let cards = fact.elements(&self.cards);
        match cards {
            [] => Verdict::missing(&self.cards),
            [a, b] => {
                let dx = (a.rect.x - b.rect.x).abs();
                if dx <= self.side_by_side_threshold {
                    // stacked layout, heights are free
                    return Verdict::Pass;
                }
                let dh = (a.rect.height - b.rect.height).abs();
                if dh <= self.max_height_delta {
                    Verdict::Pass
                } else {
                    Verdict::fail(
                        format!(
                            "side-by-side cards differ in height by {:.1}px (max {}px)",
                            dh, self.max_height_delta
                        ),
                        [
                            ("x_offset", dx),
                            ("height_a", a.rect.height),
                            ("height_b", b.rect.height),
                            ("height_delta", dh),
                        ],
                    )
                }
            }
            other => Verdict::fail(
                format!("expected exactly 2 cards, found {}", other.len()),
                [("count", other.len() as f64)],
            ),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        non_empty("cards", &self.cards)?;
        finite_non_negative("side_by_side_threshold", self.side_by_side_threshold)?;
        finite_non_negative("max_height_delta", self.max_height_delta)
    }
}

/// Which child of a split container holds the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageChild {
    /// The first child is the image wrapper
    First,
    /// Whichever child contains an `img` (first child wins a tie)
    #[default]
    Detect,
}

/// Image child of a two-child container renders above the copy child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackedOrder {
    pub container: String,
    pub image_child: ImageChild,
    /// The image child's top must be strictly above copy top minus this
    pub margin: f64,
}

impl Default for StackedOrder {
    fn default() -> Self {
        StackedOrder {
            container: "section.hero .container".into(),
            image_child: ImageChild::Detect,
            margin: 10.0,
        }
    }
}

impl StackedOrder {
    fn image_index(&self, children: &[SplitChild]) -> usize {
        match self.image_child {
            ImageChild::First => 0,
            ImageChild::Detect if children[0].image_count > 0 => 0,
            ImageChild::Detect => 1,
        }
    }
}

impl Check for StackedOrder {
    fn name(&self) -> String {
        format!("stacked-order({})", self.container)
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::split(self.container.clone())]
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        let Some(split) = fact.split(&self.container) else {
            return Verdict::missing(&self.container);
        };
        if !split.container.visible {
            return Verdict::fail(
                format!("container `{}` is not visible", self.container),
                [
                    ("container_width", split.container.rect.width),
                    ("container_height", split.container.rect.height),
                ],
            );
        }
        if split.children.len() != 2 {
            return Verdict::fail(
                format!(
                    "expected exactly 2 direct div children, found {}",
                    split.children.len()
                ),
                [("count", split.children.len() as f64)],
            );
        }
        let image_idx = self.image_index(&split.children);
        let image = &split.children[image_idx];
        let copy = &split.children[1 - image_idx];
        if !(image.element.visible && image.image_visible) {
            return Verdict::fail(
                "image child or its image is not visible",
                [
                    ("image_child", image_idx as f64),
                    ("image_count", image.image_count as f64),
                ],
            );
        }
        let image_top = image.element.rect.y;
        let copy_top = copy.element.rect.y;
        if image_top < copy_top - self.margin {
            Verdict::Pass
        } else {
            Verdict::fail(
                format!(
                    "image does not render at least {}px above the copy",
                    self.margin
                ),
                [("image_top", image_top), ("copy_top", copy_top)],
            )
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        non_empty("container", &self.container)?;
        finite_non_negative("margin", self.margin)
    }
}

/// First match of a selector exists and is visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementVisible {
    pub selector: String,
}

impl Check for ElementVisible {
    fn name(&self) -> String {
        format!("element-visible({})", self.selector)
    }

    fn queries(&self) -> Vec<Query> {
        vec![Query::required(self.selector.clone())]
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        match fact.first(&self.selector) {
            None => Verdict::missing(&self.selector),
            Some(el) if el.visible => Verdict::Pass,
            Some(el) => Verdict::fail(
                format!("`{}` is not visible", self.selector),
                [("width", el.rect.width), ("height", el.rect.height)],
            ),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        non_empty("element", &self.selector)
    }
}

/// Tagged union of every predicate, as written in suite files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    NoHorizontalOverflow(NoHorizontalOverflow),
    HeroVisible(HeroVisible),
    ImageAspect(ImageAspect),
    CardPairing(CardPairing),
    StackedOrder(StackedOrder),
    ElementVisible(ElementVisible),
}

impl Predicate {
    fn inner(&self) -> &dyn Check {
        match self {
            Predicate::NoHorizontalOverflow(p) => p,
            Predicate::HeroVisible(p) => p,
            Predicate::ImageAspect(p) => p,
            Predicate::CardPairing(p) => p,
            Predicate::StackedOrder(p) => p,
            Predicate::ElementVisible(p) => p,
        }
    }
}

impl Check for Predicate {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn queries(&self) -> Vec<Query> {
        self.inner().queries()
    }

    fn evaluate(&self, fact: &GeometryFact) -> Verdict {
        self.inner().evaluate(fact)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        self.inner().validate()
    }
}
