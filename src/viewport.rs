//! Viewport profiles: named device classes the suite is run against

use serde::{Deserialize, Serialize};

/// A named width x height pair with optional device metadata
///
/// The Chrome backend pins the layout viewport to `width` x `height` and
/// emulates `dpr` as the device scale factor; `touch` turns on touch input
/// and mobile viewport behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_dpr")]
    pub dpr: f32,
    #[serde(default)]
    pub touch: bool,
}

fn default_dpr() -> f32 {
    1.0
}

impl ViewportProfile {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        ViewportProfile {
            name: name.into(),
            width,
            height,
            dpr: 1.0,
            touch: false,
        }
    }

    /// Desktop Chrome at 1440x900
    pub fn desktop() -> Self {
        Self::new("desktop", 1440, 900)
    }

    /// iPad Air class tablet
    pub fn tablet() -> Self {
        ViewportProfile {
            dpr: 2.0,
            touch: true,
            ..Self::new("tablet", 820, 1180)
        }
    }

    /// iPhone 12 class phone at 390x844
    pub fn mobile() -> Self {
        ViewportProfile {
            dpr: 3.0,
            touch: true,
            ..Self::new("mobile", 390, 844)
        }
    }

    /// The three profiles every page is checked against by default.
    pub fn presets() -> Vec<ViewportProfile> {
        vec![Self::desktop(), Self::tablet(), Self::mobile()]
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && self.width > 0
            && self.height > 0
            && self.dpr.is_finite()
            && self.dpr > 0.0
    }
}

impl std::fmt::Display for ViewportProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_cover_three_device_classes() {
        let names: Vec<_> = ViewportProfile::presets()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["desktop", "tablet", "mobile"]);
        assert_eq!(ViewportProfile::mobile().width, 390);
        assert_eq!(ViewportProfile::mobile().height, 844);
    }

    #[test]
    fn zero_sized_profile_is_invalid() {
        assert!(!ViewportProfile::new("broken", 0, 600).is_valid());
        assert!(!ViewportProfile::new("", 800, 600).is_valid());
        assert!(ViewportProfile::desktop().is_valid());
    }

    #[test]
    fn toml_profile_defaults_device_metadata() {
        let v: ViewportProfile = toml::from_str("name = \"wide\"\nwidth = 1920\nheight = 1080\n").unwrap();
        assert_eq!(v.dpr, 1.0);
        assert!(!v.touch);
        assert_eq!(v.to_string(), "wide (1920x1080)");
    }
}
