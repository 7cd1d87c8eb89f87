//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::{Driver, Error, HarnessConfig, Launcher, Result, ViewportProfile};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Launches one headless Chrome per case
///
/// A fresh browser process per case keeps cases fully isolated: no cache,
/// storage or window size leaks from one (page, viewport) pair to another.
#[derive(Debug, Clone, Default)]
pub struct CdpLauncher;

impl CdpLauncher {
    pub fn new() -> Self {
        CdpLauncher
    }
}

impl Launcher for CdpLauncher {
    type Driver = CdpDriver;

    fn launch(&self, viewport: &ViewportProfile, config: &HarnessConfig) -> Result<CdpDriver> {
        CdpDriver::new(viewport, config)
    }
}

/// A single Chrome instance with one tab sized to the viewport
pub struct CdpDriver {
    browser: Browser,
    tab: Arc<Tab>,
    navigation_timeout: Duration,
    action_timeout: Duration,
}

impl CdpDriver {
    pub fn new(viewport: &ViewportProfile, config: &HarnessConfig) -> Result<Self> {
        let navigation_timeout = Duration::from_millis(config.navigation_timeout_ms);
        let action_timeout = Duration::from_millis(config.action_timeout_ms);

        // Configure headless Chrome launch options
        let mut builder = LaunchOptions::default_builder();
        builder
            .headless(config.headless)
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(navigation_timeout + action_timeout * 2);
        if let Some(path) = &config.chrome_path {
            builder.path(Some(path.clone()));
        }
        let launch_options = builder
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::LaunchError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(action_timeout);

        // The window size only bounds the layout viewport; pin it exactly and
        // emulate the device's pixel ratio and touch support.
        tab.call_method(device_metrics(viewport))
            .map_err(|e| Error::LaunchError(format!("Failed to emulate {}: {}", viewport, e)))?;
        tab.call_method(touch_emulation(viewport))
            .map_err(|e| Error::LaunchError(format!("Failed to emulate {}: {}", viewport, e)))?;

        debug!("launched chrome for viewport {}", viewport);

        Ok(Self {
            browser,
            tab,
            navigation_timeout,
            action_timeout,
        })
    }
}

fn device_metrics(viewport: &ViewportProfile) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: f64::from(viewport.dpr),
        mobile: viewport.touch,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

fn touch_emulation(viewport: &ViewportProfile) -> Emulation::SetTouchEmulationEnabled {
    Emulation::SetTouchEmulationEnabled {
        enabled: viewport.touch,
        max_touch_points: viewport.touch.then_some(5),
    }
}

impl Driver for CdpDriver {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab.set_default_timeout(self.navigation_timeout);

        let navigated = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());

        self.tab.set_default_timeout(self.action_timeout);

        navigated.map_err(|e| Error::NavigationError(format!("{}: {}", url, e)))
    }

    fn evaluate(&mut self, script: &str) -> Result<String> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::ProbeError(format!("Evaluation failed: {}", e)))?;

        match result.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::ProbeError("No value returned from evaluation".into())),
        }
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)?;
        Ok(png)
    }

    fn close(self) -> Result<()> {
        // Drop tab before browser so the child process is terminated promptly
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
