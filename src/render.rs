//! Render driver: one pass captures every breakpoint width
//!
//! A pass launches a headless browser, opens one tab per viewport width,
//! navigates to the local page, and writes a full-page PNG per width. The
//! browser is created fresh and torn down fully within each pass.

use crate::paths::RenderTarget;
use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptionsBuilder};
use log::{info, warn};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

/// Viewport widths rendered on every pass, in order
pub const BREAKPOINTS: [u32; 4] = [320, 768, 1024, 1440];

/// Initial viewport height before the full-page resize
pub const VIEWPORT_HEIGHT: u32 = 900;

/// Mandatory wait after navigation so post-load animation/layout settles
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Short wait after growing the viewport to content height
const RELAYOUT_DELAY: Duration = Duration::from_millis(100);

/// Decorative before/after pseudo-elements are non-deterministic between
/// runs, so every capture hides them via an injected style rule.
const HIDE_DECORATIONS_JS: &str = r#"(() => {
    const style = document.createElement('style');
    style.textContent = 'body::before, body::after { display: none !important; }';
    document.head.appendChild(style);
})()"#;

/// Shared-library bundle prepended to `LD_LIBRARY_PATH` when present.
/// WSL/CI hosts may miss libraries the headless browser links against.
const BUNDLED_LIB_DIR: &str = ".tmp/chrome-libs/usr/lib/x86_64-linux-gnu";

/// Candidate locations for the preferred browser channel (Microsoft Edge)
const PREFERRED_BROWSER_PATHS: &[&str] = &[
    "/usr/bin/microsoft-edge",
    "/usr/bin/microsoft-edge-stable",
    "/opt/microsoft/msedge/msedge",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

/// Run one render pass: ensure the output directory exists, launch a
/// browser, and capture every breakpoint width in order.
///
/// Any failure fails the pass as a whole; screenshots written before the
/// failure stay on disk.
pub fn render(target: &RenderTarget) -> Result<()> {
    std::fs::create_dir_all(&target.out_dir)?;

    let browser = launch_browser()?;
    for &width in &BREAKPOINTS {
        capture_width(&browser, target, width)?;
    }

    // Dropping the browser terminates the child process
    drop(browser);
    Ok(())
}

/// Launch a headless browser, preferring the Edge channel when its binary is
/// on disk and falling back to default Chrome/Chromium autodetection.
/// Exactly two attempts, no backoff.
fn launch_browser() -> Result<Browser> {
    prepend_bundled_libs();

    if let Some(path) = preferred_browser() {
        match launch_with(Some(path.clone())) {
            Ok(browser) => return Ok(browser),
            Err(err) => warn!(
                "preferred browser {} failed to launch, falling back: {}",
                path.display(),
                err
            ),
        }
    }

    launch_with(None)
}

fn launch_with(path: Option<PathBuf>) -> Result<Browser> {
    let options = LaunchOptionsBuilder::default()
        .headless(true)
        .path(path)
        .window_size(Some((1440, VIEWPORT_HEIGHT)))
        .idle_browser_timeout(Duration::from_secs(120))
        .args(vec![
            OsStr::new("--force-device-scale-factor=1"),
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--allow-file-access-from-files"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
        ])
        .build()
        .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

    Browser::new(options).map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))
}

/// First preferred-channel binary that exists on disk, if any
fn preferred_browser() -> Option<PathBuf> {
    PREFERRED_BROWSER_PATHS
        .iter()
        .copied()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Prepend the local shared-library bundle to `LD_LIBRARY_PATH` if it exists.
/// No effect on hosts without the bundle. Runs at most once per process.
fn prepend_bundled_libs() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let libs = Path::new(BUNDLED_LIB_DIR);
        if !libs.is_dir() {
            return;
        }
        let libs = match std::path::absolute(libs) {
            Ok(path) => path,
            Err(_) => return,
        };
        let mut value = libs.into_os_string();
        if let Some(existing) = std::env::var_os("LD_LIBRARY_PATH") {
            if !existing.is_empty() {
                value.push(":");
                value.push(&existing);
            }
        }
        std::env::set_var("LD_LIBRARY_PATH", value);
    });
}

/// Capture one width: fresh tab, emulated viewport, navigate, settle, hide
/// decorations, grow the viewport to the content height, screenshot, close.
fn capture_width(browser: &Browser, target: &RenderTarget, width: u32) -> Result<()> {
    let tab = browser
        .new_tab()
        .map_err(|e| Error::NavigationError(format!("Failed to open page for width {}: {}", width, e)))?;

    set_viewport(&tab, width, VIEWPORT_HEIGHT)?;

    tab.navigate_to(target.page_url.as_str())
        .map_err(|e| Error::NavigationError(format!("Navigation to {} failed: {}", target.page_url, e)))?;
    tab.wait_until_navigated()
        .map_err(|e| Error::NavigationError(format!("Wait for navigation failed: {}", e)))?;

    std::thread::sleep(SETTLE_DELAY);

    tab.evaluate(HIDE_DECORATIONS_JS, false)
        .map_err(|e| Error::CaptureError(format!("Style injection failed: {}", e)))?;

    // Full-page capture: grow the emulated viewport to the document height so
    // the screenshot covers the whole page, not just the first 900px.
    let height = content_height(&tab)?.max(VIEWPORT_HEIGHT);
    set_viewport(&tab, width, height)?;
    std::thread::sleep(RELAYOUT_DELAY);

    let png = tab
        .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| Error::CaptureError(format!("Screenshot at width {} failed: {}", width, e)))?;

    let out = target.output_file(width);
    std::fs::write(&out, png)?;
    info!("captured {}", out.display());

    if let Err(err) = tab.close(true) {
        warn!("Failed to close page for width {}: {}", width, err);
    }
    Ok(())
}

/// Viewport emulation via `Emulation.setDeviceMetricsOverride`.
///
/// Declared locally with only the required parameters so the call stays
/// stable across protocol revisions.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SetDeviceMetricsOverride {
    width: u32,
    height: u32,
    device_scale_factor: f64,
    mobile: bool,
}

impl Method for SetDeviceMetricsOverride {
    const NAME: &'static str = "Emulation.setDeviceMetricsOverride";
    type ReturnObject = serde_json::Value;
}

fn set_viewport(tab: &Tab, width: u32, height: u32) -> Result<()> {
    tab.call_method(SetDeviceMetricsOverride {
        width,
        height,
        device_scale_factor: 1.0,
        mobile: false,
    })
    .map_err(|e| Error::CaptureError(format!("Viewport override {}x{} failed: {}", width, height, e)))?;
    Ok(())
}

/// Rendered document height in CSS pixels
fn content_height(tab: &Tab) -> Result<u32> {
    let result = tab
        .evaluate("document.documentElement.scrollHeight", false)
        .map_err(|e| Error::CaptureError(format!("Content height measurement failed: {}", e)))?;

    let height = result
        .value
        .as_ref()
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| Error::CaptureError("Content height is not a number".into()))?;

    Ok(height as u32)
}
