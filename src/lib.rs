//! Mockshot
//!
//! Renders a local HTML page at a fixed set of viewport widths to produce
//! mockup screenshots, with an optional watch mode that re-renders on
//! filesystem changes.
//!
//! Browser control goes through the Chrome DevTools Protocol via the
//! `headless_chrome` crate; filesystem watching is delegated to `notify`.
//! Each render pass launches a fresh browser, captures one full-page PNG per
//! breakpoint width (320, 768, 1024, 1440), and tears the browser down.
//!
//! # Example
//!
//! ```no_run
//! use mockshot::paths::RenderTarget;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let target = RenderTarget::resolve(Some(Path::new("page.html")), None)?;
//! mockshot::render::render(&target)?;
//! // renders/page/page-320.png .. renders/page/page-1440.png
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod paths;
pub use paths::RenderTarget;

pub mod render;
pub use render::{render, BREAKPOINTS};

pub mod watch;
pub use watch::{WatchSession, DEBOUNCE_WINDOW};
