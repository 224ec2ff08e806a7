//! Path resolution for render targets
//!
//! Turns the CLI's positional arguments into the absolute paths and file URL
//! the render driver needs. No existence checks happen here; a missing page
//! shows up later as a navigation failure from the browser.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Default page rendered when no positional argument is given
pub const DEFAULT_PAGE: &str = "index.html";

/// Everything a render pass needs to know about where to read and write.
///
/// Built once at startup by [`RenderTarget::resolve`] and shared (cloned)
/// between render passes in watch mode.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    /// Absolute path of the input page
    pub page_path: PathBuf,
    /// `file://` URL of the input page, used for browser navigation
    pub page_url: Url,
    /// Absolute output directory for the screenshots
    pub out_dir: PathBuf,
    /// Base name used for output files (`<base_name>-<width>.png`)
    pub base_name: String,
    /// Directory watched recursively in watch mode (the page's parent)
    pub watch_root: PathBuf,
}

impl RenderTarget {
    /// Resolve the optional CLI arguments into a concrete target.
    ///
    /// `page` defaults to `index.html` and `out_dir` to
    /// `renders/<file stem of page>`; both are made absolute against the
    /// process working directory.
    pub fn resolve(page: Option<&Path>, out_dir: Option<&Path>) -> Result<Self> {
        let page = page.unwrap_or_else(|| Path::new(DEFAULT_PAGE));

        let page_path = std::path::absolute(page)?;
        let base_name = page_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::PathError(format!("no file name in {}", page.display())))?;

        let page_url = Url::from_file_path(&page_path)
            .map_err(|_| Error::PathError(format!("not a file path: {}", page_path.display())))?;

        let out_dir = match out_dir {
            Some(dir) => std::path::absolute(dir)?,
            None => std::path::absolute(Path::new("renders").join(&base_name))?,
        };

        let watch_root = page_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::PathError(format!("no parent directory for {}", page_path.display())))?;

        Ok(Self {
            page_path,
            page_url,
            out_dir,
            base_name,
            watch_root,
        })
    }

    /// Output path for one viewport width
    pub fn output_file(&self, width: u32) -> PathBuf {
        self.out_dir.join(format!("{}-{}.png", self.base_name, width))
    }
}
