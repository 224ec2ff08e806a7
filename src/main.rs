use clap::Parser;
use log::{error, info};
use mockshot::paths::RenderTarget;
use mockshot::watch::{self, RenderFn, WatchSession};
use std::path::PathBuf;
use std::sync::Arc;

/// Render a local HTML page at breakpoint widths to mockup screenshots
#[derive(Parser, Debug)]
#[command(name = "mockshot", version, about)]
struct Cli {
    /// Page to render (defaults to index.html)
    page: Option<PathBuf>,

    /// Output directory (defaults to renders/<page name>)
    out_dir: Option<PathBuf>,

    /// Keep watching the page's directory and re-render on changes
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let target = match RenderTarget::resolve(cli.page.as_deref(), cli.out_dir.as_deref()) {
        Ok(target) => target,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    if cli.watch {
        run_watch(target).await;
    } else {
        run_once(target).await;
    }
}

/// Single-shot mode: one render pass, non-zero exit on failure.
async fn run_once(target: RenderTarget) {
    let result = tokio::task::spawn_blocking(move || mockshot::render(&target)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!("{}", err);
            std::process::exit(1);
        }
        Err(err) => {
            error!("render task panicked: {}", err);
            std::process::exit(1);
        }
    }
}

/// Watch mode: render immediately, then re-render on debounced changes.
/// Render failures are logged; the watcher never exits on its own.
async fn run_watch(target: RenderTarget) {
    let (watcher, events) = match watch::spawn_fs_watcher(&target.watch_root) {
        Ok(pair) => pair,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    info!("watching {} for changes", target.watch_root.display());

    let out_dir = target.out_dir.clone();
    let render_target = target.clone();
    let render: RenderFn = Arc::new(move || mockshot::render(&render_target));

    WatchSession::new(events, render, Some(out_dir)).run().await;

    // Only reachable if the watcher backend shuts the event stream down
    drop(watcher);
}
