//! bookmark-sync RPC server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Push:     {"event":"bookmarks", "view":{...}} whenever the list changes.
//!
//! Logs go to stderr; `RUST_LOG` selects the level.

use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bookmark_sync::app::App;
use bookmark_sync::platform;
use bookmark_sync::rpc_handler::handle_method;
use bookmark_sync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use bookmark_sync::views::BookmarkListView;

/// Fixed one-second window limiter.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut settings_engine = SettingsEngine::new(std::env::var("BOOKMARK_SYNC_CONFIG").ok());
    let settings = settings_engine.load()?;
    let db_path = match &settings.database_path {
        Some(path) => std::path::PathBuf::from(path),
        None => {
            let dir = platform::get_data_dir();
            std::fs::create_dir_all(&dir)?;
            dir.join("bookmarks.db")
        }
    };
    info!(db = %db_path.display(), config = settings_engine.get_config_path(), "starting bookmark-sync");

    let app = App::new(&db_path, settings_engine)?;

    // Single writer so pushed events and responses never interleave mid-line.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(message) = out_rx.recv().await {
            let line = format!("{}\n", message);
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut changes = app.sync.watch();
    let push_tx = out_tx.clone();
    let pusher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let view = BookmarkListView::from_state(&changes.borrow_and_update());
            if push_tx.send(json!({"event": "bookmarks", "view": view})).is_err() {
                break;
            }
        }
    });

    if let Err(e) = app.startup().await {
        error!(error = %e, "startup load failed");
    }
    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&app, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        let _ = out_tx.send(response);
    }

    app.shutdown().await;
    pusher.abort();
    drop(out_tx);
    let _ = writer.await;
    info!("bookmark-sync stopped");
    Ok(())
}
