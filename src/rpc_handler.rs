//! RPC method handler for the bookmark-sync JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be tested without stdio.
//! `handle_method` dispatches one call to the [`App`].

use serde_json::{json, Value};

use crate::app::App;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::store::RemoteStore;
use crate::types::bookmark::{BookmarkId, OwnerId};

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with a user-facing message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Session ───
        "session.sign_in" => {
            let owner = params.get("owner").and_then(|v| v.as_str()).ok_or("missing owner")?;
            if owner.trim().is_empty() {
                return Err("owner must not be empty".to_string());
            }
            // A failed first load is shown in the view, the session is still open.
            let _ = app.sign_in(OwnerId::new(owner)).await;
            Ok(json!({"owner": owner, "view": app.list_view()}))
        }
        "session.sign_out" => {
            app.sign_out().await;
            Ok(json!({"ok": true}))
        }
        "session.current" => {
            let owner = app.store.current_identity().await;
            Ok(json!({"owner": owner}))
        }

        // ─── Bookmarks ───
        "bookmark.list" => Ok(json!(app.list_view())),
        "bookmark.refresh" => {
            app.sync.refresh().await.map_err(|e| e.to_string())?;
            Ok(json!(app.list_view()))
        }
        "bookmark.add" => {
            let title = params.get("title").and_then(|v| v.as_str()).ok_or("missing title")?;
            let url = params.get("url").and_then(|v| v.as_str()).ok_or("missing url")?;
            let mut form = app.form.lock().await;
            form.set_title(title);
            form.set_url(url);
            match form.submit().await {
                Ok(()) => Ok(json!({"ok": true, "form": form.snapshot()})),
                Err(_) => Err(form.error().unwrap_or_default().to_string()),
            }
        }
        "bookmark.delete" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            let owner = app.store.current_identity().await;
            app.sync
                .delete_bookmark(owner.as_ref(), &BookmarkId::new(id))
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => {
            let engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            serde_json::to_value(engine.get_settings()).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            engine.set_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "settings": engine.get_settings()}))
        }
        "settings.reset" => {
            let mut engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            engine.reset().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true, "settings": engine.get_settings()}))
        }

        // ─── Form ───
        "form.state" => {
            let form = app.form.lock().await;
            Ok(json!(form.snapshot()))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
