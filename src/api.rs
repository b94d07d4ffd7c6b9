//! REST surface over the core services.
//!
//! Handlers stay thin: extract, delegate, wrap in the response envelope.
//! Everything that can fail returns `AppError`, which carries its own status
//! mapping. Command dispatch endpoints are infallible by design — the
//! command pipeline folds failures into the returned `CommandResult`, so
//! clients inspect `exitCode` instead of the HTTP status.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::model::{
    CommandRequest, CommandResult, ListItem, MacroDefinition, MacroExecuteRequest,
    ShareLinkRequest,
};
use crate::parse;
use crate::state::AppState;

// ── Response envelope ────────────────────────────────────────────

#[derive(Serialize)]
struct ApiOk<T: Serialize> {
    ok: bool,
    data: T,
}

fn ok_json<T: Serialize>(data: T) -> impl IntoResponse {
    Json(ApiOk { ok: true, data })
}

// ── Helpers ──────────────────────────────────────────────────────

/// Dispatch one command through the pipeline and return its result as-is.
async fn dispatch(state: &AppState, speaker: &str, action: &str, args: &[String]) -> CommandResult {
    state
        .commands
        .execute(CommandRequest::new(speaker, action, args))
        .await
}

/// Dispatch and insist on exit code 0, for queries whose output feeds a
/// typed response. Failures surface as a gateway error.
async fn query(
    state: &AppState,
    speaker: &str,
    action: &str,
    args: &[String],
) -> Result<CommandResult, AppError> {
    let result = dispatch(state, speaker, action, args).await;
    if result.is_success() {
        Ok(result)
    } else {
        Err(AppError::Transport {
            message: format!("'{action}' failed: {}", result.error_msg),
        })
    }
}

/// Household-wide queries (favorites, playlists) go through whichever
/// speaker is first in the discovery cache.
async fn any_speaker(state: &AppState) -> Result<String, AppError> {
    state
        .discovery
        .discover(false)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::SpeakerNotFound {
            name: "(no speakers discovered)".to_string(),
        })
}

// ── Version ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

async fn get_version() -> impl IntoResponse {
    ok_json(VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Supervisor ───────────────────────────────────────────────────

async fn get_server_status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    ok_json(state.supervisor.status().await)
}

async fn post_server_start(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    if !state.supervisor.start().await {
        return Err(AppError::ProcessStart {
            message: "server did not reach a healthy state".to_string(),
        });
    }
    Ok(ok_json(state.supervisor.status().await))
}

async fn post_server_stop(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    state.supervisor.stop().await;
    ok_json(state.supervisor.status().await)
}

// ── Discovery & speaker info ─────────────────────────────────────

async fn get_speakers(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.discovery.discover(false).await?))
}

async fn post_rediscover(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.discovery.discover(true).await?))
}

async fn get_speaker(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.device.get_speaker_info(&name).await?))
}

// ── Command dispatch ─────────────────────────────────────────────

async fn post_command(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> impl IntoResponse {
    ok_json(state.commands.execute(request).await)
}

async fn post_playpause(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "playpause", &[]).await)
}

async fn get_volume(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "volume", &[]).await)
}

async fn post_volume(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, level)): Path<(String, u8)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "volume", &[level.to_string()]).await)
}

async fn get_mute(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "mute", &[]).await)
}

async fn post_mute(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, mute)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "mute", &[mute]).await)
}

async fn get_track(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "track", &[]).await)
}

async fn post_next(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "next", &[]).await)
}

async fn post_previous(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "previous", &[]).await)
}

// ── Playback modes ───────────────────────────────────────────────

async fn get_shuffle(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = query(&state, &name, "shuffle", &[]).await?;
    Ok(ok_json(parse::parse_on_off(&result.result)))
}

async fn post_shuffle(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, mode)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "shuffle", &[mode]).await)
}

async fn get_repeat(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Repeat is three-valued (off/one/all), so the raw word passes through
    let result = query(&state, &name, "repeat", &[]).await?;
    Ok(ok_json(result.result.trim().to_lowercase()))
}

async fn post_repeat(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, mode)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "repeat", &[mode]).await)
}

async fn get_crossfade(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = query(&state, &name, "cross_fade", &[]).await?;
    Ok(ok_json(parse::parse_on_off(&result.result)))
}

async fn post_crossfade(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, mode)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "cross_fade", &[mode]).await)
}

async fn post_sleep(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, duration)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "sleep", &[duration]).await)
}

async fn post_sleep_cancel(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    // Duration 0 cancels a pending sleep timer
    ok_json(dispatch(&state, &name, "sleep", &["0".to_string()]).await)
}

async fn post_seek(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, position)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "seek", &[position]).await)
}

// ── Grouping ─────────────────────────────────────────────────────

async fn post_group_volume(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, level)): Path<(String, u8)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "group_volume", &[level.to_string()]).await)
}

async fn post_party(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "party_mode", &[]).await)
}

async fn post_ungroup_all(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "ungroup_all", &[]).await)
}

async fn post_transfer(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, target)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "transfer_playback", &[target]).await)
}

async fn get_groups(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let speaker = any_speaker(&state).await?;
    Ok(ok_json(dispatch(&state, &speaker, "groups", &[]).await))
}

async fn post_group(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, target)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "group", &[target]).await)
}

async fn post_ungroup(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "ungroup", &[]).await)
}

// ── Favorites & playlists ────────────────────────────────────────

async fn get_favorites(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let speaker = any_speaker(&state).await?;
    Ok(ok_json(state.device.get_favorites(&speaker).await?))
}

async fn get_playlists(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let speaker = any_speaker(&state).await?;
    let result = query(&state, &speaker, "list_playlists", &[]).await?;
    Ok(ok_json(parse::parse_numbered_list(&result.result)))
}

async fn get_playlist_tracks(
    Extension(state): Extension<Arc<AppState>>,
    Path(playlist): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let speaker = any_speaker(&state).await?;
    let result = query(&state, &speaker, "list_playlist_tracks", &[playlist]).await?;
    let tracks: Vec<ListItem> = parse::parse_numbered_list(&result.result);
    Ok(ok_json(tracks))
}

async fn post_play_favorite(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, favorite)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "play_favourite", &[favorite]).await)
}

async fn post_play_favorite_number(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, number)): Path<(String, u32)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "play_favourite_number", &[number.to_string()]).await)
}

async fn get_radio_stations(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let speaker = any_speaker(&state).await?;
    let result = query(&state, &speaker, "favourite_radio_stations", &[]).await?;
    Ok(ok_json(parse::parse_numbered_list(&result.result)))
}

async fn post_play_radio(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, station)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "play_favourite_radio_station", &[station]).await)
}

// ── Queue ────────────────────────────────────────────────────────

async fn get_queue(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.device.get_queue(&name).await?))
}

async fn post_queue_clear(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "clear_queue", &[]).await)
}

async fn get_queue_length(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "queue_length", &[]).await)
}

async fn get_queue_position(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "queue_position", &[]).await)
}

async fn post_queue_play(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "play_from_queue", &[]).await)
}

async fn post_queue_play_at(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, position)): Path<(String, u32)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "play_from_queue", &[position.to_string()]).await)
}

async fn post_queue_add_favorite(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, favorite)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "add_favourite_to_queue", &[favorite]).await)
}

async fn post_queue_add_playlist(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, playlist)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "add_playlist_to_queue", &[playlist]).await)
}

async fn post_queue_save(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, playlist)): Path<(String, String)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "save_queue", &[playlist]).await)
}

async fn post_queue_remove(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, position)): Path<(String, u32)>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "remove_from_queue", &[position.to_string()]).await)
}

async fn post_queue_add_sharelink(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<ShareLinkRequest>,
) -> impl IntoResponse {
    ok_json(dispatch(&state, &name, "add_sharelink_to_queue", &[request.url]).await)
}

// ── Macros ───────────────────────────────────────────────────────

async fn get_macros(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.list()?))
}

async fn post_macro(
    Extension(state): Extension<Arc<AppState>>,
    Json(definition): Json<MacroDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let name = definition.name.clone();
    state.macros.create_or_update(definition).await?;
    Ok(ok_json(state.macros.get(&name)?))
}

async fn get_macro(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.get(&name)?))
}

async fn delete_macro(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.macros.delete(&name).await?;
    Ok(ok_json(name))
}

async fn post_macro_execute(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<MacroExecuteRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.execute(&request).await?))
}

async fn post_macro_duplicate(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, new_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.duplicate(&name, &new_name).await?))
}

async fn get_macros_export(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.export()?))
}

async fn post_macros_import(
    Extension(state): Extension<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.macros.import(&body).await?))
}

// ── Library ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(default)]
struct LibraryQuery {
    search: Option<String>,
    max_items: usize,
}

impl Default for LibraryQuery {
    fn default() -> Self {
        Self {
            search: None,
            max_items: 100,
        }
    }
}

async fn get_artists(
    Extension(state): Extension<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> impl IntoResponse {
    ok_json(state.catalog.get_artists(q.search.as_deref(), q.max_items))
}

async fn get_albums(
    Extension(state): Extension<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> impl IntoResponse {
    ok_json(state.catalog.get_albums(q.search.as_deref(), q.max_items))
}

async fn get_tracks(
    Extension(state): Extension<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> impl IntoResponse {
    ok_json(state.catalog.get_tracks(q.search.as_deref(), q.max_items))
}

async fn get_genres(
    Extension(state): Extension<Arc<AppState>>,
    Query(q): Query<LibraryQuery>,
) -> impl IntoResponse {
    ok_json(state.catalog.get_genres(q.search.as_deref(), q.max_items))
}

async fn get_cache(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    ok_json(state.catalog.get_full_cache())
}

async fn get_cache_status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    ok_json(state.catalog.get_cache_status())
}

async fn post_cache_refresh(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_json(state.catalog.refresh().await?))
}

// ── Router ───────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/version", get(get_version))
        // supervisor
        .route("/api/sonos/status", get(get_server_status))
        .route("/api/sonos/start", post(post_server_start))
        .route("/api/sonos/stop", post(post_server_stop))
        // discovery
        .route("/api/sonos/speakers", get(get_speakers))
        .route("/api/sonos/rediscover", post(post_rediscover))
        .route("/api/sonos/speakers/{name}", get(get_speaker))
        // commands
        .route("/api/sonos/command", post(post_command))
        .route("/api/sonos/speakers/{name}/playpause", post(post_playpause))
        .route("/api/sonos/speakers/{name}/volume", get(get_volume))
        .route("/api/sonos/speakers/{name}/volume/{level}", post(post_volume))
        .route("/api/sonos/speakers/{name}/mute", get(get_mute))
        .route("/api/sonos/speakers/{name}/mute/{state}", post(post_mute))
        .route("/api/sonos/speakers/{name}/track", get(get_track))
        .route("/api/sonos/speakers/{name}/next", post(post_next))
        .route("/api/sonos/speakers/{name}/previous", post(post_previous))
        // playback modes
        .route("/api/sonos/speakers/{name}/shuffle", get(get_shuffle))
        .route("/api/sonos/speakers/{name}/shuffle/{state}", post(post_shuffle))
        .route("/api/sonos/speakers/{name}/repeat", get(get_repeat))
        .route("/api/sonos/speakers/{name}/repeat/{state}", post(post_repeat))
        .route("/api/sonos/speakers/{name}/crossfade", get(get_crossfade))
        .route("/api/sonos/speakers/{name}/crossfade/{state}", post(post_crossfade))
        .route("/api/sonos/speakers/{name}/sleep/cancel", post(post_sleep_cancel))
        .route("/api/sonos/speakers/{name}/sleep/{duration}", post(post_sleep))
        .route("/api/sonos/speakers/{name}/seek/{position}", post(post_seek))
        // grouping
        .route("/api/sonos/speakers/{name}/group-volume/{level}", post(post_group_volume))
        .route("/api/sonos/speakers/{name}/party", post(post_party))
        .route("/api/sonos/speakers/{name}/ungroup-all", post(post_ungroup_all))
        .route("/api/sonos/speakers/{name}/transfer/{target}", post(post_transfer))
        .route("/api/sonos/groups", get(get_groups))
        .route("/api/sonos/speakers/{name}/group/{target}", post(post_group))
        .route("/api/sonos/speakers/{name}/ungroup", post(post_ungroup))
        // favorites & playlists
        .route("/api/sonos/favorites", get(get_favorites))
        .route("/api/sonos/playlists", get(get_playlists))
        .route("/api/sonos/playlists/{name}/tracks", get(get_playlist_tracks))
        .route("/api/sonos/speakers/{name}/play-favorite/{favorite}", post(post_play_favorite))
        .route("/api/sonos/speakers/{name}/play-favorite-number/{number}", post(post_play_favorite_number))
        .route("/api/sonos/radio", get(get_radio_stations))
        .route("/api/sonos/speakers/{name}/radio/{station}", post(post_play_radio))
        // queue
        .route("/api/sonos/speakers/{name}/queue", get(get_queue))
        .route("/api/sonos/speakers/{name}/queue/clear", post(post_queue_clear))
        .route("/api/sonos/speakers/{name}/queue/length", get(get_queue_length))
        .route("/api/sonos/speakers/{name}/queue/position", get(get_queue_position))
        .route("/api/sonos/speakers/{name}/queue/play", post(post_queue_play))
        .route("/api/sonos/speakers/{name}/queue/play/{position}", post(post_queue_play_at))
        .route("/api/sonos/speakers/{name}/queue/add-favorite/{favorite}", post(post_queue_add_favorite))
        .route("/api/sonos/speakers/{name}/queue/add-playlist/{playlist}", post(post_queue_add_playlist))
        .route("/api/sonos/speakers/{name}/queue/save/{playlist}", post(post_queue_save))
        .route("/api/sonos/speakers/{name}/queue/remove/{position}", post(post_queue_remove))
        .route("/api/sonos/speakers/{name}/queue/add-sharelink", post(post_queue_add_sharelink))
        // macros
        .route("/api/macros", get(get_macros).post(post_macro))
        .route("/api/macros/execute", post(post_macro_execute))
        .route("/api/macros/export", get(get_macros_export))
        .route("/api/macros/import", post(post_macros_import))
        .route("/api/macros/{name}", get(get_macro).delete(delete_macro))
        .route("/api/macros/{name}/duplicate/{newName}", post(post_macro_duplicate))
        // library
        .route("/api/library/artists", get(get_artists))
        .route("/api/library/albums", get(get_albums))
        .route("/api/library/tracks", get(get_tracks))
        .route("/api/library/genres", get(get_genres))
        .route("/api/library/cache", get(get_cache))
        .route("/api/library/cache/status", get(get_cache_status))
        .route("/api/library/cache/refresh", post(post_cache_refresh))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
