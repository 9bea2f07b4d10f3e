use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::live_data::provider::UpstreamProbe;
use crate::live_data::{Broadcaster, LiveDataError, LiveDataService};
use crate::models::{MatchSummary, RefreshResult};

/// Push event name understood by the page script.
pub const UPDATE_EVENT: &str = "update_data";

const PING_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Clone)]
pub struct AppState {
    pub service: LiveDataService,
    /// Key prefix reported by the diagnostic endpoint
    pub masked_api_key: String,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/matches", get(matches_handler))
        .route("/api/refresh", get(refresh_handler))
        .route("/api/test", get(upstream_test_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve the page with the current snapshot as its initial data.
async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.service.current().await;
    let json = serde_json::to_string(&*snapshot).unwrap_or_else(|_| "null".to_string());
    // keep a team name containing "</script>" from closing the tag
    let json = json.replace("</", "<\\/");
    Html(DASHBOARD_HTML.replace("__INITIAL_DATA__", &json))
}

/// GET /api/snapshot
async fn snapshot_handler(State(state): State<Arc<AppState>>) -> Json<RefreshResult> {
    Json((*state.service.current().await).clone())
}

#[derive(Debug, Deserialize)]
pub struct MatchesQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub status: String,
    pub message: Option<String>,
}

impl MatchesResponse {
    fn error(date: Option<String>, message: String) -> Self {
        MatchesResponse {
            matches: Vec::new(),
            date,
            status: "error".to_string(),
            message: Some(message),
        }
    }
}

/// GET /api/matches?date=YYYY-MM-DD
///
/// Only a missing date is a client error (400). An unparseable date or an
/// upstream failure comes back as 200 with `status: "error"`.
async fn matches_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MatchesQuery>,
) -> (StatusCode, Json<MatchesResponse>) {
    let Some(raw_date) = q.date.filter(|d| !d.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(MatchesResponse::error(
                None,
                LiveDataError::NotFound("No date provided".to_string()).to_string(),
            )),
        );
    };

    let date = match NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d") {
        Ok(d) => d,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(MatchesResponse::error(Some(raw_date), e.to_string())),
            )
        }
    };

    let body = match state.service.matches_for_date(date).await {
        Ok(matches) => MatchesResponse {
            matches,
            date: Some(raw_date),
            status: "success".to_string(),
            message: None,
        },
        Err(e) => {
            warn!("Matches query for {} failed: {}", date, e);
            MatchesResponse::error(Some(raw_date), e.to_string())
        }
    };
    (StatusCode::OK, Json(body))
}

/// GET /api/refresh
async fn refresh_handler(State(state): State<Arc<AppState>>) -> Json<RefreshResult> {
    Json((*state.service.refresh_now().await).clone())
}

/// GET /api/test
async fn upstream_test_handler(State(state): State<Arc<AppState>>) -> Json<UpstreamTestResponse> {
    let api_key_used = state.masked_api_key.clone();
    let body = match state.service.source().probe().await {
        Ok(probe) => UpstreamTestResponse {
            probe: Some(probe),
            error: None,
            api_key_used,
        },
        Err(e) => UpstreamTestResponse {
            probe: None,
            error: Some(e.to_string()),
            api_key_used,
        },
    };
    Json(body)
}

#[derive(Debug, Serialize)]
pub struct UpstreamTestResponse {
    #[serde(flatten)]
    pub probe: Option<UpstreamProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub api_key_used: String,
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let broadcaster = state.service.broadcaster().clone();
    ws.on_upgrade(move |socket| viewer_loop(socket, broadcaster))
}

#[derive(Serialize)]
struct UpdateEvent<'a> {
    event: &'static str,
    data: &'a RefreshResult,
}

fn update_frame(result: &RefreshResult) -> Option<String> {
    let event = UpdateEvent {
        event: UPDATE_EVENT,
        data: result,
    };
    match serde_json::to_string(&event) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to encode update frame: {}", e);
            None
        }
    }
}

/// Forward snapshots to one viewer until either side goes away.
async fn viewer_loop(socket: WebSocket, broadcaster: Broadcaster) {
    let mut viewer = broadcaster.subscribe().await;
    let (mut sink, mut stream) = socket.split();
    debug!("Viewer {} connected", viewer.id);

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            update = viewer.recv() => match update {
                Some(result) => {
                    let Some(frame) = update_frame(&result) else { continue };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    broadcaster.unsubscribe(viewer.id).await;
    debug!("Viewer {} disconnected", viewer.id);
}

/// Embedded single-file page (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Premier League Live</title>
<style>
  :root { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --accent: #6c63ff; --text: #e0e0e0; --muted: #8888aa; --live: #00c896; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header img { height: 36px; }
  header h1 { font-size: 1.4rem; font-weight: 700; flex: 1; }
  header input, header button { background: var(--card); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .4rem .7rem; }
  main { padding: 1.5rem 2rem; display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .6rem .8rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .55rem .8rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  td img { height: 18px; vertical-align: middle; margin-right: .4rem; }
  .score { font-weight: 700; text-align: center; }
  .LIVE, .IN_PLAY { color: var(--live); }
  .muted { color: var(--muted); font-size: .8rem; }
  .error { color: #ff4f6a; padding: .6rem 1.2rem; }
</style>
</head>
<body>
<header>
  <img id="competition-logo" alt="">
  <h1>Premier League Live</h1>
  <input type="date" id="date-picker">
  <button id="refresh-btn">Refresh</button>
  <span class="muted" id="last-updated"></span>
</header>
<main>
  <section class="panel">
    <div class="panel-header"><span>Matches</span><span class="muted" id="matches-label">Today</span></div>
    <div class="error" id="error" hidden></div>
    <table><tbody id="matches"></tbody></table>
  </section>
  <section class="panel">
    <div class="panel-header"><span>Standings</span></div>
    <table>
      <thead><tr><th>#</th><th>Team</th><th>P</th><th>W</th><th>D</th><th>L</th><th>GD</th><th>Pts</th></tr></thead>
      <tbody id="standings"></tbody>
    </table>
  </section>
</main>
<script>
const INITIAL_DATA = __INITIAL_DATA__;
const esc = s => String(s ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
const logo = url => url ? `<img src="${esc(url)}" alt="">` : '';

function renderMatches(matches) {
  document.getElementById('matches').innerHTML = matches.length ? matches.map(m => `
    <tr>
      <td>${logo(m.homeTeamLogo)}${esc(m.homeTeam)}</td>
      <td class="score ${esc(m.status)}">${esc(m.score)}</td>
      <td>${logo(m.awayTeamLogo)}${esc(m.awayTeam)}</td>
      <td class="muted">${new Date(m.kickoffTime).toLocaleString()}</td>
    </tr>`).join('') : '<tr><td class="muted">No matches</td></tr>';
}

function renderStandings(s) {
  if (s.competitionLogo) document.getElementById('competition-logo').src = s.competitionLogo;
  document.getElementById('standings').innerHTML = s.standings.map(r => `
    <tr><td>${r.position}</td><td>${logo(r.teamLogo)}${esc(r.team)}</td><td>${r.played}</td><td>${r.won}</td>
    <td>${r.draw}</td><td>${r.lost}</td><td>${r.goalDifference}</td><td><b>${r.points}</b></td></tr>`).join('');
}

function render(data) {
  renderMatches(data.matches);
  renderStandings(data.standings);
  document.getElementById('last-updated').textContent = 'Updated ' + new Date(data.fetchedAt).toLocaleTimeString();
  const err = document.getElementById('error');
  err.hidden = !data.error;
  err.textContent = data.error || '';
}

document.getElementById('refresh-btn').onclick = async () => render(await (await fetch('/api/refresh')).json());
document.getElementById('date-picker').onchange = async e => {
  const r = await (await fetch('/api/matches?date=' + encodeURIComponent(e.target.value))).json();
  document.getElementById('matches-label').textContent = e.target.value;
  if (r.status === 'error') { alert(r.message); return; }
  renderMatches(r.matches);
};

function connect() {
  const ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/ws');
  ws.onmessage = e => { const msg = JSON.parse(e.data); if (msg.event === 'update_data') render(msg.data); };
  ws.onclose = () => setTimeout(connect, 3000);
}

render(INITIAL_DATA);
connect();
</script>
</body>
</html>
"#;
