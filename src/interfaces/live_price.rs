//! Live price push (C9): a WebSocket that streams the latest mark price and
//! most recent decision for the configured trading pair every 2 seconds.

use crate::interfaces::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws/live", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| push_loop(socket, state))
}

async fn push_loop(mut socket: WebSocket, state: AppState) {
    let symbol = state.config.trading_pair.clone();
    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        interval.tick().await;
        let price = match state.orchestrator.candles.latest_price_from_db(&symbol).await {
            Ok(price) => price.unwrap_or(0.0),
            Err(err) => {
                debug!(%err, "live price lookup failed");
                continue;
            }
        };

        let (latest_decision, latest_decision_id) = match state.orchestrator.decisions.recent(1).await {
            Ok(mut decisions) => match decisions.pop() {
                Some(decision) => {
                    let id = decision.id;
                    (json!(decision), json!(id))
                }
                None => (serde_json::Value::Null, serde_json::Value::Null),
            },
            Err(err) => {
                debug!(%err, "latest decision lookup failed");
                (serde_json::Value::Null, serde_json::Value::Null)
            }
        };

        let payload = json!({
            "timestamp": chrono::Utc::now(),
            "symbol": symbol,
            "price": price,
            "latest_decision": latest_decision,
            "latest_decision_id": latest_decision_id,
        });
        if socket.send(Message::Text(payload.to_string().into())).await.is_err() {
            break;
        }
    }
}
