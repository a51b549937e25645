//! WebSocket listener for `ws://<host>/v2/requests?chainId=<int>`.
//!
//! The stream is listen-only: a client subscribes and receives every
//! [`CoordinatorEvent`] published on that chain's event bus from the moment
//! it connects, serialized as `{"type": ..., "data": ...}`. There is no
//! inbound message handling; anything the client sends is ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::{AppState, ChainIdQuery};

pub async fn handle_upgrade(
	ws: WebSocketUpgrade,
	Query(query): Query<ChainIdQuery>,
	State(state): State<AppState>,
) -> impl IntoResponse {
	ws.on_upgrade(move |socket| stream_events(socket, state, query.chain_id))
}

async fn stream_events(mut socket: WebSocket, state: AppState, chain_id: u64) {
	let receiver = state.coordinator.event_bus().subscribe(chain_id);
	let mut events = BroadcastStream::new(receiver);

	tracing::debug!(chain_id, "websocket subscriber connected");

	loop {
		tokio::select! {
			event = events.next() => {
				let Some(event) = event else {
					break;
				};
				let event = match event {
					Ok(event) => event,
					Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
						tracing::warn!(chain_id, skipped, "websocket subscriber lagged, events dropped");
						continue;
					}
				};
				let Ok(payload) = serde_json::to_string(&event) else {
					tracing::warn!(chain_id, "failed to serialize event for websocket");
					continue;
				};
				if socket.send(Message::Text(payload.into())).await.is_err() {
					break;
				}
			}
			incoming = socket.recv() => {
				// Listen-only: a close frame or stream end ends the loop, any
				// other inbound message is simply discarded.
				match incoming {
					Some(Ok(Message::Close(_))) | None => break,
					Some(Ok(_)) => continue,
					Some(Err(_)) => break,
				}
			}
		}
	}

	tracing::debug!(chain_id, "websocket subscriber disconnected");
}
