//! Chat qualification endpoint.
//!
//! One request = one sequential pipeline: rate check → conversation
//! load/create → persist user message → load history → enrich prompt →
//! call the gateway → relay the token stream. The relay forwards each
//! delta to the caller as it arrives while buffering the decoded text;
//! when the upstream stream ends, the buffered reply is persisted once
//! and the qualification/webhook side channel runs. The flush task is
//! independent of the client connection: if the caller disconnects
//! mid-stream, forwarding stops but the partial text is still persisted.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use parrita_core::enrich::{enrich_prompt, EnrichedPrompt};
use parrita_core::llm::{extract_stream_delta, GatewayMessage};
use parrita_core::model::{ChatMessage, Conversation, MessageRole};
use parrita_core::prompt::QUALIFICATION_PROMPT;
use parrita_core::{qualify, rate_limit, webhook};

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route(
            "/api/v1/conversations/{id}/messages",
            get(list_conversation_messages),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

fn to_message_response(m: ChatMessage) -> MessageResponse {
    MessageResponse {
        id: m.id.to_string(),
        role: m.role.to_string(),
        content: m.content,
        created_at: m.created_at.to_rfc3339(),
    }
}

/// `POST /api/v1/chat` — streamed qualification turn.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Message and sessionId are required"))?;
    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("Message and sessionId are required"))?;

    if message.chars().count() > state.config.chat.max_message_length {
        return Err(ApiError::bad_request(format!(
            "Message trop long (max {} caractères)",
            state.config.chat.max_message_length
        )));
    }

    let decision =
        rate_limit::check_rate_limit(&state.storage, &session_id, Utc::now(), &state.config.rate_limit)
            .await;
    if !decision.allowed {
        tracing::info!(%session_id, "rate limit exceeded");
        return Err(ApiError::too_many_requests(
            "Trop de requêtes. Veuillez réessayer dans quelques minutes.",
            decision.retry_after_secs,
        ));
    }

    let conversation = match req.conversation_id {
        Some(id) => state.storage.get_conversation(id).await?,
        None => {
            let conversation = Conversation::new(&*session_id);
            state.storage.create_conversation(&conversation).await?;
            conversation
        }
    };

    // Persist the user message before the gateway call, so history shows
    // it even when generation fails.
    state
        .storage
        .append_message(&ChatMessage::new(
            conversation.id,
            MessageRole::User,
            &*message,
        ))
        .await?;

    let history = state.storage.list_messages(conversation.id).await?;

    let EnrichedPrompt {
        prompt,
        reference_calls,
    } = enrich_prompt(
        &state.storage,
        &history,
        QUALIFICATION_PROMPT,
        &state.config.enrichment,
    )
    .await;

    let mut gateway_messages = vec![GatewayMessage::system(prompt)];
    gateway_messages.extend(history.iter().map(GatewayMessage::from_history));

    let upstream = state.gateway.stream_chat(&gateway_messages).await?;

    tracing::debug!(
        conversation_id = %conversation.id,
        history_len = history.len(),
        reference_calls = reference_calls.len(),
        "relaying gateway stream"
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(32);

    let relay_state = Arc::clone(&state);
    let conversation_id = conversation.id;
    let relay_session = session_id.clone();
    let message_count = history.len();
    tokio::spawn(async move {
        // One leading metadata event disclosing the reference calls, when
        // any were used.
        if !reference_calls.is_empty() {
            let metadata = serde_json::json!({ "reference_calls": reference_calls });
            let _ = tx.send(Ok(Event::default().data(metadata.to_string()))).await;
        }

        let mut full_response = String::new();
        let mut pending = String::new();
        let mut stream = upstream.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "gateway stream interrupted");
                    break;
                }
            };
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // SSE lines can split across chunk boundaries; only complete
            // lines are parsed, the tail stays pending.
            while let Some(newline) = pending.find('\n') {
                let line = pending[..newline].trim_end_matches('\r').to_string();
                pending.drain(..=newline);
                forward_delta(&line, &mut full_response, &tx).await;
            }
        }
        let tail = pending.trim_end().to_string();
        forward_delta(&tail, &mut full_response, &tx).await;

        // Close the client stream before the (potentially slow) flush.
        drop(tx);

        if full_response.is_empty() {
            tracing::warn!(conversation_id = %conversation_id, "gateway stream produced no text");
            return;
        }
        flush_response(
            relay_state,
            conversation_id,
            relay_session,
            message_count,
            full_response,
        )
        .await;
    });

    let mut response = Sse::new(ReceiverStream::new(rx)).into_response();
    if let Ok(value) = HeaderValue::from_str(&conversation.id.to_string()) {
        response.headers_mut().insert("x-conversation-id", value);
    }
    Ok(response)
}

/// Forward one parsed delta to the caller and append it to the buffer.
/// Send errors mean the client went away; buffering continues regardless.
async fn forward_delta(
    line: &str,
    full_response: &mut String,
    tx: &tokio::sync::mpsc::Sender<Result<Event, Infallible>>,
) {
    if let Some(delta) = extract_stream_delta(line) {
        full_response.push_str(&delta);
        let payload = serde_json::json!({ "delta": delta });
        let _ = tx.send(Ok(Event::default().data(payload.to_string()))).await;
    }
}

/// Deferred persistence and side effects, run exactly once per stream.
async fn flush_response(
    state: Arc<AppState>,
    conversation_id: Uuid,
    session_id: String,
    message_count: usize,
    full_response: String,
) {
    if let Err(e) = state
        .storage
        .append_message(&ChatMessage::new(
            conversation_id,
            MessageRole::Assistant,
            &*full_response,
        ))
        .await
    {
        tracing::error!(conversation_id = %conversation_id, error = %e, "failed to persist assistant reply");
    }

    let timestamp: DateTime<Utc> = Utc::now();

    if qualify::is_qualified(
        &full_response,
        message_count,
        state.config.chat.qualification_message_threshold,
    ) {
        if let Err(e) = state
            .storage
            .mark_qualified(conversation_id, qualify::qualification_data(message_count))
            .await
        {
            tracing::error!(conversation_id = %conversation_id, error = %e, "failed to mark conversation qualified");
        }

        if state.config.webhooks.enabled {
            let payload = serde_json::json!({
                "event": webhook::EVENT_CONVERSATION_QUALIFIED,
                "conversation_id": conversation_id,
                "session_id": session_id,
                "messages_count": message_count,
                "last_message": full_response,
                "timestamp": timestamp.to_rfc3339(),
            });
            webhook::notify_event(
                &state.storage,
                &state.http,
                webhook::EVENT_CONVERSATION_QUALIFIED,
                &payload,
            )
            .await;
        }
    }

    if state.config.webhooks.enabled && qualify::mentions_blueprint(&full_response) {
        let payload = serde_json::json!({
            "event": webhook::EVENT_BLUEPRINT_GENERATED,
            "conversation_id": conversation_id,
            "session_id": session_id,
            "response": full_response,
            "timestamp": timestamp.to_rfc3339(),
        });
        webhook::notify_event(
            &state.storage,
            &state.http,
            webhook::EVENT_BLUEPRINT_GENERATED,
            &payload,
        )
        .await;
    }
}

/// `GET /api/v1/conversations/{id}/messages` — ordered history.
async fn list_conversation_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    state.storage.get_conversation(id).await?;
    let messages = state.storage.list_messages(id).await?;
    Ok(Json(messages.into_iter().map(to_message_response).collect()))
}
