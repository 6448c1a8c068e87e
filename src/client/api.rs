/**
 * Board HTTP Client
 *
 * A reqwest client for the board API and the realtime stream. Every JSON
 * endpoint answers with the `ApiResponse` envelope; a failed envelope comes
 * back as `ClientError::Api` carrying the server's error code and
 * retriable flag.
 *
 * The realtime stream is parsed from the raw SSE body: `event:` gives the
 * event name, `data:` lines the JSON payload, and lines starting with `:`
 * (keep-alive comments) are skipped.
 */

use crate::client::board_view::BoardView;
use crate::client::retry::{Retriable, RetryPolicy};
use crate::shared::config::{ClientConfig, ConfigError};
use crate::shared::error::SharedError;
use crate::shared::event::{PresenceUser, ServerEvent};
use crate::shared::model::{
    ApiResponse, Board, BoardData, BoardList, BoardSnapshot, Card, CardData, CardPatch, ErrorCode,
    MoveCardRequest, NewBoard, NewCard,
};
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::VecDeque;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a failure envelope
    #[error("{message} ({status})")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
        retriable: bool,
    },

    #[error("invalid data: {0}")]
    Decode(#[from] SharedError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_contended(&self) -> bool {
        self.code() == Some(ErrorCode::Contended)
    }
}

impl Retriable for ClientError {
    fn is_retriable(&self) -> bool {
        matches!(self, ClientError::Api { retriable: true, .. })
    }
}

/// One dispatched SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE parser; bytes may arrive split anywhere
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk, returning every frame it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.data.is_empty() {
                self.event = None;
                return None;
            }
            return Some(SseFrame {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

/// Stream of decoded server events
pub type EventStream = BoxStream<'static, Result<ServerEvent, ClientError>>;

#[derive(Debug, Clone)]
pub struct BoardClient {
    config: ClientConfig,
    http: Client,
    retry: RetryPolicy,
}

impl BoardClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = Client::builder().build()?;
        Ok(Self {
            retry: RetryPolicy::from_config(&config),
            config,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.config.url(path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = builder.timeout(self.config.request_timeout).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes).map_err(|e| {
            SharedError::serialization(format!("status {}: {}", status.as_u16(), e))
        })?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: envelope.code,
                message: envelope
                    .error
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
                retriable: envelope.retriable,
            });
        }
        Ok(envelope)
    }

    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        self.envelope(builder)
            .await?
            .data
            .ok_or_else(|| SharedError::serialization("response has no data").into())
    }

    async fn done(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.envelope::<serde_json::Value>(builder).await.map(|_| ())
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, ClientError> {
        let list: BoardList = self
            .data(self.request(reqwest::Method::GET, "/api/boards"))
            .await?;
        Ok(list.boards)
    }

    pub async fn create_board(&self, request: &NewBoard) -> Result<BoardSnapshot, ClientError> {
        let data: BoardData = self
            .data(self.request(reqwest::Method::POST, "/api/boards").json(request))
            .await?;
        Ok(data.board)
    }

    /// Full board snapshot, the refresh path after a failed move
    pub async fn get_board(&self, board_id: Uuid) -> Result<BoardSnapshot, ClientError> {
        let path = format!("/api/boards/{}", board_id);
        let data: BoardData = self.data(self.request(reqwest::Method::GET, &path)).await?;
        Ok(data.board)
    }

    pub async fn create_card(&self, request: &NewCard) -> Result<Card, ClientError> {
        let data: CardData = self
            .data(self.request(reqwest::Method::POST, "/api/cards").json(request))
            .await?;
        Ok(data.card)
    }

    pub async fn update_card(&self, card_id: Uuid, patch: &CardPatch) -> Result<Card, ClientError> {
        let path = format!("/api/cards/{}", card_id);
        let data: CardData = self
            .data(self.request(reqwest::Method::PUT, &path).json(patch))
            .await?;
        Ok(data.card)
    }

    pub async fn delete_card(&self, card_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/api/cards/{}", card_id);
        self.done(self.request(reqwest::Method::DELETE, &path)).await
    }

    /// One move attempt. The response message tells whether anything changed.
    pub async fn move_card(&self, request: MoveCardRequest) -> Result<MoveResult, ClientError> {
        let envelope: ApiResponse<CardData> = self
            .envelope(
                self.request(reqwest::Method::POST, "/api/cards/move")
                    .json(&request),
            )
            .await?;
        let changed = envelope.message.as_deref() != Some(UNCHANGED_MESSAGE);
        let card = envelope
            .data
            .ok_or_else(|| SharedError::serialization("response has no data"))?
            .card;
        Ok(MoveResult { card, changed })
    }

    /// Move with bounded retries on contention
    pub async fn move_with_retry(&self, request: MoveCardRequest) -> Result<MoveResult, ClientError> {
        self.retry.run(|| self.move_card(request.clone())).await
    }

    /// Apply a move to `view` optimistically, then settle it against the server
    ///
    /// On failure the guess is rolled back and the board is refetched; the
    /// original error is returned either way.
    pub async fn move_optimistically(
        &self,
        view: &mut BoardView,
        request: MoveCardRequest,
    ) -> Result<MoveResult, ClientError> {
        let intent = request.validate()?;
        if let Err(e) = view.apply_optimistic_move(intent) {
            tracing::debug!("Local move of {} not applied: {}", intent.card_id, e);
        }
        match self.move_with_retry(request).await {
            Ok(result) => {
                view.confirm_move(intent.card_id, result.changed);
                Ok(result)
            }
            Err(e) => {
                tracing::info!("Move of {} rejected: {}", intent.card_id, e);
                view.rollback_move(intent.card_id);
                match self.get_board(view.board_id()).await {
                    Ok(snapshot) => view.replace(snapshot),
                    Err(refresh) => tracing::warn!("Board refresh failed: {}", refresh),
                }
                Err(e)
            }
        }
    }

    pub async fn join_board(
        &self,
        connection_id: Uuid,
        board_id: Uuid,
    ) -> Result<Vec<PresenceUser>, ClientError> {
        let path = format!("/api/realtime/{}/join", connection_id);
        self.data(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "boardId": board_id })),
        )
        .await
    }

    pub async fn leave_board(&self, connection_id: Uuid, board_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/api/realtime/{}/leave", connection_id);
        self.done(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "boardId": board_id })),
        )
        .await
    }

    pub async fn typing(
        &self,
        connection_id: Uuid,
        board_id: Uuid,
        card_id: Option<Uuid>,
        is_typing: bool,
    ) -> Result<(), ClientError> {
        let path = format!("/api/realtime/{}/typing", connection_id);
        self.done(self.request(reqwest::Method::POST, &path).json(&json!({
            "boardId": board_id,
            "cardId": card_id,
            "isTyping": is_typing,
        })))
        .await
    }

    pub async fn ping(&self, connection_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/api/realtime/{}/ping", connection_id);
        self.done(self.request(reqwest::Method::POST, &path)).await
    }

    /// Open the realtime stream. The first item is the `connected` event.
    pub async fn subscribe(&self) -> Result<EventStream, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/api/realtime")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: None,
                message: format!("realtime stream refused: {}", status),
                retriable: false,
            });
        }

        let bytes = response.bytes_stream().boxed();
        let stream = futures_util::stream::unfold(
            (bytes, SseParser::default(), VecDeque::new()),
            |(mut bytes, mut parser, mut queue): (_, SseParser, VecDeque<SseFrame>)| async move {
                loop {
                    if let Some(frame) = queue.pop_front() {
                        let event = ServerEvent::from_sse(&frame.event, &frame.data)
                            .map_err(ClientError::Decode);
                        return Some((event, (bytes, parser, queue)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => queue.extend(parser.feed(&chunk)),
                        Some(Err(e)) => return Some((Err(ClientError::Http(e)), (bytes, parser, queue))),
                        None => return None,
                    }
                }
            },
        );
        Ok(stream.boxed())
    }
}

const UNCHANGED_MESSAGE: &str = "Card already at requested position";

/// Outcome of a move request
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub card: Card,
    pub changed: bool,
}
