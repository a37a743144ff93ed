//! [`Connection`] implementation over `tokio-tungstenite`.
//!
//! Wraps an already-upgraded [`WebSocketStream`]. Dialing, proxies and
//! handshakes stay with the caller; see [`crate::DialOptions`] for the
//! settings a dialer is expected to honour.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        Error as WsError,
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::{
    connection::{Connection, FrameReader, FrameWriter, PongHandler},
    error::ConnectionError,
    frame::{CloseReason, Frame, PayloadKind},
};

/// A WebSocket carrying peer frames.
pub struct WebSocketConnection<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketConnection<S> {
    /// Wrap an established WebSocket stream.
    pub fn new(stream: WebSocketStream<S>) -> Self { Self { stream } }
}

impl<S> From<WebSocketStream<S>> for WebSocketConnection<S> {
    fn from(stream: WebSocketStream<S>) -> Self { Self::new(stream) }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WebSocketReader<S>;
    type Writer = WebSocketWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.stream.split();
        (
            WebSocketReader {
                stream,
                on_pong: None,
            },
            WebSocketWriter { sink },
        )
    }
}

/// Reading half of a [`WebSocketConnection`].
pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    on_pong: Option<PongHandler>,
}

#[async_trait]
impl<S> FrameReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, ConnectionError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(map_error(e)),
                None => return Err(ConnectionError::Closed),
            };
            match message {
                Message::Text(text) => {
                    return Ok(Frame::text(Bytes::copy_from_slice(text.as_bytes())));
                }
                Message::Binary(data) => return Ok(Frame::binary(data)),
                Message::Close(frame) => {
                    return Ok(Frame::Close(frame.map(|frame| CloseReason {
                        code: frame.code.into(),
                        reason: frame.reason.as_str().to_owned(),
                    })));
                }
                Message::Pong(payload) => {
                    if let Some(handler) = &self.on_pong {
                        handler(&payload);
                    }
                }
                // Pings are answered by tungstenite itself.
                Message::Ping(_) | Message::Frame(_) => {}
            }
        }
    }

    fn set_pong_handler(&mut self, handler: PongHandler) { self.on_pong = Some(handler); }
}

/// Writing half of a [`WebSocketConnection`].
pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let message = match frame {
            Frame::Data {
                kind: PayloadKind::Text,
                payload,
            } => {
                let text = String::from_utf8(payload.to_vec()).map_err(ConnectionError::transport)?;
                Message::text(text)
            }
            Frame::Data {
                kind: PayloadKind::Binary,
                payload,
            } => Message::binary(payload),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close(reason) => Message::Close(reason.map(|reason| CloseFrame {
                code: CloseCode::from(reason.code),
                reason: reason.reason.into(),
            })),
        };
        self.sink.send(message).await.map_err(map_error)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_error(e)),
        }
    }
}

fn map_error(error: WsError) -> ConnectionError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
        WsError::Io(e) => ConnectionError::Io(e),
        other => ConnectionError::transport(other),
    }
}
