use futures::{SinkExt, StreamExt, TryStreamExt};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    net::TcpStream,
    time::{timeout, Duration},
};
use tokio_tungstenite::{
    tungstenite::{
        error::Error as TungsteniteError,
        protocol::{CloseFrame, WebSocketConfig as Config},
        Message,
    },
    MaybeTlsStream,
    WebSocketStream,
};
use tracing::instrument;
use url::Url;

/// Monotonic wire-byte counters for one logical connection.
///
/// Counted over websocket payload bytes: the figure a payload-level
/// tap of the connection would report.
#[derive(Debug, Default)]
pub struct WireCounters {
    /// Payload bytes received.
    pub bytes_in: AtomicU64,
    /// Payload bytes sent.
    pub bytes_out: AtomicU64,
}

/// One inbound websocket message of interest to the protocol layers.
#[derive(Debug)]
pub(crate) enum WsItem {
    /// A JSON text message.
    Text(String),
    /// A binary message; a compressed-transport fragment.
    Binary(Vec<u8>),
}

pub(crate) struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    counters: Arc<WireCounters>,
}

impl WsStream {
    #[instrument(skip(counters))]
    pub(crate) async fn connect(url: Url, counters: Arc<WireCounters>) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async_with_config(
            url.as_str(),
            Some(Config {
                max_message_size: None,
                max_frame_size: None,
                ..Default::default()
            }),
            true,
        )
        .await?;

        Ok(Self {
            inner: stream,
            counters,
        })
    }

    /// Receives the next message, giving up after a short poll interval.
    pub(crate) async fn recv(&mut self) -> Result<Option<WsItem>> {
        const TIMEOUT: Duration = Duration::from_millis(500);

        let ws_message = match timeout(TIMEOUT, self.inner.next()).await {
            Ok(Some(Ok(v))) => Some(v),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) | Err(_) => None,
        };

        self.convert(ws_message)
    }

    /// Receives the next message, waiting as long as the socket lives.
    pub(crate) async fn recv_no_timeout(&mut self) -> Result<Option<WsItem>> {
        let msg = self.inner.try_next().await?;
        self.convert(msg)
    }

    /// Sends one text frame.
    pub(crate) async fn send_text(&mut self, payload: String) -> Result<()> {
        self.counters
            .bytes_out
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        self.inner.send(Message::Text(payload)).await?;
        Ok(())
    }

    /// Closes the connection, flushing a close frame if possible.
    pub(crate) async fn close(&mut self) {
        drop(self.inner.close(None).await);
    }

    fn convert(&self, message: Option<Message>) -> Result<Option<WsItem>> {
        Ok(match message {
            Some(Message::Text(payload)) => {
                self.counters
                    .bytes_in
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                Some(WsItem::Text(payload))
            },
            Some(Message::Binary(bytes)) => {
                self.counters
                    .bytes_in
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Some(WsItem::Binary(bytes))
            },
            Some(Message::Close(frame)) => {
                return Err(Error::Closed(frame));
            },
            // Ping/Pong behaviour is internally handled by tungstenite.
            _ => None,
        })
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub(crate) enum Error {
    Ws(TungsteniteError),

    /// The server closed the connection; the frame carries the close code
    /// which drives the reconnect decision.
    Closed(Option<CloseFrame<'static>>),
}

impl Error {
    /// The close code sent by the server, if this was an orderly close.
    pub(crate) fn close_code(&self) -> Option<u16> {
        match self {
            Error::Closed(Some(frame)) => Some(frame.code.into()),
            _ => None,
        }
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Error {
        Error::Ws(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Ws(e) => write!(f, "websocket error: {e}"),
            Error::Closed(Some(frame)) => write!(f, "websocket closed: {}", frame.code),
            Error::Closed(None) => write!(f, "websocket closed"),
        }
    }
}

impl std::error::Error for Error {}
