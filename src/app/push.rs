//! Push channel: STOMP 1.2 carried in WebSocket text messages, demultiplexed
//! into one inbound queue per dashboard topic.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use super::error::PushError;
use super::types::Topic;

/// Raw WebSocket transport of the server's SockJS endpoint at `/ws`.
pub const ENDPOINT_PATH: &str = "/ws/websocket";

/// Upper bound for one buffered frame, headers included.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

type PushSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket endpoint of the push channel served next to the pages at `server`.
pub fn endpoint_for(server: &Url) -> Option<Url> {
    let mut url = server.join(ENDPOINT_PATH).ok()?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).ok()?;
    Some(url)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[cfg(test)]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Repeated headers resolve to their first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn encode(&self) -> Vec<u8> {
        let escape = escapes_headers(&self.command);
        let mut out = Vec::with_capacity(self.command.len() + self.body.len() + 64);
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

// CONNECT and CONNECTED frames carry their headers verbatim.
fn escapes_headers(command: &str) -> bool {
    !matches!(command, "CONNECT" | "CONNECTED")
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, PushError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(PushError::Frame(format!("unknown header escape \\{other}")));
            }
            None => return Err(PushError::Frame("dangling header escape".to_string())),
        }
    }
    Ok(out)
}

/// Incremental frame decoder. Feed it raw bytes with [`FrameDecoder::extend`]
/// and pull complete frames with [`FrameDecoder::next_frame`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, PushError> {
        self.skip_heartbeats();
        if self.buf.is_empty() {
            return Ok(None);
        }

        let mut pos = 0usize;
        let mut lines = Vec::new();
        loop {
            let Some(newline) = self.buf[pos..].iter().position(|b| *b == b'\n') else {
                return self.incomplete();
            };
            let mut line = &self.buf[pos..pos + newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            pos += newline + 1;
            if line.is_empty() {
                break;
            }
            let line = std::str::from_utf8(line)
                .map_err(|_| PushError::Frame("frame header is not UTF-8".to_string()))?;
            lines.push(line.to_string());
        }

        let mut lines = lines.into_iter();
        let command = lines
            .next()
            .ok_or_else(|| PushError::Frame("frame without command".to_string()))?;
        let escape = escapes_headers(&command);
        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| PushError::Frame(format!("header without colon: {line}")))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(name, _)| name == "content-length")
            .map(|(_, value)| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| PushError::Frame(format!("invalid content-length: {value}")))
            })
            .transpose()?;

        let (body_end, consumed) = match content_length {
            Some(len) => {
                let end = pos
                    .checked_add(len)
                    .filter(|end| *end < MAX_FRAME_BYTES)
                    .ok_or_else(|| {
                        PushError::Frame(format!("content-length {len} exceeds frame limit"))
                    })?;
                if self.buf.len() <= end {
                    return Ok(None);
                }
                if self.buf[end] != 0 {
                    return Err(PushError::Frame(
                        "body longer than content-length".to_string(),
                    ));
                }
                (end, end + 1)
            }
            None => {
                let Some(nul) = self.buf[pos..].iter().position(|b| *b == 0) else {
                    return self.incomplete();
                };
                (pos + nul, pos + nul + 1)
            }
        };

        let body = self.buf[pos..body_end].to_vec();
        self.buf.drain(..consumed);
        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }

    fn incomplete(&self) -> Result<Option<Frame>, PushError> {
        if self.buf.len() > MAX_FRAME_BYTES {
            return Err(PushError::Frame(format!(
                "unterminated frame over {MAX_FRAME_BYTES} bytes"
            )));
        }
        Ok(None)
    }

    fn skip_heartbeats(&mut self) {
        let mut skip = 0;
        while skip < self.buf.len() {
            match self.buf[skip] {
                b'\n' => skip += 1,
                b'\r' if self.buf.get(skip + 1) == Some(&b'\n') => skip += 2,
                _ => break,
            }
        }
        self.buf.drain(..skip);
    }
}

/// Inbound side of the push channel: one ordered queue per topic.
#[derive(Debug)]
pub struct PushSubscriptions {
    barrels: UnboundedReceiver<String>,
    searches: UnboundedReceiver<String>,
}

#[derive(Debug, Clone)]
pub struct TopicSenders {
    barrels: UnboundedSender<String>,
    searches: UnboundedSender<String>,
}

impl PushSubscriptions {
    pub fn channel() -> (Self, TopicSenders) {
        let (barrels_tx, barrels_rx) = mpsc::unbounded_channel();
        let (searches_tx, searches_rx) = mpsc::unbounded_channel();
        (
            Self {
                barrels: barrels_rx,
                searches: searches_rx,
            },
            TopicSenders {
                barrels: barrels_tx,
                searches: searches_tx,
            },
        )
    }

    pub fn try_recv(&mut self, topic: Topic) -> Option<String> {
        match topic {
            Topic::BarrelUpdates => self.barrels.try_recv().ok(),
            Topic::SearchUpdates => self.searches.try_recv().ok(),
        }
    }

    /// Waits for the next message on either topic. `None` once both queues
    /// are closed and empty.
    pub async fn recv_any(&mut self) -> Option<(Topic, String)> {
        tokio::select! {
            Some(body) = self.barrels.recv() => Some((Topic::BarrelUpdates, body)),
            Some(body) = self.searches.recv() => Some((Topic::SearchUpdates, body)),
            else => None,
        }
    }
}

impl TopicSenders {
    pub fn send(&self, topic: Topic, body: String) -> Result<(), SendError<String>> {
        match topic {
            Topic::BarrelUpdates => self.barrels.send(body),
            Topic::SearchUpdates => self.searches.send(body),
        }
    }
}

/// Aborts the background push session when the admin view is dropped.
#[derive(Debug)]
pub struct AbortTaskOnDrop(pub AbortHandle);

impl Drop for AbortTaskOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn broker_error(frame: &Frame) -> PushError {
    let message = frame
        .get("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body_text());
    PushError::Broker(message)
}

/// A subscribed STOMP session. Created by [`PushSession::connect`], consumed
/// by [`PushSession::run`].
pub struct PushSession {
    socket: PushSocket,
    decoder: FrameDecoder,
}

impl PushSession {
    /// Opens the WebSocket, performs the STOMP handshake and subscribes to
    /// every dashboard topic.
    pub async fn connect(endpoint: &Url) -> Result<Self, PushError> {
        let (socket, _) = connect_async(endpoint.as_str()).await?;
        let mut session = Self {
            socket,
            decoder: FrameDecoder::default(),
        };

        let host = endpoint.host_str().unwrap_or("localhost");
        session
            .send(
                &Frame::new("CONNECT")
                    .header("accept-version", "1.2")
                    .header("host", host)
                    .header("heart-beat", "0,0"),
            )
            .await?;
        let reply = session.read_frame().await?;
        match reply.command.as_str() {
            "CONNECTED" => {}
            "ERROR" => return Err(broker_error(&reply)),
            other => {
                return Err(PushError::Frame(format!("expected CONNECTED, got {other}")));
            }
        }

        for (idx, topic) in Topic::ALL.into_iter().enumerate() {
            session
                .send(
                    &Frame::new("SUBSCRIBE")
                        .header("id", format!("sub-{idx}"))
                        .header("destination", topic.destination())
                        .header("ack", "auto"),
                )
                .await?;
        }
        info!(%endpoint, "push channel subscribed");
        Ok(session)
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), PushError> {
        let text = String::from_utf8_lossy(&frame.encode()).into_owned();
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, PushError> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => self.decoder.extend(text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => self.decoder.extend(&bytes),
                Some(Ok(Message::Close(_))) | None => return Err(PushError::Closed),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    /// Routes every topic message into `senders` until the connection ends.
    /// There is no reconnection. `Ok` means the receiving side went away
    /// first.
    pub async fn run(mut self, senders: TopicSenders) -> Result<(), PushError> {
        loop {
            let frame = self.read_frame().await?;
            match frame.command.as_str() {
                "MESSAGE" => {
                    let destination = frame.get("destination").unwrap_or_default();
                    let Some(topic) = Topic::from_destination(destination) else {
                        warn!(destination, "message for unknown destination dropped");
                        continue;
                    };
                    debug!(%topic, bytes = frame.body.len(), "push message");
                    if senders.send(topic, frame.body_text()).is_err() {
                        let _ = self.socket.close(None).await;
                        return Ok(());
                    }
                }
                "ERROR" => return Err(broker_error(&frame)),
                other => debug!(command = other, "ignoring frame"),
            }
        }
    }
}

pub async fn run_push_session(endpoint: &Url, senders: TopicSenders) -> Result<(), PushError> {
    PushSession::connect(endpoint).await?.run(senders).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
    use axum::routing::get;
    use std::future::Future;
    use tokio::net::TcpListener;

    fn decode_all(bytes: &[u8]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::default();
        decoder.extend(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn decodes_message_frames_and_skips_heartbeats() {
        let frames = decode_all(
            b"\n\r\nMESSAGE\ndestination:/topic/barrelUpdates\n\n[]\0\nMESSAGE\r\ndestination:/topic/searchUpdates\r\n\r\n[1]\0",
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, "MESSAGE");
        assert_eq!(frames[0].get("destination"), Some("/topic/barrelUpdates"));
        assert_eq!(frames[0].body_text(), "[]");
        assert_eq!(frames[1].body_text(), "[1]");
    }

    #[test]
    fn waits_for_complete_frames() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\ndestination:/topic/");
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.extend(b"searchUpdates\n\n[{\"name\"");
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.extend(b":\"a\",\"count\":1}]\0");
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.body_text(), r#"[{"name":"a","count":1}]"#);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let frames = decode_all(b"MESSAGE\ncontent-length:3\n\na\0b\0");
        assert_eq!(frames[0].body, b"a\0b".to_vec());

        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\ncontent-length:1\n\nab\0");
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));
    }

    #[test]
    fn header_escapes_round_trip() {
        let frame = Frame::new("SEND")
            .header("note", "a:b\nc\\d")
            .with_body("x");
        let decoded = decode_all(&frame.encode());
        assert_eq!(decoded[0].get("note"), Some("a:b\nc\\d"));
        assert_eq!(decoded[0].get("content-length"), Some("1"));

        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\nbad:\\t\n\n\0");
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));
    }

    #[test]
    fn first_repeated_header_wins() {
        let frames = decode_all(b"MESSAGE\ndestination:/topic/a\ndestination:/topic/b\n\n\0");
        assert_eq!(frames[0].get("destination"), Some("/topic/a"));
    }

    #[test]
    fn rejects_overflowing_content_length() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\ncontent-length:18446744073709551615\n\nx\0");
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));

        let mut decoder = FrameDecoder::default();
        decoder.extend(format!("MESSAGE\ncontent-length:{MAX_FRAME_BYTES}\n\n").as_bytes());
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));
    }

    #[test]
    fn caps_unterminated_frames() {
        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\ndestination:/topic/searchUpdates\n\n");
        decoder.extend(&vec![b'a'; MAX_FRAME_BYTES / 2]);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.extend(&vec![b'a'; MAX_FRAME_BYTES / 2]);
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));

        let mut decoder = FrameDecoder::default();
        decoder.extend(b"MESSAGE\nx-long:");
        decoder.extend(&vec![b'h'; MAX_FRAME_BYTES]);
        assert!(matches!(decoder.next_frame(), Err(PushError::Frame(_))));
    }

    #[test]
    fn endpoint_follows_server_scheme() {
        let plain = endpoint_for(&Url::parse("http://localhost:8080/").unwrap()).unwrap();
        assert_eq!(plain.as_str(), "ws://localhost:8080/ws/websocket");
        let secure = endpoint_for(&Url::parse("https://googol.example/app/").unwrap()).unwrap();
        assert_eq!(secure.as_str(), "wss://googol.example/ws/websocket");
    }

    async fn serve_broker<F, Fut>(script: F) -> Url
    where
        F: FnOnce(WebSocket) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let app = Router::new().route(
            ENDPOINT_PATH,
            get(move |ws: WebSocketUpgrade| async move { ws.on_upgrade(script) }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        endpoint_for(&Url::parse(&format!("http://{addr}")).unwrap()).unwrap()
    }

    async fn recv_text(socket: &mut WebSocket) -> String {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => text.as_str().to_string(),
            other => panic!("expected a text message, got {other:?}"),
        }
    }

    async fn send_text(socket: &mut WebSocket, text: &str) {
        socket
            .send(WsMessage::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn session_routes_messages_per_topic() {
        let endpoint = serve_broker(|mut socket: WebSocket| async move {
            let connect = recv_text(&mut socket).await;
            assert!(connect.starts_with("CONNECT\naccept-version:1.2\nhost:127.0.0.1\n"));
            send_text(&mut socket, "CONNECTED\nversion:1.2\n\n\0").await;
            let subscribes = format!(
                "{}{}",
                recv_text(&mut socket).await,
                recv_text(&mut socket).await
            );
            assert!(subscribes.contains("destination:/topic/barrelUpdates"));
            assert!(subscribes.contains("destination:/topic/searchUpdates"));

            send_text(
                &mut socket,
                "MESSAGE\ndestination:/topic/barrelUpdates\n\n[{\"id\":\"b1\",\"time\":\"10:00\"}]\0\nMESSAGE\ndestination:/topic/other\n\nignored\0",
            )
            .await;
            send_text(&mut socket, "\n").await;
            send_text(&mut socket, "MESSAGE\ndestination:/topic/searchUpdates\n\n[{\"name\"").await;
            send_text(&mut socket, ":\"rust\",\"count\":2}]\0").await;
            let _ = socket.send(WsMessage::Close(None)).await;
        })
        .await;

        let (mut subscriptions, senders) = PushSubscriptions::channel();
        let result = run_push_session(&endpoint, senders).await;

        assert!(matches!(result, Err(PushError::Closed)), "{result:?}");
        assert_eq!(
            subscriptions.try_recv(Topic::BarrelUpdates).as_deref(),
            Some(r#"[{"id":"b1","time":"10:00"}]"#)
        );
        assert_eq!(
            subscriptions.try_recv(Topic::SearchUpdates).as_deref(),
            Some(r#"[{"name":"rust","count":2}]"#)
        );
        assert!(subscriptions.try_recv(Topic::BarrelUpdates).is_none());
        assert!(subscriptions.try_recv(Topic::SearchUpdates).is_none());
    }

    #[tokio::test]
    async fn broker_error_ends_session() {
        let endpoint = serve_broker(|mut socket: WebSocket| async move {
            recv_text(&mut socket).await;
            send_text(&mut socket, "ERROR\nmessage:bad login\n\n\0").await;
        })
        .await;

        let (_subscriptions, senders) = PushSubscriptions::channel();
        match run_push_session(&endpoint, senders).await {
            Err(PushError::Broker(message)) => assert_eq!(message, "bad login"),
            other => panic!("unexpected session result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = Url::parse(&format!("ws://{addr}{ENDPOINT_PATH}")).unwrap();
        assert!(matches!(
            PushSession::connect(&endpoint).await,
            Err(PushError::WebSocket(_))
        ));
    }

    #[tokio::test]
    async fn recv_any_ends_when_senders_drop() {
        let (mut subscriptions, senders) = PushSubscriptions::channel();
        senders.send(Topic::SearchUpdates, "[]".to_string()).unwrap();
        drop(senders);
        assert_eq!(
            subscriptions.recv_any().await,
            Some((Topic::SearchUpdates, "[]".to_string()))
        );
        assert_eq!(subscriptions.recv_any().await, None);
    }
}
