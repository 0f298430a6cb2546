// Stream transport seam
//
// `StreamSession` only needs something that turns a `StreamTarget` into a
// text sink plus a frame stream. `WsConnector` does that over a real
// WebSocket; tests plug in an in-memory connector.

use std::pin::Pin;

use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Sink, SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::auth::Session;
use crate::error::Error;

/// Fixed `Authorization` header the stream endpoint expects.
pub const BASIC_AUTHORIZATION: &str = "Basic KG51bGwpOihudWxsKQ==";

/// Close code reported when the transport fails without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported for a close frame without a payload.
const NO_STATUS: u16 = 1005;

/// Where and how to open the stream.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub url: Url,
    pub token: SecretString,
    pub region: String,
}

impl StreamTarget {
    pub fn from_session(session: &Session) -> Self {
        Self {
            url: session.stream_url.clone(),
            token: session.token.clone(),
            region: session.region_name.clone(),
        }
    }

    /// Handshake headers: fixed authorization, region, token, keep-alive.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", BASIC_AUTHORIZATION.to_owned()),
            ("region", self.region.clone()),
            ("token", self.token.expose_secret().to_owned()),
            ("Connection", "keep-alive, Upgrade".to_owned()),
        ]
    }
}

/// An inbound frame, already stripped of transport noise (pings etc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: String },
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;
pub type FrameStream = BoxStream<'static, Result<Frame, Error>>;

/// An open connection: outbound text sink + inbound frames.
pub struct Link {
    pub sink: FrameSink,
    pub frames: FrameStream,
}

/// Opens stream connections.
///
/// The returned future resolves once the transport is open; it may also
/// never resolve, which `StreamSession` bounds with its connect wait.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, target: StreamTarget) -> BoxFuture<'static, Result<Link, Error>>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, target: StreamTarget) -> BoxFuture<'static, Result<Link, Error>> {
        open_websocket(target).boxed()
    }
}

async fn open_websocket(target: StreamTarget) -> Result<Link, Error> {
    tracing::info!(url = %target.url, "Connecting to stream");

    let uri: tungstenite::http::Uri = target
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::StreamConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    for (name, value) in target.headers() {
        request = request.with_header(name, value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(handshake_error)?;

    tracing::info!("Stream transport connected");

    let (write, read) = ws_stream.split();

    let sink = write
        .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(tungstenite::Message::text(text))))
        .sink_map_err(|e| Error::send(e.to_string()));

    let frames = read.filter_map(|msg| future::ready(to_frame(msg)));

    Ok(Link {
        sink: Box::pin(sink),
        frames: frames.boxed(),
    })
}

/// A rejected handshake (401/403) means the token is no longer valid.
fn handshake_error(err: tungstenite::Error) -> Error {
    if let tungstenite::Error::Http(ref response) = err {
        let status = response.status();
        if status == tungstenite::http::StatusCode::UNAUTHORIZED
            || status == tungstenite::http::StatusCode::FORBIDDEN
        {
            return Error::SessionExpired;
        }
    }
    Error::StreamConnect(err.to_string())
}

fn to_frame(msg: Result<tungstenite::Message, tungstenite::Error>) -> Option<Result<Frame, Error>> {
    match msg {
        Ok(tungstenite::Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(tungstenite::Message::Close(frame)) => Some(Ok(match frame {
            Some(cf) => Frame::Close {
                code: u16::from(cf.code),
                reason: cf.reason.as_str().to_owned(),
            },
            None => Frame::Close {
                code: NO_STATUS,
                reason: String::new(),
            },
        })),
        // tungstenite answers pings itself; binary frames are not part of the protocol
        Ok(_) => None,
        Err(e) => Some(Err(Error::StreamClosed {
            code: ABNORMAL_CLOSURE,
            reason: e.to_string(),
        })),
    }
}
