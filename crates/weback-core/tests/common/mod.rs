// In-memory stream transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::StreamExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use url::Url;
use weback_api::stream::{Connector, Frame, Link, StreamTarget};
use weback_api::{Error, Session};

#[derive(Clone, Copy)]
pub enum Plan {
    Refuse,
    /// Handshake rejected because the token expired.
    Expire,
    Accept,
}

/// Far end of an accepted link: push frames in, read what was sent.
pub struct Remote {
    pub inbound: mpsc::UnboundedSender<Result<Frame, Error>>,
    pub sent: mpsc::UnboundedReceiver<String>,
}

impl Remote {
    pub fn push(&self, value: &Value) {
        self.inbound.send(Ok(Frame::Text(value.to_string()))).unwrap();
    }

    pub async fn next_sent(&mut self) -> Value {
        let text = tokio::time::timeout(std::time::Duration::from_secs(5), self.sent.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

pub struct FakeConnector {
    plan: Mutex<VecDeque<Plan>>,
    pub opens: AtomicUsize,
    remotes: mpsc::UnboundedSender<Remote>,
}

impl FakeConnector {
    pub fn new(plan: &[Plan]) -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
        let (remotes, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            plan: Mutex::new(plan.iter().copied().collect()),
            opens: AtomicUsize::new(0),
            remotes,
        });
        (connector, rx)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn open(&self, _target: StreamTarget) -> BoxFuture<'static, Result<Link, Error>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let plan = self.plan.lock().unwrap().pop_front().unwrap_or(Plan::Accept);
        match plan {
            Plan::Refuse => return future::ready(Err(Error::StreamConnect("refused".into()))).boxed(),
            Plan::Expire => return future::ready(Err(Error::SessionExpired)).boxed(),
            Plan::Accept => {}
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel::<String>();
        let _ = self.remotes.send(Remote {
            inbound: inbound_tx,
            sent: sent_rx,
        });

        let frames = futures_util::stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })
        .boxed();
        let sink = futures_util::sink::unfold(sent_tx, |tx, text: String| async move {
            tx.send(text).map_err(|_| Error::Send {
                message: "remote gone".into(),
            })?;
            Ok::<_, Error>(tx)
        });

        future::ready(Ok(Link {
            sink: Box::pin(sink),
            frames,
        }))
        .boxed()
    }
}

pub fn session(api_base: &str) -> Session {
    Session {
        token: SecretString::from("jwt-abc".to_string()),
        region_name: "eu-central-1".into(),
        api_url: Url::parse(&format!("{api_base}/prod/api")).unwrap(),
        stream_url: Url::parse("wss://stream.example.com/ws").unwrap(),
    }
}

pub fn status_push(thing_name: Option<&str>, status: Value) -> Value {
    let mut push = json!({
        "notify_info": "thing_status_update",
        "thing_status": status,
    });
    if let Some(name) = thing_name {
        push["thing_name"] = Value::from(name);
    }
    push
}
