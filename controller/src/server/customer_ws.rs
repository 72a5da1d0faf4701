//! Customer WebSocket.
//!
//! Clients send single-letter commands with an optional argument:
//!
//! | In | Meaning |
//! |----|---------|
//! | `i<id>` | rejoin an existing session |
//! | `r<n>` | join retailer `n`'s queue |
//! | `j` | show my position on the dashboard |
//! | `o<n>` | order size `n` |
//! | `e` / `d` | disable / enable joins |
//!
//! The server answers with `i<id>`, `o`, `w`, `s`, `f` or `c`. Anything that
//! does not parse is ignored and the connection stays open.

use crate::customer::ClientSender;
use crate::state::Controller;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One parsed client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `i<id>`
    Rejoin(&'a str),
    /// `r<n>`
    Join(usize),
    /// `j`
    Jump,
    /// `o<n>`
    Order(usize),
    /// `e`
    Disable,
    /// `d`
    Enable,
}

impl<'a> Command<'a> {
    /// Parse one text frame. `None` for empty, unknown or malformed input.
    #[must_use]
    pub fn parse(text: &'a str) -> Option<Self> {
        let mut chars = text.chars();
        let head = chars.next()?;
        let arg = chars.as_str();
        match head {
            'i' if !arg.is_empty() => Some(Self::Rejoin(arg)),
            'r' => arg.parse().ok().map(Self::Join),
            'j' => Some(Self::Jump),
            'o' => arg.parse().ok().map(Self::Order),
            'e' => Some(Self::Disable),
            'd' => Some(Self::Enable),
            _ => None,
        }
    }
}

/// Upgrade to a customer session.
pub async fn handle(ws: WebSocketUpgrade, State(controller): State<Controller>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, controller))
}

async fn serve(socket: WebSocket, controller: Controller) {
    let (mut sink, mut stream) = socket.split();
    let (client, mut outgoing) = mpsc::unbounded_channel::<String>();

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outgoing.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(controller, client);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => session.handle(&text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // The customer keeps a sender clone, so the send side only ends on a
    // socket error.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("Customer connection closed");
}

/// Per-connection protocol state.
#[derive(Debug)]
pub struct Session {
    controller: Controller,
    client: ClientSender,
    customer: Option<String>,
}

impl Session {
    /// Start a session bound to `client`.
    #[must_use]
    pub const fn new(controller: Controller, client: ClientSender) -> Self {
        Self {
            controller,
            client,
            customer: None,
        }
    }

    /// The customer this connection speaks for, if any.
    #[must_use]
    pub fn customer(&self) -> Option<&str> {
        self.customer.as_deref()
    }

    /// Apply one text frame.
    pub async fn handle(&mut self, text: &str) {
        let Some(command) = Command::parse(text) else {
            debug!(input = %text, "Ignoring customer input");
            return;
        };

        match command {
            Command::Rejoin(id) => {
                if self.controller.rejoin(id, self.client.clone()).await {
                    self.customer = Some(id.to_string());
                } else {
                    let _ = self.client.send("s".to_string());
                }
            }
            Command::Join(index) => {
                if let Some(id) = self
                    .controller
                    .join(index, self.client.clone(), self.customer.as_deref())
                    .await
                {
                    self.customer = Some(id);
                }
            }
            Command::Jump => {
                if let Some(id) = &self.customer {
                    self.controller.jump(id).await;
                }
            }
            Command::Order(size) => {
                if let Some(id) = &self.customer {
                    self.controller.submit_order(id, size).await;
                }
            }
            Command::Disable => {
                info!("Customer joins disabled by client");
                self.controller.set_disabled(true).await;
            }
            Command::Enable => {
                info!("Customer joins enabled by client");
                self.controller.set_disabled(false).await;
            }
        }
    }
}
