//! TCP client for talking to a DineWheel server

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dinewheel_core::{RoomCode, RoomEvent};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Client handle. Requests are answered in order; room events arrive on a
/// separate queue read with [`Client::next_event`].
pub struct Client {
    writer: WriteHalf<TcpStream>,
    responses: mpsc::Receiver<Response>,
    events: mpsc::Receiver<(RoomCode, RoomEvent)>,
    reader: JoinHandle<()>,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let (response_tx, responses) = mpsc::channel(64);
        let (event_tx, events) = mpsc::channel(256);
        let reader = tokio::spawn(reader_task(reader, response_tx, event_tx));

        Ok(Client {
            writer,
            responses,
            events,
            reader,
        })
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        write_frame(&mut self.writer, request).await?;
        self.responses.recv().await.ok_or(Error::ConnectionClosed)
    }

    /// Next event pushed for the bound room, `None` once disconnected
    pub async fn next_event(&mut self) -> Option<(RoomCode, RoomEvent)> {
        self.events.recv().await
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.request(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(Error::Protocol(format!("Expected Pong, got {:?}", other))),
        }
    }

    pub fn disconnect(self) {
        self.reader.abort();
        debug!("Disconnected from server");
    }
}

/// Split incoming frames into responses and events
async fn reader_task(
    mut reader: ReadHalf<TcpStream>,
    responses: mpsc::Sender<Response>,
    events: mpsc::Sender<(RoomCode, RoomEvent)>,
) {
    loop {
        match read_frame::<Response, _>(&mut reader).await {
            Ok(Response::Event { code, event }) => {
                if events.send((code, event)).await.is_err() {
                    break;
                }
            }
            Ok(response) => {
                if responses.send(response).await.is_err() {
                    break;
                }
            }
            Err(Error::ConnectionClosed) => {
                debug!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Read error");
                break;
            }
        }
    }
}
