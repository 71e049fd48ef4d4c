//! TCP server hosting DineWheel rooms
//!
//! Each connection gets a writer task fed by an mpsc queue. Once a
//! connection creates or joins a room it is bound to that room and member,
//! and a forwarder task relays the room's events into the same queue.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dinewheel_core::{Error as CoreError, RoomCode, SessionManager, Storage};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::hub::RoomHub;
use crate::protocol::{Request, Response};

/// Outgoing frames queued per connection
const OUTBOUND_QUEUE: usize = 64;

/// Room and member a connection acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub code: RoomCode,
    pub member_id: String,
}

/// Connected peer as seen by the server
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub addr: SocketAddr,
    pub binding: Option<Binding>,
}

/// Server state shared across tasks
struct ServerState {
    peers: HashMap<Uuid, PeerInfo>,
    max_peers: usize,
}

/// Everything a connection handler needs
struct Context<S> {
    sessions: Arc<SessionManager<S>>,
    hub: Arc<RoomHub>,
    state: Arc<RwLock<ServerState>>,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            hub: self.hub.clone(),
            state: self.state.clone(),
        }
    }
}

/// Server handle
pub struct Server {
    addr: SocketAddr,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start accepting. Port 0 picks a free port.
    pub async fn start<S>(
        port: u16,
        sessions: Arc<SessionManager<S>>,
        hub: Arc<RoomHub>,
        max_peers: usize,
    ) -> Result<Self>
    where
        S: Storage + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, max_peers, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(RwLock::new(ServerState {
            peers: HashMap::new(),
            max_peers,
        }));

        let ctx = Context {
            sessions,
            hub,
            state: state.clone(),
        };
        tokio::spawn(accept_loop(listener, ctx, shutdown_tx.clone()));

        Ok(Server {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Currently connected peers
    pub async fn peers(&self) -> Vec<PeerInfo> {
        self.state.read().await.peers.values().cloned().collect()
    }

    /// Stop accepting and drop every connection
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop<S: Storage + 'static>(
    listener: TcpListener,
    ctx: Context<S>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            ctx.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Per-connection state owned by the read loop
struct Connection {
    id: Uuid,
    tx: mpsc::Sender<Response>,
    binding: Option<Binding>,
    forwarder: Option<JoinHandle<()>>,
}

impl Connection {
    fn bound(&self) -> std::result::Result<&Binding, CoreError> {
        self.binding
            .as_ref()
            .ok_or_else(|| CoreError::Validation("create or join a room first".into()))
    }
}

/// Handle a single client connection
async fn handle_connection<S: Storage + 'static>(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Context<S>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let id = match register_peer(&ctx.state, addr).await {
        Ok(id) => id,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Connection refused");
            let reject = Response::Error {
                reason: "server full".into(),
                kind: None,
            };
            let _ = write_frame(&mut writer, &reject).await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    let writer_handle = tokio::spawn(writer_task(writer, rx));
    let mut conn = Connection {
        id,
        tx,
        binding: None,
        forwarder: None,
    };

    info!(addr = %addr, peer = %id, "Peer connected");

    loop {
        tokio::select! {
            frame = read_frame::<Request, _>(&mut reader) => {
                match frame {
                    Ok(request) => {
                        let response = handle_request(request, &mut conn, &ctx).await;
                        if conn.tx.send(response).await.is_err() {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(peer = %id, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(peer = %id, error = %e, "Read error");
                        let _ = conn.tx.send(Response::Error { reason: e.to_string(), kind: None }).await;
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(peer = %id, "Closing connection for shutdown");
                break;
            }
        }
    }

    if let Some(forwarder) = conn.forwarder.take() {
        forwarder.abort();
    }
    drop(conn);
    let _ = writer_handle.await;
    ctx.state.write().await.peers.remove(&id);

    info!(peer = %id, "Peer disconnected");
}

async fn register_peer(state: &Arc<RwLock<ServerState>>, addr: SocketAddr) -> Result<Uuid> {
    let mut s = state.write().await;
    if s.peers.len() >= s.max_peers {
        return Err(Error::ServerFull);
    }
    let id = Uuid::new_v4();
    s.peers.insert(
        id,
        PeerInfo {
            addr,
            binding: None,
        },
    );
    Ok(id)
}

/// Writer task - sends queued frames to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Response>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Run a blocking session call off the async workers
async fn with_sessions<S, T, F>(ctx: &Context<S>, f: F) -> std::result::Result<T, CoreError>
where
    S: Storage + 'static,
    T: Send + 'static,
    F: FnOnce(&SessionManager<S>) -> std::result::Result<T, CoreError> + Send + 'static,
{
    let sessions = ctx.sessions.clone();
    match tokio::task::spawn_blocking(move || f(&sessions)).await {
        Ok(result) => result,
        Err(e) => Err(CoreError::Io(io::Error::other(e))),
    }
}

async fn handle_request<S: Storage + 'static>(
    request: Request,
    conn: &mut Connection,
    ctx: &Context<S>,
) -> Response {
    match request {
        Request::CreateRoom { name, preferences } => {
            let created = with_sessions(ctx, move |s| {
                let room = s.create_room(&name, preferences)?;
                let owner = room.members.owner().cloned();
                owner
                    .map(|member| (room.code, member))
                    .ok_or_else(|| CoreError::NotFound("room has no owner".into()))
            })
            .await;
            match created {
                Ok((code, member)) => {
                    bind(conn, ctx, code, &member.id).await;
                    Response::RoomCreated { code, member }
                }
                Err(e) => Response::error(&e),
            }
        }
        Request::JoinRoom {
            code,
            name,
            preferences,
            user_id,
        } => {
            let joined = with_sessions(ctx, move |s| {
                s.join_room(code, &name, preferences, user_id.as_deref())
            })
            .await;
            match joined {
                Ok(member) => {
                    bind(conn, ctx, code, &member.id).await;
                    Response::Joined { code, member }
                }
                Err(e) => Response::error(&e),
            }
        }
        Request::StartSpinning => {
            ack(bound_call(conn, ctx, |s, b| s.start_spinning(b.code)).await)
        }
        Request::Spin => {
            match bound_call(conn, ctx, |s, b| s.spin_for_member(b.code, &b.member_id)).await {
                Ok(spin) => Response::SpinResult {
                    success: true,
                    error: None,
                    spin: Some(spin),
                },
                Err(e) => Response::SpinResult {
                    success: false,
                    error: Some(e.to_string()),
                    spin: None,
                },
            }
        }
        Request::Reveal => match bound_call(conn, ctx, |s, b| s.reveal_options(b.code)).await {
            Ok(options) => Response::Revealed {
                success: true,
                error: None,
                options,
            },
            Err(e) => Response::Revealed {
                success: false,
                error: Some(e.to_string()),
                options: Vec::new(),
            },
        },
        Request::Vote { option_index } => ack(
            bound_call(conn, ctx, move |s, b| {
                s.vote(b.code, &b.member_id, option_index)
            })
            .await,
        ),
        Request::ConfirmVote => ack(
            bound_call(conn, ctx, |s, b| {
                s.confirm_vote(b.code, &b.member_id).map(|_| ())
            })
            .await,
        ),
        Request::StartNewRound => {
            ack(bound_call(conn, ctx, |s, b| s.start_new_round(b.code)).await)
        }
        Request::CloseRoom => {
            let closed = bound_call(conn, ctx, |s, b| s.close_room(b.code, &b.member_id)).await;
            if closed.is_ok() {
                unbind(conn, ctx).await;
            }
            ack(closed)
        }
        Request::Status { code } => {
            let code = match code.map(Ok).unwrap_or_else(|| conn.bound().map(|b| b.code)) {
                Ok(code) => code,
                Err(e) => return Response::error(&e),
            };
            match with_sessions(ctx, move |s| s.status(code)).await {
                Ok(status) => Response::Status { status },
                Err(e) => Response::error(&e),
            }
        }
        Request::Ping => Response::Pong,
    }
}

/// Run a session call as the connection's bound member
async fn bound_call<S, T, F>(
    conn: &Connection,
    ctx: &Context<S>,
    f: F,
) -> std::result::Result<T, CoreError>
where
    S: Storage + 'static,
    T: Send + 'static,
    F: FnOnce(&SessionManager<S>, &Binding) -> std::result::Result<T, CoreError> + Send + 'static,
{
    let binding = conn.bound()?.clone();
    with_sessions(ctx, move |s| f(s, &binding)).await
}

fn ack(result: std::result::Result<(), CoreError>) -> Response {
    match result {
        Ok(()) => Response::ok(),
        Err(e) => Response::failed(&e),
    }
}

/// Point the connection at a room and start relaying its events
async fn bind<S>(conn: &mut Connection, ctx: &Context<S>, code: RoomCode, member_id: &str) {
    if let Some(previous) = conn.forwarder.take() {
        previous.abort();
    }

    let binding = Binding {
        code,
        member_id: member_id.to_string(),
    };
    if let Some(peer) = ctx.state.write().await.peers.get_mut(&conn.id) {
        peer.binding = Some(binding.clone());
    }

    let events = ctx.hub.subscribe(code);
    conn.forwarder = Some(tokio::spawn(forward_events(code, events, conn.tx.clone())));
    conn.binding = Some(binding);

    debug!(peer = %conn.id, room = %code, member_id = %member_id, "Connection bound");
}

/// Forget the connection's room. The forwarder stops by itself once the
/// room's channel closes.
async fn unbind<S>(conn: &mut Connection, ctx: &Context<S>) {
    if let Some(binding) = conn.binding.take() {
        debug!(peer = %conn.id, room = %binding.code, "Connection unbound");
    }
    if let Some(peer) = ctx.state.write().await.peers.get_mut(&conn.id) {
        peer.binding = None;
    }
}

/// Relay a room's events to one connection until either side goes away
async fn forward_events(
    code: RoomCode,
    mut events: broadcast::Receiver<dinewheel_core::RoomEvent>,
    tx: mpsc::Sender<Response>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if tx.send(Response::Event { code, event }).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(room = %code, skipped, "Subscriber lagged, events skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
