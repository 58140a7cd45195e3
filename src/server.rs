//! The UDP command dispatcher: a single receive loop that validates and routes each
//!  inbound datagram, answers control commands in place and spawns a task per admitted
//!  transfer. The protocol is stateless at the UDP layer - sequence numbers are echoed
//!  back for client-side correlation, never interpreted.

use crate::catalog::CatalogEntry;
use crate::config::ServerConfig;
use crate::listing;
use crate::reply::{send_complex, send_simple, ReplySocket};
use crate::shutdown::ShutdownSignal;
use crate::state::{ServerState, SharedState};
use crate::transfer;
use crate::wire::{commands, ComplexRecord, SimpleRecord, MAX_DATAGRAM_LEN, MAX_SIMPLE_PAYLOAD_LEN};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, span, trace, warn, Instrument, Level, Span};
use uuid::Uuid;

/// How long shutdown waits for in-flight transfers to wind down before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct Server {
    config: Arc<ServerConfig>,
    state: SharedState,
    socket: Arc<UdpSocket>,
    reply: Arc<dyn ReplySocket>,
    shutdown: ShutdownSignal,
    transfers: JoinSet<()>,
}

impl Server {
    /// Binds the control socket and joins the multicast group. Any failure here is fatal
    ///  to startup.
    pub async fn bind(config: ServerConfig, state: ServerState) -> anyhow::Result<Server> {
        config.validate()?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.cmd_port)).await?;
        socket.join_multicast_v4(config.multicast_addr, Ipv4Addr::UNSPECIFIED)?;
        info!(
            "bound control socket to {:?}, joined multicast group {}",
            socket.local_addr()?,
            config.multicast_addr
        );

        let socket = Arc::new(socket);
        Ok(Server {
            config: Arc::new(config),
            state: state.into_shared(),
            reply: Arc::new(socket.clone()),
            socket,
            shutdown: ShutdownSignal::new(),
            transfers: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// A handle that can cancel the whole server, including in-flight transfers.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Serves until the shutdown signal fires, then tears down: waits for in-flight
    ///  transfers with a grace bound, drops the multicast membership and deletes any
    ///  partially written upload files.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("starting receive loop");

        let socket = self.socket.clone();
        let mut shutdown = self.shutdown.clone();
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (num_read, from) = match received {
                        Ok(x) => x,
                        Err(e) => {
                            error!("socket error: {}", e);
                            continue;
                        }
                    };

                    let correlation_id = Uuid::new_v4();
                    let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
                    self.dispatch(&buf[..num_read], from).instrument(span).await;
                }
                _ = shutdown.recv() => break,
            }
        }

        self.teardown().await
    }

    async fn dispatch(&mut self, datagram: &[u8], from: SocketAddr) {
        let request = match SimpleRecord::deser(&mut &datagram[..]) {
            Ok(request) => request,
            Err(_) => {
                debug!("malformed datagram from {:?} - dropping", from);
                return;
            }
        };
        trace!("{:?} from {:?}", request.cmd, from);

        if request.cmd.is(commands::DISCOVER) {
            handle_discover(self.reply.as_ref(), &self.config, &self.state, from, request).await
        }
        else if request.cmd.is(commands::REMOVE) {
            handle_remove(self.reply.as_ref(), &self.state, from, request).await
        }
        else if request.cmd.is(commands::SEARCH) {
            handle_search(self.reply.as_ref(), &self.state, from, request).await
        }
        else if request.cmd.is(commands::FETCH) {
            self.on_fetch(from, request).await
        }
        else if request.cmd.is(commands::UPLOAD) {
            // upload carries a declared size, so it needs the complex layout
            match ComplexRecord::deser(&mut &datagram[..]) {
                Ok(request) => self.on_upload(from, request).await,
                Err(_) => debug!("upload request shorter than a complex record from {:?} - dropping", from),
            }
        }
        else {
            warn!("unrecognized command {:?} from {:?}", request.cmd, from);
            send_simple(self.reply.as_ref(), from, commands::INVALID, request.seq, "invalid command").await;
        }
    }

    async fn on_fetch(&mut self, from: SocketAddr, request: SimpleRecord) {
        if request.payload.is_empty() {
            send_simple(self.reply.as_ref(), from, commands::INVALID, request.seq, "fetch needs a filename").await;
            return;
        }

        let found = self
            .state
            .lock()
            .await
            .catalog
            .find_by_name(&request.payload)
            .map(|entry| (entry.name.clone(), entry.path.clone()));
        let Some((name, path)) = found else {
            warn!("fetch for unknown file {:?} from {:?}", request.payload, from);
            send_simple(self.reply.as_ref(), from, commands::INVALID, request.seq, "invalid file name").await;
            return;
        };

        debug!("starting fetch transfer of {} for {:?}", name, from);
        let reply = self.reply.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let seq = request.seq;
        self.transfers.spawn(
            async move {
                if let Err(e) = transfer::serve_fetch(reply, config, shutdown, from, seq, name, path).await {
                    error!("fetch transfer failed: {}", e);
                }
            }
            .instrument(Span::current()),
        );
    }

    async fn on_upload(&mut self, from: SocketAddr, request: ComplexRecord) {
        let name = request.payload.clone();
        let declared_size = request.param;
        let path = self.config.shared_dir.join(&name);

        {
            let mut state = self.state.lock().await;
            if let Some(reason) = upload_rejection_reason(&state, &name, declared_size) {
                debug!("rejecting upload of {:?} ({} bytes) from {:?}: {}", name, declared_size, from, reason);
                drop(state);
                send_simple(self.reply.as_ref(), from, commands::UPLOAD_REJECTED, request.seq, &name).await;
                return;
            }

            // admit: commit the space and reserve the name before the transfer starts,
            // so a second upload of the same name is rejected while this one is in flight
            state.ledger.charge(declared_size);
            state.catalog.insert(CatalogEntry {
                name: name.clone(),
                path: path.clone(),
                size: declared_size,
            });
        }

        debug!("starting upload transfer of {} ({} bytes) from {:?}", name, declared_size, from);
        let reply = self.reply.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let seq = request.seq;
        self.transfers.spawn(
            async move {
                if let Err(e) =
                    transfer::serve_upload(reply, config, state, shutdown, from, seq, name, path, declared_size).await
                {
                    error!("upload transfer failed: {}", e);
                }
            }
            .instrument(Span::current()),
        );
    }

    async fn teardown(mut self) -> anyhow::Result<()> {
        info!("shutting down");

        let graceful = time::timeout(SHUTDOWN_GRACE, async {
            while self.transfers.join_next().await.is_some() {}
        })
        .await;
        if graceful.is_err() {
            warn!("aborting transfers that did not wind down within {:?}", SHUTDOWN_GRACE);
        }
        self.transfers.shutdown().await;

        if let Err(e) = self.socket.leave_multicast_v4(self.config.multicast_addr, Ipv4Addr::UNSPECIFIED) {
            warn!("could not drop multicast membership: {}", e);
        }

        let open_files = std::mem::take(&mut self.state.lock().await.open_files);
        for path in open_files {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("deleted partially written file {:?}", path),
                Err(e) => warn!("could not delete partially written file {:?}: {}", path, e),
            }
        }
        Ok(())
    }
}

async fn handle_discover(
    reply: &dyn ReplySocket,
    config: &ServerConfig,
    state: &SharedState,
    from: SocketAddr,
    request: SimpleRecord,
) {
    if !request.payload.is_empty() {
        warn!("discover with non-empty payload from {:?}", from);
        send_simple(reply, from, commands::INVALID, request.seq, "discover does not take a payload").await;
        return;
    }

    let available = state.lock().await.ledger.available();
    send_complex(
        reply,
        from,
        commands::DISCOVER_REPLY,
        request.seq,
        available,
        &config.multicast_addr.to_string(),
    )
    .await;
}

/// Fire and forget: a remove of an unknown filename is ignored, and even a successful
///  remove sends no reply.
async fn handle_remove(reply: &dyn ReplySocket, state: &SharedState, from: SocketAddr, request: SimpleRecord) {
    if request.payload.is_empty() {
        send_simple(reply, from, commands::INVALID, request.seq, "remove needs a filename").await;
        return;
    }

    let removed = {
        let mut state = state.lock().await;
        let removed = state.catalog.remove_by_name(&request.payload);
        if let Some(entry) = &removed {
            state.ledger.refund(entry.size);
        }
        removed
    };

    match removed {
        Some(entry) => {
            if let Err(e) = tokio::fs::remove_file(&entry.path).await {
                warn!("could not delete backing file {:?}: {}", entry.path, e);
            }
            info!("removed {} ({} bytes)", entry.name, entry.size);
        }
        None => debug!("remove for unknown file {:?} from {:?} - ignoring", request.payload, from),
    }
}

async fn handle_search(reply: &dyn ReplySocket, state: &SharedState, from: SocketAddr, request: SimpleRecord) {
    let matches: Vec<String> = state
        .lock()
        .await
        .catalog
        .search(&request.payload)
        .map(str::to_owned)
        .collect();
    debug!("search {:?} matched {} files", request.payload, matches.len());

    for page in listing::paginate(matches.iter().map(String::as_str), MAX_SIMPLE_PAYLOAD_LEN) {
        send_simple(reply, from, commands::SEARCH_REPLY, request.seq, &page).await;
    }
}

fn upload_rejection_reason(state: &ServerState, name: &str, declared_size: u64) -> Option<&'static str> {
    if name.is_empty() {
        return Some("empty filename");
    }
    if name.contains('/') {
        return Some("filename contains a path separator");
    }
    if state.catalog.contains(name) {
        return Some("filename already in use");
    }
    if declared_size > state.ledger.available() {
        return Some("not enough space");
    }
    None
}
