//! The two-phase transfer sub-protocol: each admitted fetch or upload runs in a task of
//!  its own, negotiates an ephemeral TCP endpoint over UDP and moves the file bytes over
//!  the resulting connection. A task serves exactly one transfer and then terminates.

use crate::config::ServerConfig;
use crate::reply::{send_complex, ReplySocket};
use crate::shutdown::ShutdownSignal;
use crate::state::SharedState;
use crate::wire::commands;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, info, warn};

pub const CHUNK_LEN: usize = 64 * 1024;

async fn bind_transfer_listener() -> anyhow::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Waits for the client's connection, bounded by the configured timeout. `None` means
///  the client never connected (or the server is shutting down) and the handshake is
///  abandoned silently.
async fn await_client(
    listener: &TcpListener,
    connect_timeout: std::time::Duration,
    shutdown: &mut ShutdownSignal,
) -> anyhow::Result<Option<TcpStream>> {
    tokio::select! {
        accepted = time::timeout(connect_timeout, listener.accept()) => {
            match accepted {
                Ok(Ok((stream, peer))) => {
                    debug!("client connected from {:?}", peer);
                    Ok(Some(stream))
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => {
                    debug!("no connection within {:?}, abandoning transfer", connect_timeout);
                    Ok(None)
                }
            }
        }
        _ = shutdown.recv() => Ok(None),
    }
}

/// Streams the file at `path` to the client, verbatim, in fixed-size chunks. No catalog
///  or ledger state changes regardless of outcome - fetch never reserves anything.
pub async fn serve_fetch(
    reply: Arc<dyn ReplySocket>,
    config: Arc<ServerConfig>,
    mut shutdown: ShutdownSignal,
    client: SocketAddr,
    seq: u64,
    name: String,
    path: PathBuf,
) -> anyhow::Result<()> {
    let (listener, port) = bind_transfer_listener().await?;
    send_complex(reply.as_ref(), client, commands::FETCH_REPLY, seq, port as u64, &name).await;

    let Some(mut stream) = await_client(&listener, config.timeout, &mut shutdown).await? else {
        return Ok(());
    };

    let mut file = File::open(&path).await?;
    let mut buf = vec![0u8; CHUNK_LEN];
    let mut sent = 0u64;
    loop {
        let num_read = tokio::select! {
            r = file.read(&mut buf) => r?,
            _ = shutdown.recv() => return Ok(()),
        };
        if num_read == 0 {
            break;
        }
        stream.write_all(&buf[..num_read]).await?;
        sent += num_read as u64;
    }
    stream.shutdown().await?;

    info!("sent {} ({} bytes) to {:?}", name, sent, client);
    Ok(())
}

/// Receives an admitted upload into its backing file.
///
/// Admission already charged the declared size and inserted the catalog entry, making
///  the name visible (and un-reusable) while the transfer is in flight. On success that
///  state simply stands; on any failure - no connection within the timeout, premature
///  end of stream, I/O error - the partial file is deleted, the entry delisted and the
///  charge refunded.
pub async fn serve_upload(
    reply: Arc<dyn ReplySocket>,
    config: Arc<ServerConfig>,
    state: SharedState,
    shutdown: ShutdownSignal,
    client: SocketAddr,
    seq: u64,
    name: String,
    path: PathBuf,
    declared_size: u64,
) -> anyhow::Result<()> {
    let result = receive_into(reply, config, &state, shutdown, client, seq, &path, declared_size).await;

    match result {
        Ok(true) => {
            state.lock().await.open_files.remove(&path);
            info!("stored {} ({} bytes) from {:?}", name, declared_size, client);
            Ok(())
        }
        Ok(false) => {
            abort_upload(&state, &name, &path, declared_size).await;
            Ok(())
        }
        Err(e) => {
            abort_upload(&state, &name, &path, declared_size).await;
            Err(e)
        }
    }
}

/// Ok(true) iff exactly the declared number of bytes was received and written.
async fn receive_into(
    reply: Arc<dyn ReplySocket>,
    config: Arc<ServerConfig>,
    state: &SharedState,
    mut shutdown: ShutdownSignal,
    client: SocketAddr,
    seq: u64,
    path: &Path,
    declared_size: u64,
) -> anyhow::Result<bool> {
    let (listener, port) = bind_transfer_listener().await?;
    send_complex(reply.as_ref(), client, commands::UPLOAD_REPLY, seq, port as u64, "").await;

    let Some(mut stream) = await_client(&listener, config.timeout, &mut shutdown).await? else {
        return Ok(false);
    };

    // mark the backing file open before the first write so shutdown cleanup sees it
    state.lock().await.open_files.insert(path.to_owned());
    let mut file = File::create(path).await?;

    let mut remaining = declared_size;
    let mut buf = vec![0u8; CHUNK_LEN];
    while remaining > 0 {
        let num_read = tokio::select! {
            r = stream.read(&mut buf) => r?,
            _ = shutdown.recv() => return Ok(false),
        };
        if num_read == 0 {
            debug!("client closed the stream {} bytes before the declared size", remaining);
            return Ok(false);
        }
        // never store more than the declared size, even if the client keeps sending
        let accepted = (num_read as u64).min(remaining) as usize;
        file.write_all(&buf[..accepted]).await?;
        remaining -= accepted as u64;
    }
    file.flush().await?;

    Ok(true)
}

async fn abort_upload(state: &SharedState, name: &str, path: &Path, declared_size: u64) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("could not delete partial file {:?}: {}", path, e);
        }
    }

    let mut state = state.lock().await;
    state.open_files.remove(path);
    // delist and refund, unless a concurrent remove already took the entry
    if state.catalog.remove_by_name(name).is_some() {
        state.ledger.refund(declared_size);
    }
}
