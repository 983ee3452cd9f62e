//! TCP server lifecycle
//!
//! One spawned worker per accepted connection; all workers share the store.
//! A single watch channel carries the process-wide shutdown signal: the
//! accept loop stops taking connections, idle workers exit at their next
//! command boundary, and a worker mid-request finishes that request first.

use crate::common::{Error, Result, ServerConfig};
use crate::store::Store;
use crate::wire::{self, Command, Reply};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Cloneable trigger for process-wide shutdown.
///
/// Held by the server itself, by the stop-command path in each worker, and
/// by whoever needs to stop the server from outside (tests, signal handlers).
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signal shutdown. Idempotent; safe from any task.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<Store>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind the listening socket. The address is live once this returns, so
    /// an `Auto` port can be read back through [`local_addr`](Server::local_addr).
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        let local_addr = listener.local_addr()?;
        let (tx, _) = watch::channel(false);
        Ok(Self {
            listener,
            local_addr,
            store: Arc::new(Store::new(config.buckets)),
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept loop. Returns after shutdown is signaled and every worker has
    /// finished; a connection attempt made after that point is refused.
    pub async fn serve(self) -> Result<()> {
        tracing::info!("listening on {}", self.local_addr);
        let mut workers = JoinSet::new();
        let mut shutdown_rx = self.shutdown.tx.subscribe();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let store = self.store.clone();
                    let handle = self.shutdown.clone();
                    let stop = self.shutdown.tx.subscribe();
                    workers.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, store, handle, stop).await {
                            tracing::warn!("connection from {} failed: {}", peer, e);
                        }
                    });
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        drop(self.listener);
        tracing::info!("draining {} open connection(s)", workers.len());
        while workers.join_next().await.is_some() {}
        tracing::info!("stopped");
        Ok(())
    }
}

/// Per-connection request loop.
///
/// Ends on clean disconnect, on shutdown, on a stop command (which also
/// signals shutdown), or with an error that is fatal to this connection only.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<Store>,
    shutdown: ShutdownHandle,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    tracing::debug!("connection from {}", peer);
    let mut stream = BufStream::new(stream);

    // the signal may predate this worker's subscription
    if *stop.borrow_and_update() {
        return Ok(());
    }

    loop {
        let command = tokio::select! {
            read = wire::read_command(&mut stream) => match read? {
                Some(command) => command,
                None => {
                    tracing::debug!("connection closed by {}", peer);
                    return Ok(());
                }
            },
            _ = stop.changed() => return Ok(()),
        };

        if command == Command::Stop {
            wire::write_reply(&mut stream, Reply::Ack).await?;
            stream.flush().await?;
            tracing::info!("stop requested by {}", peer);
            shutdown.shutdown();
            return Ok(());
        }

        let key = wire::read_key(&mut stream).await?;
        dispatch(command, &key, &store, &mut stream).await?;
        stream.flush().await?;
    }
}

/// Decode the operation-specific fields, run the operation, encode the reply.
/// Field reads come first so the wire stays in sync even when the key turns
/// out to be absent.
async fn dispatch(
    command: Command,
    key: &str,
    store: &Store,
    stream: &mut BufStream<TcpStream>,
) -> Result<()> {
    match command {
        Command::GetBytes => reply_bytes(stream, store.get_bytes(key)).await,
        Command::GetBytesInto => {
            let capacity = wire::read_u32(stream).await?;
            let outcome = store.get_bytes_into(key, capacity).map(|c| c.data);
            reply_bytes(stream, outcome).await
        }
        Command::GetBytesRange => {
            let start = wire::read_u32(stream).await?;
            let end = wire::read_u32(stream).await?;
            reply_bytes(stream, store.get_bytes_range(key, start, end)).await
        }
        Command::GetBytesRangeInto => {
            let start = wire::read_u32(stream).await?;
            let end = wire::read_u32(stream).await?;
            let capacity = wire::read_u32(stream).await?;
            let outcome = store
                .get_bytes_range_into(key, start, end, capacity)
                .map(|c| c.data);
            reply_bytes(stream, outcome).await
        }
        Command::SetBytes => {
            let data = wire::read_blob(stream).await?;
            reply_unit(stream, store.set_bytes(key, data)).await
        }
        Command::SetBytesRange => {
            let start = wire::read_u32(stream).await?;
            let data = wire::read_blob(stream).await?;
            reply_unit(stream, store.set_bytes_range(key, start, &data)).await
        }
        Command::DelBytes => reply_unit(stream, store.del_bytes(key)).await,
        Command::TruncateBytes => {
            let size = wire::read_u32(stream).await?;
            reply_unit(stream, store.truncate_bytes(key, size)).await
        }
        Command::SetUint => {
            let value = wire::read_u32(stream).await?;
            reply_unit(stream, store.set_uint(key, value)).await
        }
        Command::GetUint => reply_uint(stream, store.get_uint(key)).await,
        Command::SetUintIfMax => {
            let value = wire::read_u32(stream).await?;
            reply_unit(stream, store.set_uint_if_max(key, value)).await
        }
        Command::DelUint => reply_unit(stream, store.del_uint(key)).await,
        Command::Stop => Err(Error::Internal(
            "stop is handled by the connection loop".into(),
        )),
    }
}

async fn reply_bytes(
    stream: &mut BufStream<TcpStream>,
    outcome: Result<Vec<u8>>,
) -> Result<()> {
    match outcome {
        Ok(data) => {
            wire::write_reply(stream, Reply::Ack).await?;
            wire::write_blob(stream, &data).await
        }
        Err(err) => reply_error(stream, err).await,
    }
}

async fn reply_uint(stream: &mut BufStream<TcpStream>, outcome: Result<u32>) -> Result<()> {
    match outcome {
        Ok(value) => {
            wire::write_reply(stream, Reply::Ack).await?;
            wire::write_u32(stream, value).await
        }
        Err(err) => reply_error(stream, err).await,
    }
}

async fn reply_unit(stream: &mut BufStream<TcpStream>, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => wire::write_reply(stream, Reply::Ack).await,
        Err(err) => reply_error(stream, err).await,
    }
}

/// Not-found goes back over the wire; everything else aborts the connection.
async fn reply_error(stream: &mut BufStream<TcpStream>, err: Error) -> Result<()> {
    if err.is_not_found() {
        wire::write_reply(stream, Reply::NoKey).await
    } else {
        Err(err)
    }
}
