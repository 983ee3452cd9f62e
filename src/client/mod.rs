//! Client connection to a single server
//!
//! One persistent TCP connection, one command per round trip; the reply must
//! be consumed before the next command goes out. Key-not-found comes back as
//! a typed error the caller branches on; every transport or framing failure
//! is fatal to this client instance, with no reconnect logic.

use crate::common::{Error, Result};
use crate::wire::{self, Command, Reply};
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Outcome of a read into a caller-supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filled {
    /// Bytes written at the front of the destination.
    pub len: usize,
    /// Set when the server sent fewer bytes than the destination could hold.
    /// The request itself succeeded; the rest of the buffer is untouched.
    pub short: bool,
}

pub struct Client {
    stream: BufStream<TcpStream>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        tracing::debug!("connected to {}", stream.peer_addr()?);
        Ok(Self {
            stream: BufStream::new(stream),
        })
    }

    /// Flush and close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Ask the remote server to stop serving. The connection is spent
    /// afterwards; drop or [`close`](Client::close) it.
    pub async fn shutdown_server(&mut self) -> Result<()> {
        wire::write_command(&mut self.stream, Command::Stop).await?;
        self.stream.flush().await?;
        match wire::read_reply(&mut self.stream).await? {
            Reply::Ack => Ok(()),
            Reply::NoKey => Err(Error::UnexpectedReply(Reply::NoKey as u8)),
        }
    }

    async fn send_request(&mut self, command: Command, key: &str) -> Result<()> {
        wire::write_command(&mut self.stream, command).await?;
        wire::write_blob(&mut self.stream, key.as_bytes()).await
    }

    async fn finish(&mut self, key: &str) -> Result<()> {
        self.stream.flush().await?;
        match wire::read_reply(&mut self.stream).await? {
            Reply::Ack => Ok(()),
            Reply::NoKey => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    pub async fn get_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        self.send_request(Command::GetBytes, key).await?;
        self.finish(key).await?;
        wire::read_blob(&mut self.stream).await
    }

    /// Fetch at most `dst.len()` bytes of the value into `dst`.
    pub async fn get_bytes_into(&mut self, key: &str, dst: &mut [u8]) -> Result<Filled> {
        self.send_request(Command::GetBytesInto, key).await?;
        wire::write_u32(&mut self.stream, capacity_of(dst)?).await?;
        self.finish(key).await?;
        let len = wire::read_blob_into(&mut self.stream, dst).await?;
        Ok(Filled {
            len,
            short: len < dst.len(),
        })
    }

    /// Fetch `value[start..=end]`, clamped to the value's length.
    pub async fn get_bytes_range(&mut self, key: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        self.send_request(Command::GetBytesRange, key).await?;
        wire::write_u32(&mut self.stream, start).await?;
        wire::write_u32(&mut self.stream, end).await?;
        self.finish(key).await?;
        wire::read_blob(&mut self.stream).await
    }

    /// Fetch `value[start..=end]` into `dst`, clamped to both the value's
    /// length and the destination capacity.
    pub async fn get_bytes_range_into(
        &mut self,
        key: &str,
        start: u32,
        end: u32,
        dst: &mut [u8],
    ) -> Result<Filled> {
        self.send_request(Command::GetBytesRangeInto, key).await?;
        wire::write_u32(&mut self.stream, start).await?;
        wire::write_u32(&mut self.stream, end).await?;
        wire::write_u32(&mut self.stream, capacity_of(dst)?).await?;
        self.finish(key).await?;
        let len = wire::read_blob_into(&mut self.stream, dst).await?;
        Ok(Filled {
            len,
            short: len < dst.len(),
        })
    }

    pub async fn set_bytes(&mut self, key: &str, data: &[u8]) -> Result<()> {
        self.send_request(Command::SetBytes, key).await?;
        wire::write_blob(&mut self.stream, data).await?;
        self.finish(key).await
    }

    /// Write `data` at offset `start`, extending and zero-filling as needed.
    pub async fn set_bytes_range(&mut self, key: &str, start: u32, data: &[u8]) -> Result<()> {
        self.send_request(Command::SetBytesRange, key).await?;
        wire::write_u32(&mut self.stream, start).await?;
        wire::write_blob(&mut self.stream, data).await?;
        self.finish(key).await
    }

    pub async fn del_bytes(&mut self, key: &str) -> Result<()> {
        self.send_request(Command::DelBytes, key).await?;
        self.finish(key).await
    }

    /// Shrink the value to `size` bytes; a size at or past the current
    /// length acks without changing anything.
    pub async fn truncate_bytes(&mut self, key: &str, size: u32) -> Result<()> {
        self.send_request(Command::TruncateBytes, key).await?;
        wire::write_u32(&mut self.stream, size).await?;
        self.finish(key).await
    }

    pub async fn set_uint(&mut self, key: &str, value: u32) -> Result<()> {
        self.send_request(Command::SetUint, key).await?;
        wire::write_u32(&mut self.stream, value).await?;
        self.finish(key).await
    }

    pub async fn get_uint(&mut self, key: &str) -> Result<u32> {
        self.send_request(Command::GetUint, key).await?;
        self.finish(key).await?;
        wire::read_u32(&mut self.stream).await
    }

    /// Monotonic update: stores `value` only if it is strictly greater than
    /// the current value (or the key is absent). Always acknowledged.
    pub async fn set_uint_if_max(&mut self, key: &str, value: u32) -> Result<()> {
        self.send_request(Command::SetUintIfMax, key).await?;
        wire::write_u32(&mut self.stream, value).await?;
        self.finish(key).await
    }

    pub async fn del_uint(&mut self, key: &str) -> Result<()> {
        self.send_request(Command::DelUint, key).await?;
        self.finish(key).await
    }
}

fn capacity_of(dst: &[u8]) -> Result<u32> {
    u32::try_from(dst.len())
        .map_err(|_| Error::Protocol("destination capacity too large for u32".into()))
}
