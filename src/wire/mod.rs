//! Binary wire protocol
//!
//! Every request is `[command:1][key: length-prefixed][operation fields]`,
//! every reply `[status:1][payload]`. Length-prefixed bytes are a u32
//! little-endian length followed by that many raw bytes; bare offsets,
//! sizes, capacities and counter values travel as u32 little-endian.
//!
//! The codec trusts the transport: any short read inside a message is a
//! fatal framing error for that connection. The single exception is a clean
//! end-of-stream before the first byte of a request, which is the normal
//! peer-disconnect signal and surfaces as `Ok(None)` from [`read_command`].

use crate::common::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Command byte opening every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetBytes = b'a',
    GetBytesInto = b'b',
    GetBytesRange = b'c',
    GetBytesRangeInto = b'd',
    SetBytes = b'e',
    SetBytesRange = b'f',
    DelBytes = b'g',
    TruncateBytes = b'h',
    SetUint = b'i',
    GetUint = b'j',
    SetUintIfMax = b'k',
    DelUint = b'l',
    Stop = b'm',
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            b'a' => Ok(Command::GetBytes),
            b'b' => Ok(Command::GetBytesInto),
            b'c' => Ok(Command::GetBytesRange),
            b'd' => Ok(Command::GetBytesRangeInto),
            b'e' => Ok(Command::SetBytes),
            b'f' => Ok(Command::SetBytesRange),
            b'g' => Ok(Command::DelBytes),
            b'h' => Ok(Command::TruncateBytes),
            b'i' => Ok(Command::SetUint),
            b'j' => Ok(Command::GetUint),
            b'k' => Ok(Command::SetUintIfMax),
            b'l' => Ok(Command::DelUint),
            b'm' => Ok(Command::Stop),
            other => Err(Error::Protocol(format!(
                "unknown command byte: 0x{:02x}",
                other
            ))),
        }
    }
}

/// Status byte opening every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reply {
    Ack = b'n',
    NoKey = b'o',
}

/// Read the command byte of the next request.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before
/// sending anything; every other failure, including EOF after partial
/// delivery elsewhere in the stream, is an error.
pub async fn read_command<R>(reader: &mut R) -> Result<Option<Command>>
where
    R: AsyncRead + Unpin,
{
    match reader.read_u8().await {
        Ok(byte) => Ok(Some(Command::try_from(byte)?)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn write_command<W>(writer: &mut W, command: Command) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u8(command as u8).await?;
    Ok(())
}

/// Read a reply status byte. Anything outside the reply vocabulary is an
/// unexpected server fault, fatal to the calling operation.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncRead + Unpin,
{
    match reader.read_u8().await? {
        b'n' => Ok(Reply::Ack),
        b'o' => Ok(Reply::NoKey),
        other => Err(Error::UnexpectedReply(other)),
    }
}

pub async fn write_reply<W>(writer: &mut W, reply: Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u8(reply as u8).await?;
    Ok(())
}

pub async fn read_u32<R>(reader: &mut R) -> Result<u32>
where
    R: AsyncRead + Unpin,
{
    Ok(reader.read_u32_le().await?)
}

pub async fn write_u32<W>(writer: &mut W, value: u32) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32_le(value).await?;
    Ok(())
}

/// Read a length-prefixed byte blob.
pub async fn read_blob<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32_le().await? as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Read a length-prefixed byte blob into the front of `dst`.
///
/// Returns the number of bytes received. The sender is expected to have
/// clamped the payload to the capacity it was told about, so a payload
/// larger than `dst` is a framing error.
pub async fn read_blob_into<R>(reader: &mut R, dst: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32_le().await? as usize;
    if len > dst.len() {
        return Err(Error::Protocol(format!(
            "payload of {} bytes exceeds destination capacity {}",
            len,
            dst.len()
        )));
    }
    reader.read_exact(&mut dst[..len]).await?;
    Ok(len)
}

pub async fn write_blob<W>(writer: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(data.len())
        .map_err(|_| Error::Protocol("payload too large for u32 length prefix".into()))?;
    writer.write_u32_le(len).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Read a length-prefixed key. Keys must be valid UTF-8.
pub async fn read_key<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    String::from_utf8(read_blob(reader).await?)
        .map_err(|_| Error::Protocol("key is not valid UTF-8".into()))
}
