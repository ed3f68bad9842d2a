//! Completion handles and per-call response decoders.
//!
//! Every issued request registers a [`ResponseHandler`] keyed by its request
//! ID: a tagged variant per response shape, carrying the typed one-shot
//! sender for that call. The dispatcher picks the OK or error arm from the
//! leading status byte and hands the decoder the shared socket reader; the
//! decoder consumes exactly the remainder of its response.
//!
//! Decode failures come in two flavors. A parse failure inside an intact
//! frame resolves the one affected call and realigns the reader to the
//! response's terminating newline. An I/O failure (including EOF while a
//! Hollerith length still promises payload) leaves the cursor unusable, so
//! it resolves the call *and* tears down the stream.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

use lyskom_protocol::types::{
    ConfNo, ConfType, ConfZInfo, ExtendedConfType, Mark, Person, PersonalFlags, PrivBits,
    SessionNo, TextNo, UConference, VersionInfo,
};
use lyskom_protocol::{hollerith, wire, CodecError, ServerError};

use crate::error::ClientError;

/// A typed one-shot completion handle for an issued call.
///
/// Resolves exactly once, either with the decoded result, the server's
/// error, or the engine failure that ended the call. Dropped senders (engine
/// shutdown with the call still pending) surface as
/// [`ClientError::ConnectionClosed`].
#[derive(Debug)]
pub struct Call<T> {
    rx: oneshot::Receiver<Result<T, ClientError>>,
}

impl<T> Future for Call<T> {
    type Output = Result<T, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

type Sink<T> = oneshot::Sender<Result<T, ClientError>>;

/// Creates a completion sink plus the handle the caller awaits.
pub(crate) fn channel<T>() -> (Sink<T>, Call<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Call { rx })
}

/// The outstanding-call table entry: one case per response shape, each
/// holding its typed sink.
pub(crate) enum ResponseHandler {
    /// Empty OK result; errors are the interesting part.
    Generic(Sink<()>),
    Marks(Sink<Vec<Mark>>),
    /// Raw text contents; the payload is opaque bytes.
    TextBytes(Sink<Vec<u8>>),
    Text(Sink<String>),
    Time(Sink<DateTime<Utc>>),
    TextNo(Sink<TextNo>),
    SessionNo(Sink<SessionNo>),
    Person(Sink<Person>),
    ConfNos(Sink<Vec<ConfNo>>),
    ZConfs(Sink<Vec<ConfZInfo>>),
    Version(Sink<VersionInfo>),
    UConference(Sink<UConference>),
    CallNos(Sink<Vec<u32>>),
}

/// How a decode attempt failed.
#[derive(Debug)]
enum Failure {
    /// One call is lost; the reader sits on the next frame boundary.
    Local(ClientError),
    /// The stream can no longer be trusted.
    Fatal(ClientError),
}

fn fatal(e: impl Into<ClientError>) -> Failure {
    Failure::Fatal(e.into())
}

fn local(e: impl Into<ClientError>) -> Failure {
    Failure::Local(e.into())
}

/// Classifies a codec error raised mid-frame. I/O failures and oversize
/// strings (whose unread payload we cannot skip reliably) are fatal;
/// anything else realigns the reader to the terminating newline and stays
/// call-local. When the offending byte was itself the newline the reader is
/// already aligned.
async fn recover<R>(reader: &mut R, e: CodecError) -> Failure
where
    R: AsyncRead + Unpin,
{
    match e {
        CodecError::Io(_) | CodecError::OversizeString(_) => return fatal(e),
        CodecError::UnexpectedLengthCharacter(b'\n')
        | CodecError::InvalidBitField(b'\n')
        | CodecError::UnexpectedDelimiter { found: b'\n', .. } => return local(e),
        _ => {}
    }
    match wire::skip_to_newline(reader).await {
        Ok(()) => local(e),
        Err(io) => fatal(io),
    }
}

macro_rules! deliver {
    ($tx:expr, $decoded:expr) => {
        match $decoded {
            Ok(value) => {
                let _ = $tx.send(Ok(value));
                Ok(())
            }
            Err(Failure::Local(err)) => {
                tracing::warn!(error = %err, "response decode failed, call resolved with error");
                let _ = $tx.send(Err(err));
                Ok(())
            }
            Err(Failure::Fatal(err)) => {
                let _ = $tx.send(Err(ClientError::Desync(err.to_string())));
                Err(err)
            }
        }
    };
}

impl ResponseHandler {
    /// Runs the success-path decoder. On return the reader sits on the next
    /// response unless the returned error says the stream died.
    pub(crate) async fn ok<R>(self, reader: &mut R) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
    {
        match self {
            // The request ID's terminating byte was the newline; nothing
            // else to consume.
            ResponseHandler::Generic(tx) => {
                let _ = tx.send(Ok(()));
                Ok(())
            }
            ResponseHandler::Marks(tx) => deliver!(tx, decode_marks(reader).await),
            ResponseHandler::TextBytes(tx) => deliver!(tx, decode_text_bytes(reader).await),
            ResponseHandler::Text(tx) => deliver!(tx, decode_string(reader).await),
            ResponseHandler::Time(tx) => deliver!(tx, decode_time(reader).await),
            ResponseHandler::TextNo(tx) => deliver!(tx, decode_u32(reader).await),
            ResponseHandler::SessionNo(tx) => deliver!(tx, decode_u32(reader).await),
            ResponseHandler::Person(tx) => deliver!(tx, decode_person(reader).await),
            ResponseHandler::ConfNos(tx) => deliver!(tx, decode_conf_nos(reader).await),
            ResponseHandler::ZConfs(tx) => deliver!(tx, decode_z_confs(reader).await),
            ResponseHandler::Version(tx) => deliver!(tx, decode_version(reader).await),
            ResponseHandler::UConference(tx) => deliver!(tx, decode_uconf(reader).await),
            ResponseHandler::CallNos(tx) => deliver!(tx, decode_call_nos(reader).await),
        }
    }

    /// Runs the error-path decoder: `<code> <status>` followed by the
    /// line's newline (consumed as the status terminator), mapped through
    /// the server error taxonomy.
    pub(crate) async fn error<R>(self, reader: &mut R) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
    {
        let pair = async {
            let code = wire::read_u32(reader).await?;
            let status = wire::read_u32(reader).await?;
            Ok::<_, CodecError>((code, status))
        }
        .await;

        match pair {
            Ok((code, status)) => {
                self.send_err(ServerError::from_wire(code, status).into());
                Ok(())
            }
            Err(e) => {
                let err: ClientError = e.into();
                self.send_err(ClientError::Desync(err.to_string()));
                Err(err)
            }
        }
    }

    /// Resolves the sink with `err`, whatever the shape.
    pub(crate) fn send_err(self, err: ClientError) {
        match self {
            ResponseHandler::Generic(tx) => drop(tx.send(Err(err))),
            ResponseHandler::Marks(tx) => drop(tx.send(Err(err))),
            ResponseHandler::TextBytes(tx) => drop(tx.send(Err(err))),
            ResponseHandler::Text(tx) => drop(tx.send(Err(err))),
            ResponseHandler::Time(tx) => drop(tx.send(Err(err))),
            ResponseHandler::TextNo(tx) => drop(tx.send(Err(err))),
            ResponseHandler::SessionNo(tx) => drop(tx.send(Err(err))),
            ResponseHandler::Person(tx) => drop(tx.send(Err(err))),
            ResponseHandler::ConfNos(tx) => drop(tx.send(Err(err))),
            ResponseHandler::ZConfs(tx) => drop(tx.send(Err(err))),
            ResponseHandler::Version(tx) => drop(tx.send(Err(err))),
            ResponseHandler::UConference(tx) => drop(tx.send(Err(err))),
            ResponseHandler::CallNos(tx) => drop(tx.send(Err(err))),
        }
    }
}

async fn decode_marks<R>(reader: &mut R) -> Result<Vec<Mark>, Failure>
where
    R: AsyncRead + Unpin,
{
    let count = wire::read_u32(reader).await.map_err(fatal)?;
    let region = match wire::read_delimited(reader, b'{', b'}').await {
        Ok(region) => region,
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;

    // Marks are (text-no, mark-type) pairs, so the region holds twice the
    // advertised count of integers.
    let values = wire::parse_u32_region(&region, count as usize * 2).map_err(local)?;
    Ok(values
        .chunks(2)
        .map(|pair| Mark {
            text_no: pair[0],
            mark_type: pair[1] as u8,
        })
        .collect())
}

async fn decode_text_bytes<R>(reader: &mut R) -> Result<Vec<u8>, Failure>
where
    R: AsyncRead + Unpin,
{
    let bytes = match hollerith::scan(reader).await {
        Ok(bytes) => bytes,
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;
    Ok(bytes)
}

async fn decode_string<R>(reader: &mut R) -> Result<String, Failure>
where
    R: AsyncRead + Unpin,
{
    let bytes = decode_text_bytes(reader).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn decode_time<R>(reader: &mut R) -> Result<DateTime<Utc>, Failure>
where
    R: AsyncRead + Unpin,
{
    match wire::read_time(reader).await {
        Ok(when) => Ok(when),
        // All nine integers were consumed, the last terminated by the
        // newline, so the reader is already aligned.
        Err(e @ CodecError::InvalidTime) => Err(local(e)),
        Err(e) => Err(fatal(e)),
    }
}

async fn decode_u32<R>(reader: &mut R) -> Result<u32, Failure>
where
    R: AsyncRead + Unpin,
{
    wire::read_u32(reader).await.map_err(fatal)
}

async fn decode_person<R>(reader: &mut R) -> Result<Person, Failure>
where
    R: AsyncRead + Unpin,
{
    // The leading Hollerith is a last-login placeholder, superseded by the
    // LastLogin time field later in the same response.
    if let Err(e) = hollerith::scan(reader).await {
        return Err(recover(reader, e).await);
    }
    let privileges = match PrivBits::read(reader).await {
        Ok(bits) => bits,
        Err(e) => return Err(recover(reader, e).await),
    };
    let flags = match PersonalFlags::read(reader).await {
        Ok(flags) => flags,
        Err(e) => return Err(recover(reader, e).await),
    };
    let last_login = match wire::read_time(reader).await {
        Ok(when) => when,
        // Twelve integer fields still follow, so realignment is needed.
        Err(e @ CodecError::InvalidTime) => return Err(recover(reader, e).await),
        Err(e) => return Err(fatal(e)),
    };

    Ok(Person {
        privileges,
        flags,
        last_login,
        user_area: wire::read_u32(reader).await.map_err(fatal)?,
        total_time_present: wire::read_u32(reader).await.map_err(fatal)?,
        sessions: wire::read_u32(reader).await.map_err(fatal)?,
        created_lines: wire::read_u32(reader).await.map_err(fatal)?,
        created_bytes: wire::read_u32(reader).await.map_err(fatal)?,
        read_texts: wire::read_u32(reader).await.map_err(fatal)?,
        text_fetches: wire::read_u32(reader).await.map_err(fatal)?,
        created_persons: wire::read_u16(reader).await.map_err(fatal)?,
        created_conferences: wire::read_u16(reader).await.map_err(fatal)?,
        first_created_local_no: wire::read_u32(reader).await.map_err(fatal)?,
        created_texts: wire::read_u32(reader).await.map_err(fatal)?,
        marks: wire::read_u16(reader).await.map_err(fatal)?,
        conferences: wire::read_u16(reader).await.map_err(fatal)?,
    })
}

async fn decode_conf_nos<R>(reader: &mut R) -> Result<Vec<ConfNo>, Failure>
where
    R: AsyncRead + Unpin,
{
    let count = wire::read_u32(reader).await.map_err(fatal)?;
    let region = match wire::read_delimited(reader, b'{', b'}').await {
        Ok(region) => region,
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;

    let values = wire::parse_u32_region(&region, count as usize).map_err(local)?;
    Ok(values.into_iter().map(|v| v as ConfNo).collect())
}

async fn decode_call_nos<R>(reader: &mut R) -> Result<Vec<u32>, Failure>
where
    R: AsyncRead + Unpin,
{
    let count = wire::read_u32(reader).await.map_err(fatal)?;
    let region = match wire::read_delimited(reader, b'{', b'}').await {
        Ok(region) => region,
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;
    wire::parse_u32_region(&region, count as usize).map_err(local)
}

async fn decode_z_confs<R>(reader: &mut R) -> Result<Vec<ConfZInfo>, Failure>
where
    R: AsyncRead + Unpin,
{
    let count = wire::read_u32(reader).await.map_err(fatal)?;
    let region = match wire::read_delimited(reader, b'{', b'}').await {
        Ok(region) => region,
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;

    // The region interior holds `count` records of
    // `<Hollerith name> <4-char conf type> <conf no>`, walked with the
    // in-memory scanners.
    let mut confs = Vec::with_capacity(count as usize);
    let mut offset = 1; // past the opening brace
    for _ in 0..count {
        let (name, next) = hollerith::scan_str(&region, offset).map_err(local)?;
        let type_chars = region
            .get(next + 1..)
            .ok_or_else(|| local(CodecError::Truncated))?;
        let conf_type = ConfType::parse(type_chars).map_err(local)?;
        let (conf_no, after) = wire::u32_from_str(&region, next + 5);
        confs.push(ConfZInfo {
            name,
            conf_type,
            conf_no: conf_no as ConfNo,
        });
        offset = after;
    }
    Ok(confs)
}

async fn decode_version<R>(reader: &mut R) -> Result<VersionInfo, Failure>
where
    R: AsyncRead + Unpin,
{
    let protocol_version = wire::read_u32(reader).await.map_err(fatal)?;
    let server_software = match hollerith::scan(reader).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return Err(recover(reader, e).await),
    };
    let software_version = match hollerith::scan(reader).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return Err(recover(reader, e).await),
    };
    wire::skip_to_newline(reader).await.map_err(fatal)?;
    Ok(VersionInfo {
        protocol_version,
        server_software,
        software_version,
    })
}

async fn decode_uconf<R>(reader: &mut R) -> Result<UConference, Failure>
where
    R: AsyncRead + Unpin,
{
    let name = match hollerith::scan(reader).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return Err(recover(reader, e).await),
    };
    let conf_type = match ExtendedConfType::read(reader).await {
        Ok(t) => t,
        Err(e) => return Err(recover(reader, e).await),
    };
    // The bit-field is followed by a single separator byte in the server's
    // encoding, read and discarded before the integer fields resume.
    reader.read_u8().await.map_err(|e| fatal(CodecError::from(e)))?;
    let highest_local_no = wire::read_u32(reader).await.map_err(fatal)?;
    let nice = wire::read_u32(reader).await.map_err(fatal)?;
    Ok(UConference {
        name,
        conf_type,
        highest_local_no,
        nice,
    })
}
