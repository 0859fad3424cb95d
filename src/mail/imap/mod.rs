//! IMAP client for mailbox enumeration and message retrieval.
//!
//! This module is split into:
//! - `mod.rs` - Transport stream, session type, error taxonomy
//! - `client.rs` - Connection, folder, and fetch operations

mod client;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::{AsyncRead, AsyncWrite};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::Compat;

use crate::config::MailboxConfig;

/// The transport under the IMAP session: TLS per config, plain TCP otherwise.
#[derive(Debug)]
pub(crate) enum ImapStream {
    Tls(Compat<TlsStream<TcpStream>>),
    Plain(Compat<TcpStream>),
}

impl AsyncRead for ImapStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ImapStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
            ImapStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ImapStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
            ImapStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ImapStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
            ImapStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ImapStream::Tls(stream) => Pin::new(stream).poll_close(cx),
            ImapStream::Plain(stream) => Pin::new(stream).poll_close(cx),
        }
    }
}

pub(crate) type ImapSession = async_imap::Session<ImapStream>;

/// Failure taxonomy of the mailbox side. Connection and auth failures abort a
/// whole pass; Select aborts one folder; the rest abort one message.
#[derive(Debug, Error)]
pub enum ImapError {
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("'{0}' is not a valid TLS server name")]
    ServerName(String),

    #[error("TLS handshake with {server} failed")]
    Tls {
        server: String,
        #[source]
        source: io::Error,
    },

    #[error("login as {user} rejected: {detail}")]
    Auth { user: String, detail: String },

    #[error("failed to select folder '{folder}'")]
    Select {
        folder: String,
        #[source]
        source: async_imap::error::Error,
    },

    #[error("not connected to IMAP server")]
    NotConnected,

    #[error("fetch for uid {uid} returned no message body")]
    EmptyFetch { uid: u32 },

    #[error("IMAP protocol error")]
    Protocol(#[from] async_imap::error::Error),
}

pub struct ImapClient {
    pub(crate) session: Option<ImapSession>,
    pub(crate) config: MailboxConfig,
    pub(crate) password: String,
}

impl ImapClient {
    pub fn new(config: MailboxConfig, password: String) -> Self {
        Self {
            session: None,
            config,
            password,
        }
    }
}
