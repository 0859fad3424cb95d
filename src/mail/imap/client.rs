//! IMAP client operations: connection, folder listing, UID enumeration, and
//! full-message fetch.

use std::sync::Arc;

use async_imap::types::Mailbox;
use futures::StreamExt;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::TokioAsyncReadCompatExt;

use super::{ImapClient, ImapError, ImapSession, ImapStream};

impl ImapClient {
    //
    // Connection Management
    //

    pub async fn connect(&mut self) -> Result<(), ImapError> {
        let addr = format!("{}:{}", self.config.server, self.config.port);

        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|source| ImapError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let stream = if self.config.tls {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            let connector = TlsConnector::from(Arc::new(tls_config));

            let server_name = ServerName::try_from(self.config.server.clone())
                .map_err(|_| ImapError::ServerName(self.config.server.clone()))?;

            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|source| ImapError::Tls {
                    server: self.config.server.clone(),
                    source,
                })?;
            ImapStream::Tls(tls.compat())
        } else {
            ImapStream::Plain(tcp.compat())
        };

        let client = async_imap::Client::new(stream);

        let session = client
            .login(&self.config.username, &self.password)
            .await
            .map_err(|e| ImapError::Auth {
                user: self.config.username.clone(),
                detail: format!("{:?}", e.0),
            })?;

        self.session = Some(session);
        tracing::info!("Connected to IMAP server {}", self.config.server);

        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.logout().await.ok();
        }
    }

    fn session(&mut self) -> Result<&mut ImapSession, ImapError> {
        self.session.as_mut().ok_or(ImapError::NotConnected)
    }

    //
    // Folder Operations
    //

    /// List all folder names under the root. Entries the library cannot parse
    /// are logged and skipped, never fatal to the listing.
    pub async fn list_folders(&mut self) -> Result<Vec<String>, ImapError> {
        let session = self.session()?;

        let mut names = Vec::new();
        let mut list_stream = session.list(Some(""), Some("*")).await?;

        while let Some(entry) = list_stream.next().await {
            match entry {
                Ok(name) => names.push(name.name().to_string()),
                Err(e) => tracing::warn!("Skipping unparseable LIST entry: {:?}", e),
            }
        }

        Ok(names)
    }

    /// Select a folder, retrying once with a quoted name for servers that
    /// require quoting around specials.
    pub async fn select_folder(&mut self, folder: &str) -> Result<Mailbox, ImapError> {
        let session = self.session()?;

        match session.select(folder).await {
            Ok(mailbox) => Ok(mailbox),
            Err(first) => {
                let quoted = format!("\"{}\"", folder);
                match session.select(&quoted).await {
                    Ok(mailbox) => Ok(mailbox),
                    Err(_) => Err(ImapError::Select {
                        folder: folder.to_string(),
                        source: first,
                    }),
                }
            }
        }
    }

    //
    // Fetch Operations
    //

    /// Enumerate every message UID in the currently selected folder.
    pub async fn search_all_uids(&mut self) -> Result<Vec<u32>, ImapError> {
        let session = self.session()?;
        let uids = session.uid_search("ALL").await?;
        Ok(uids.into_iter().collect())
    }

    /// Fetch one full raw message by UID. Uses BODY.PEEK[] so syncing does
    /// not flag messages as seen.
    pub async fn fetch_message(&mut self, uid: u32) -> Result<Vec<u8>, ImapError> {
        let session = self.session()?;

        let mut messages = session.uid_fetch(uid.to_string(), "BODY.PEEK[]").await?;

        let mut raw: Option<Vec<u8>> = None;
        while let Some(result) = messages.next().await {
            let fetch = result?;
            if raw.is_none()
                && let Some(body) = fetch.body()
            {
                raw = Some(body.to_vec());
            }
        }

        raw.ok_or(ImapError::EmptyFetch { uid })
    }
}
