//! IMAP client for the ingestion mailbox.

use std::future::Future;
use std::net::TcpStream;
use std::time::Duration;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::MailboxConfig;

use super::error::{MailError, Result};
use super::transport::{MailTransport, MailboxInfo, MessageId};

/// Type alias for the underlying async stream (using async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Runs `fut` under a time limit, mapping expiry to [`MailError::Timeout`].
async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MailError::Timeout {
            operation,
            timeout: limit,
        }),
    }
}

/// Picks the body answering a `UID FETCH` for `id`.
///
/// Any response tagged with another UID means the session is out of step
/// with the server, which is a protocol error rather than a missing message.
fn body_for_uid<I>(id: MessageId, responses: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (Option<u32>, Option<Vec<u8>>)>,
{
    let mut body = None;
    for (uid, raw) in responses {
        match uid {
            Some(uid) if uid == id.0 => {
                if body.is_none() {
                    body = raw;
                }
            }
            other => {
                return Err(MailError::ProtocolError(format!(
                    "FETCH for UID {} answered with UID {:?}",
                    id, other
                )))
            }
        }
    }

    body.ok_or_else(|| MailError::FetchFailed {
        id,
        reason: "server returned no message body".to_string(),
    })
}

/// IMAP client that reads unread mail from one folder and flags it as seen.
pub struct ImapClient {
    session: Option<Session<TlsStream>>,
    config: MailboxConfig,
    selected: bool,
}

impl ImapClient {
    /// Creates a new IMAP client with the given configuration.
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            session: None,
            config,
            selected: false,
        }
    }

    /// Checks if the client is currently connected.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session_mut(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session
            .as_mut()
            .ok_or(MailError::NotConnected("no IMAP session"))
    }

    fn selected_session(&mut self) -> Result<&mut Session<TlsStream>> {
        if !self.selected {
            return Err(MailError::NotConnected("no mailbox selected"));
        }
        self.session_mut()
    }

    async fn open_tcp(host: &str, port: u16) -> Result<AsyncTcpStream> {
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| MailError::ConnectionFailed(format!("cannot resolve {}: {}", host, e)))?;

        let mut last_error = None;
        for addr in addrs {
            debug!(%addr, "Opening TCP connection");
            match AsyncTcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(format!("{}: {}", addr, e)),
            }
        }

        Err(MailError::ConnectionFailed(last_error.unwrap_or_else(|| {
            format!("no addresses found for {}", host)
        })))
    }

    fn tls_connector(&self) -> TlsConnector {
        let connector = TlsConnector::new();
        if self.config.accept_invalid_certs {
            warn!(
                host = %self.config.host,
                "Connecting WITHOUT TLS certificate validation (acceptInvalidCerts = true)"
            );
            connector
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
        } else {
            connector
        }
    }
}

#[async_trait]
impl MailTransport for ImapClient {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        if !self.config.use_tls {
            return Err(MailError::ConfigError(
                "TLS is required for secure email connections".to_string(),
            ));
        }

        let password = self
            .config
            .password
            .resolve()
            .map_err(|e| MailError::CredentialsNotFound(e.to_string()))?;

        let host = self.config.host.clone();
        let port = self.config.port;
        let timeouts = self.config.timeouts.clone();
        info!("Connecting to IMAP server at {}:{}", host, port);

        let tls = self.tls_connector();
        let tls_stream = bounded("connect", timeouts.connect(), async {
            let tcp = Self::open_tcp(&host, port).await?;
            tls.connect(host.as_str(), tcp)
                .await
                .map_err(|e| MailError::TlsError(e.to_string()))
        })
        .await?;

        let client = async_imap::Client::new(tls_stream);
        let username = self.config.username.clone();
        let session = bounded("login", timeouts.auth(), async {
            client
                .login(&username, password.expose_secret())
                .await
                .map_err(|(e, _)| MailError::AuthenticationFailed(e.to_string()))
        })
        .await?;

        info!("Successfully authenticated to IMAP server");
        self.session = Some(session);
        self.selected = false;
        Ok(())
    }

    async fn select_inbox(&mut self) -> Result<MailboxInfo> {
        let folder = self.config.folder.clone();
        let limit = self.config.timeouts.select();
        let session = self.session_mut()?;

        info!("Selecting folder: {}", folder);
        let mailbox = bounded("select", limit, async {
            session
                .select(&folder)
                .await
                .map_err(|e| MailError::MailboxUnavailable {
                    folder: folder.clone(),
                    reason: e.to_string(),
                })
        })
        .await?;

        self.selected = true;
        debug!(
            "Folder '{}' selected: {} messages, unseen hint {:?}",
            folder, mailbox.exists, mailbox.unseen
        );
        Ok(MailboxInfo {
            name: folder,
            exists: mailbox.exists,
            unseen_hint: mailbox.unseen,
        })
    }

    async fn list_unseen(&mut self) -> Result<Vec<MessageId>> {
        let limit = self.config.timeouts.search();
        let session = self.selected_session()?;

        let found = bounded("search", limit, async {
            session
                .uid_search("UNSEEN")
                .await
                .map_err(|e| MailError::ProtocolError(e.to_string()))
        })
        .await?;

        let mut ids: Vec<MessageId> = found.into_iter().map(MessageId).collect();
        ids.sort_unstable();
        debug!("Found {} unseen messages by UID", ids.len());
        Ok(ids)
    }

    async fn fetch_raw(&mut self, id: MessageId) -> Result<Vec<u8>> {
        let limit = self.config.timeouts.fetch();
        let session = self.selected_session()?;

        debug!("Fetching message UID {}", id);
        bounded("fetch", limit, async {
            // BODY.PEEK[] leaves \Seen untouched until the ticket exists.
            let mut messages = session
                .uid_fetch(id.to_string(), "(UID BODY.PEEK[])")
                .await
                .map_err(|e| MailError::FetchFailed {
                    id,
                    reason: e.to_string(),
                })?;

            let mut responses = Vec::new();
            while let Some(item) = messages.next().await {
                let fetched = item.map_err(|e| MailError::FetchFailed {
                    id,
                    reason: e.to_string(),
                })?;
                responses.push((fetched.uid, fetched.body().map(|b| b.to_vec())));
            }

            body_for_uid(id, responses)
        })
        .await
    }

    async fn mark_seen(&mut self, id: MessageId) -> Result<()> {
        let limit = self.config.timeouts.store();
        let session = self.selected_session()?;

        bounded("store", limit, async {
            let mut updates = session
                .uid_store(id.to_string(), "+FLAGS (\\Seen)")
                .await
                .map_err(|e| MailError::FlagFailed {
                    id,
                    reason: e.to_string(),
                })?;
            while let Some(item) = updates.next().await {
                item.map_err(|e| MailError::FlagFailed {
                    id,
                    reason: e.to_string(),
                })?;
            }
            Ok(())
        })
        .await?;

        debug!("Marked message UID {} as seen", id);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.selected = false;
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        info!("Disconnecting from IMAP server");
        let limit = self.config.timeouts.logout();
        // The session is dropped on every path below, which closes the socket
        // even when LOGOUT fails or hangs.
        bounded("logout", limit, async {
            session
                .logout()
                .await
                .map_err(|e| MailError::ProtocolError(e.to_string()))
        })
        .await
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("ImapClient dropped without explicit close - session will be closed");
        }
    }
}
