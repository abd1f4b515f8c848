//! SSH transport using russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::PrivateKeyWithHashAlg;
use russh::keys::ssh_key;
use russh::{Channel, ChannelMsg, Disconnect, client};
use tracing::{debug, info, instrument};

use crate::transport::{Connection, DialParams, Session, SessionOutput, Transport, TransportError};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no).
        // Only fit for throwaway test hosts.
        Ok(true)
    }
}

/// Dials hosts with russh and authenticates with a private key
#[derive(Clone, Default)]
pub struct RusshTransport {
    config: Arc<client::Config>,
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport").finish_non_exhaustive()
    }
}

impl RusshTransport {
    /// Create a transport with the default russh client config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport with a custom russh client config
    #[must_use]
    pub fn with_config(config: client::Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    type Connection = SshConnection;

    #[instrument(skip_all, fields(host = %params.host, port = params.port))]
    async fn dial(&self, params: &DialParams) -> Result<SshConnection, TransportError> {
        let mut handle = client::connect(
            Arc::clone(&self.config),
            (params.host.as_str(), params.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| TransportError::Dial(e.to_string()))?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();

        let auth_res = handle
            .authenticate_publickey(
                &params.user,
                PrivateKeyWithHashAlg::new(Arc::clone(&params.key), hash_alg),
            )
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;

        if !auth_res.success() {
            return Err(TransportError::Auth(format!(
                "public key authentication rejected for user {}",
                params.user
            )));
        }

        Ok(SshConnection {
            host: params.host.clone(),
            handle,
        })
    }
}

/// An authenticated russh client connection
pub struct SshConnection {
    host: String,
    handle: client::Handle<SshClientHandler>,
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SshConnection {
    type Session = SshSession;

    async fn open_session(&mut self) -> Result<SshSession, TransportError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        Ok(SshSession { channel })
    }

    async fn close(self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        info!(host = %self.host, "SSH disconnected");
        Ok(())
    }
}

/// One exec channel
pub struct SshSession {
    channel: Channel<client::Msg>,
}

#[async_trait]
impl Session for SshSession {
    async fn exec(&mut self, command: &str) -> Result<SessionOutput, TransportError> {
        let start = Instant::now();

        self.channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        let mut output = SessionOutput::default();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // Exit status may arrive after EOF, so read until the channel closes
        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.exit_status = Some(exit_status);
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    output.exit_signal = Some(format!("{signal_name:?}"));
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        output.stdout = String::from_utf8_lossy(&stdout).to_string();
        output.stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            exit_status = ?output.exit_status,
            duration = ?start.elapsed(),
            "remote command completed"
        );

        Ok(output)
    }

    async fn close(self) -> Result<(), TransportError> {
        self.channel
            .close()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))
    }
}
