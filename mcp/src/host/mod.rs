mod session;
mod stdio;
mod transport;

pub use self::session::ServerSession;
pub use self::stdio::StdioTransport;
pub use self::transport::Transport;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use gemini_core::FunctionDeclaration;
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::config::AdapterConfig;
use crate::error::McpError;
use crate::launch::LaunchSpec;

#[derive(Debug, Default)]
struct RegistryState {
    // Acquisition order; cleanup walks it backwards
    sessions: Vec<Arc<ServerSession>>,
}

impl RegistryState {
    fn contains(&self, server_id: &str) -> bool {
        self.sessions.iter().any(|s| s.server_id() == server_id)
    }
}

/// Owns the live tool-server sessions and keeps the catalog in step with them.
///
/// Topology changes (connect, disconnect, refresh, cleanup) are serialized on
/// one lock. Readers never take it: they work from catalog snapshots.
#[derive(Debug)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
    catalog: Arc<ToolCatalog>,
    initialize_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            catalog: Arc::new(ToolCatalog::new(config.collision_policy)),
            initialize_timeout: config.initialize_timeout(),
        }
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// Launches a tool-server script, performs the handshake and registers its
    /// tools. Returns the descriptors the catalog accepted from this server.
    pub async fn connect(
        &self,
        server_id: &str,
        spec: &LaunchSpec,
        env: Option<&HashMap<String, String>>,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut state = self.state.lock().await;
        if state.contains(server_id) {
            return Err(McpError::DuplicateServerId(server_id.to_string()));
        }
        let profile = spec.profile()?;

        let transport = StdioTransport::launch(server_id, &profile, spec, env).await?;
        self.attach_locked(&mut state, server_id, Arc::new(transport))
            .await
    }

    /// Registers a session over an already established transport.
    pub async fn attach(
        &self,
        server_id: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut state = self.state.lock().await;
        if state.contains(server_id) {
            return Err(McpError::DuplicateServerId(server_id.to_string()));
        }
        self.attach_locked(&mut state, server_id, transport).await
    }

    async fn attach_locked(
        &self,
        state: &mut RegistryState,
        server_id: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let session = Arc::new(ServerSession::new(server_id, transport));

        let handshake = match tokio::time::timeout(self.initialize_timeout, session.initialize()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "no response to initialize within {}s",
                self.initialize_timeout.as_secs()
            )),
        };
        if let Err(message) = handshake {
            release(&session).await;
            return Err(McpError::HandshakeFailed {
                server_id: server_id.to_string(),
                message,
            });
        }

        let catalog = match self.catalog.rebuild_adding(&state.sessions, &session).await {
            Ok(catalog) => catalog,
            Err(e) => {
                release(&session).await;
                return Err(e);
            }
        };

        state.sessions.push(session);
        let published = self.catalog.publish(catalog);

        let accepted: Vec<ToolDescriptor> = published.owned_by(server_id).cloned().collect();
        info!(
            "Connected to server '{}' with tools: {:?}",
            server_id,
            accepted.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );
        Ok(accepted)
    }

    /// Removes a server and its tools. Unknown ids are ignored.
    pub async fn disconnect(&self, server_id: &str) -> Result<(), McpError> {
        let mut state = self.state.lock().await;
        let Some(index) = state.sessions.iter().position(|s| s.server_id() == server_id) else {
            return Ok(());
        };

        let session = state.sessions.remove(index);
        // Stop routing to it before the transport goes away
        self.catalog
            .publish(self.catalog.snapshot().without_server(server_id));
        release(&session).await;

        if let Err(e) = self.catalog.refresh(&state.sessions).await {
            warn!(
                "Refresh after disconnecting '{}' failed, keeping pruned catalog: {}",
                server_id, e
            );
        }
        info!("Disconnected from server '{}'", server_id);
        Ok(())
    }

    /// Re-lists every live server's tools and republishes the catalog.
    pub async fn refresh(&self) -> Result<(), McpError> {
        let state = self.state.lock().await;
        self.catalog.refresh(&state.sessions).await?;
        Ok(())
    }

    /// Releases every session in reverse acquisition order and clears all
    /// state. Failures are collected; the remaining sessions are still released.
    pub async fn cleanup(&self) -> Result<(), McpError> {
        let mut state = self.state.lock().await;
        let sessions = std::mem::take(&mut state.sessions);
        self.catalog.clear();

        let mut failures = Vec::new();
        for session in sessions.iter().rev() {
            if let Err(e) = session.close().await {
                error!("Failed to release server '{}': {}", session.server_id(), e);
                failures.push((session.server_id().to_string(), e.to_string()));
            }
        }

        if failures.is_empty() {
            if !sessions.is_empty() {
                info!("Released {} server(s)", sessions.len());
            }
            Ok(())
        } else {
            Err(McpError::CleanupFailed(failures))
        }
    }

    pub fn connected_server_ids(&self) -> BTreeSet<String> {
        self.catalog
            .snapshot()
            .server_ids()
            .map(str::to_string)
            .collect()
    }

    /// Function declarations of one connected server, or `None` if unknown.
    pub fn server_tools(&self, server_id: &str) -> Option<Vec<FunctionDeclaration>> {
        let catalog = self.catalog.snapshot();
        catalog.session(server_id)?;
        Some(
            catalog
                .owned_by(server_id)
                .map(ToolDescriptor::function_declaration)
                .collect(),
        )
    }
}

async fn release(session: &ServerSession) {
    if let Err(e) = session.close().await {
        warn!("Failed to release server '{}': {}", session.server_id(), e);
    }
}
