//! The unified tool catalog.
//!
//! A [`Catalog`] is an immutable snapshot mapping tool names to their
//! descriptors together with the sessions that own them. [`ToolCatalog`] holds
//! the currently published snapshot; every refresh builds a brand-new catalog
//! and swaps it in whole, so readers holding an `Arc<Catalog>` never see a
//! half-updated mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use gemini_core::{FunctionDeclaration, RpcTool};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::config::CollisionPolicy;
use crate::error::McpError;
use crate::host::ServerSession;
use crate::schema::{empty_object_schema, normalize_schema};

/// A callable tool as seen by the model, tagged with the server that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Normalized input schema
    pub parameter_schema: Value,
    pub owning_server_id: String,
}

impl ToolDescriptor {
    pub fn from_rpc(tool: RpcTool, owning_server_id: &str) -> Self {
        let parameter_schema = tool
            .input_schema
            .as_ref()
            .map(normalize_schema)
            .unwrap_or_else(empty_object_schema);

        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            parameter_schema,
            owning_server_id: owning_server_id.to_string(),
        }
    }

    pub fn function_declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.clone(),
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description.clone())
            },
            parameters: self.parameter_schema.clone(),
        }
    }
}

/// Immutable name -> descriptor mapping plus the live sessions it was built from.
#[derive(Clone, Default)]
pub struct Catalog {
    tools: BTreeMap<String, ToolDescriptor>,
    sessions: BTreeMap<String, Arc<ServerSession>>,
}

impl Catalog {
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn session(&self, server_id: &str) -> Option<&Arc<ServerSession>> {
        self.sessions.get(server_id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// True when at least one server is connected, even one with no tools.
    pub fn has_sessions(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn owned_by<'a>(&'a self, server_id: &'a str) -> impl Iterator<Item = &'a ToolDescriptor> {
        self.tools
            .values()
            .filter(move |tool| tool.owning_server_id == server_id)
    }

    /// Declarations for every tool, in name order.
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools
            .values()
            .map(ToolDescriptor::function_declaration)
            .collect()
    }

    /// Copy of this catalog with one server and all of its tools removed.
    pub fn without_server(&self, server_id: &str) -> Catalog {
        let mut pruned = self.clone();
        pruned.sessions.remove(server_id);
        pruned
            .tools
            .retain(|_, tool| tool.owning_server_id != server_id);
        pruned
    }
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.tools == other.tools && self.sessions.keys().eq(other.sessions.keys())
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("servers", &self.sessions.keys().collect::<Vec<_>>())
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Lists one session's tools and normalizes their schemas.
pub async fn fetch_tools(session: &ServerSession) -> Result<Vec<ToolDescriptor>, McpError> {
    let tools = session
        .list_tools()
        .await
        .map_err(|e| McpError::ToolListingFailed {
            server_id: session.server_id().to_string(),
            message: e.to_string(),
        })?;

    debug!(
        "Server '{}' lists {} tool(s)",
        session.server_id(),
        tools.len()
    );
    Ok(tools
        .into_iter()
        .map(|tool| ToolDescriptor::from_rpc(tool, session.server_id()))
        .collect())
}

/// Holder of the published catalog snapshot.
#[derive(Debug)]
pub struct ToolCatalog {
    published: RwLock<Arc<Catalog>>,
    policy: CollisionPolicy,
}

impl ToolCatalog {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            published: RwLock::new(Arc::new(Catalog::default())),
            policy,
        }
    }

    /// The currently published catalog. Never blocks on a refresh in progress.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches every session's tools and builds a new catalog without
    /// publishing it. Fails as a whole if any session fails to list.
    pub async fn rebuild(&self, sessions: &[Arc<ServerSession>]) -> Result<Catalog, McpError> {
        let mut fetched = Vec::with_capacity(sessions.len());
        for session in sessions {
            let tools = fetch_tools(session).await?;
            fetched.push((session.clone(), tools));
        }
        Ok(Self::build(self.policy, fetched))
    }

    /// Builds the catalog for `peers` plus a newly connected `session`, without
    /// publishing it. Only a listing failure of `session` fails the build; a
    /// peer that cannot list keeps the entries it has in the published catalog.
    pub async fn rebuild_adding(
        &self,
        peers: &[Arc<ServerSession>],
        session: &Arc<ServerSession>,
    ) -> Result<Catalog, McpError> {
        let added = fetch_tools(session).await?;

        let previous = self.snapshot();
        let mut fetched = Vec::with_capacity(peers.len() + 1);
        for peer in peers {
            let tools = match fetch_tools(peer).await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(
                        "Keeping the last known tools of server '{}': {}",
                        peer.server_id(),
                        e
                    );
                    previous.owned_by(peer.server_id()).cloned().collect()
                }
            };
            fetched.push((peer.clone(), tools));
        }
        fetched.push((session.clone(), added));
        Ok(Self::build(self.policy, fetched))
    }

    /// Assembles a catalog from per-session tool lists given in acquisition order.
    pub fn build(
        policy: CollisionPolicy,
        fetched: Vec<(Arc<ServerSession>, Vec<ToolDescriptor>)>,
    ) -> Catalog {
        let mut catalog = Catalog::default();

        for (session, tools) in fetched {
            for tool in tools {
                match catalog.tools.get(&tool.name) {
                    Some(existing) if policy == CollisionPolicy::KeepFirst => {
                        warn!(
                            "Tool '{}' from server '{}' collides with the one from '{}'; keeping '{}'",
                            tool.name,
                            tool.owning_server_id,
                            existing.owning_server_id,
                            existing.owning_server_id
                        );
                    }
                    Some(existing) => {
                        warn!(
                            "Tool '{}' from server '{}' replaces the one from '{}'",
                            tool.name, tool.owning_server_id, existing.owning_server_id
                        );
                        catalog.tools.insert(tool.name.clone(), tool);
                    }
                    None => {
                        catalog.tools.insert(tool.name.clone(), tool);
                    }
                }
            }
            catalog
                .sessions
                .insert(session.server_id().to_string(), session);
        }

        catalog
    }

    pub(crate) fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = catalog.clone();
        info!(
            "Catalog published: {} tool(s) from {} server(s)",
            catalog.len(),
            catalog.sessions.len()
        );
        catalog
    }

    /// Rebuilds from `sessions` and publishes the result. On failure the
    /// published catalog is left untouched.
    pub async fn refresh(&self, sessions: &[Arc<ServerSession>]) -> Result<Arc<Catalog>, McpError> {
        let catalog = self.rebuild(sessions).await?;
        Ok(self.publish(catalog))
    }

    pub(crate) fn clear(&self) {
        self.publish(Catalog::default());
    }
}
