//! The process-wide server registry.
//!
//! Several logical clients talking to the same server share one engine and
//! one set of name-resolution caches. The registry maps the server address
//! to that shared state, creating it (and dialing the endpoint) on first
//! use. A single registry lock covers lookup-or-insert, so at most one
//! engine ever exists per address.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use tokio::sync::Mutex;

use lyskom_protocol::types::ConfNo;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;

static SERVERS: LazyLock<Mutex<HashMap<String, Arc<KomServer>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Shared per-endpoint state: the engine plus the name caches.
///
/// The caches are never populated by the engine itself; code built on top
/// feeds them (typically from `lookup-z-name` results) via the `learn_*`
/// operations. Lookups against an unpopulated cache simply miss.
pub struct KomServer {
    address: String,
    connection: Arc<Connection>,
    /// Name to person number. Locked independently of the conference cache
    /// so lookups of different kinds never contend.
    persons: RwLock<HashMap<String, ConfNo>>,
    /// Name to conference number.
    conferences: RwLock<HashMap<String, ConfNo>>,
}

impl KomServer {
    /// Wraps an existing connection without registering it globally, and
    /// starts its dispatcher. For tests and custom dialers; clients made
    /// this way share state only with clones of the returned handle.
    pub fn detached(connection: Arc<Connection>) -> Arc<Self> {
        let server = Arc::new(Self {
            address: connection.peer().to_string(),
            connection,
            persons: RwLock::new(HashMap::new()),
            conferences: RwLock::new(HashMap::new()),
        });
        spawn_dispatcher(server.connection.clone());
        server
    }

    /// The server address this entry was created for.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Looks up a person number by name. A miss means the cache has not
    /// been taught the name, not that the person does not exist.
    pub fn lookup_person(&self, name: &str) -> Option<ConfNo> {
        self.persons
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(name)
            .copied()
    }

    /// Looks up a conference number by name.
    pub fn lookup_conference(&self, name: &str) -> Option<ConfNo> {
        self.conferences
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(name)
            .copied()
    }

    /// Teaches the person cache a name.
    pub fn learn_person(&self, name: &str, number: ConfNo) {
        self.persons
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(name.to_string(), number);
    }

    /// Teaches the conference cache a name.
    pub fn learn_conference(&self, name: &str, number: ConfNo) {
        self.conferences
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(name.to_string(), number);
    }

    /// Fires the engine's shutdown signal. Pending calls are abandoned.
    pub fn shutdown(&self) {
        tracing::debug!(address = %self.address, "shutting down server entry");
        self.connection.shutdown();
    }
}

/// Returns the registry entry for `address`, dialing the endpoint and
/// starting its dispatcher if this is the first request for it.
pub async fn get_server(address: &str) -> Result<Arc<KomServer>, ClientError> {
    let mut servers = SERVERS.lock().await;
    if let Some(server) = servers.get(address) {
        return Ok(server.clone());
    }

    let connection = Arc::new(Connection::connect(ConnectionConfig::new(address)).await?);
    spawn_dispatcher(connection.clone());
    let server = Arc::new(KomServer {
        address: address.to_string(),
        connection,
        persons: RwLock::new(HashMap::new()),
        conferences: RwLock::new(HashMap::new()),
    });
    servers.insert(address.to_string(), server.clone());
    tracing::debug!(address, "server entry created");
    Ok(server)
}

/// Removes the entry for `address` and shuts its engine down. Returns
/// whether an entry existed. Existing `KomServer` handles stay valid but
/// their calls will fail once the dispatcher has stopped.
pub async fn shutdown_server(address: &str) -> bool {
    let removed = SERVERS.lock().await.remove(address);
    match removed {
        Some(server) => {
            server.shutdown();
            true
        }
        None => false,
    }
}

fn spawn_dispatcher(connection: Arc<Connection>) {
    tokio::spawn(async move {
        match connection.read_loop().await {
            Ok(()) => tracing::debug!(peer = %connection.peer(), "dispatcher stopped"),
            Err(e) => tracing::error!(peer = %connection.peer(), error = %e, "dispatcher died"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_are_independent_and_start_empty() {
        let (local, _remote) = tokio::io::duplex(64);
        let server = KomServer::detached(Arc::new(Connection::from_stream(local, "test")));

        assert_eq!(server.lookup_person("x"), None);
        assert_eq!(server.lookup_conference("x"), None);

        server.learn_person("x", 1);
        assert_eq!(server.lookup_person("x"), Some(1));
        assert_eq!(server.lookup_conference("x"), None);

        server.learn_conference("x", 2);
        assert_eq!(server.lookup_person("x"), Some(1));
        assert_eq!(server.lookup_conference("x"), Some(2));
    }

    #[tokio::test]
    async fn get_server_deduplicates_per_address() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            // Keep accepted sockets alive so the engines stay connected.
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let first = get_server(&address).await.unwrap();
        let second = get_server(&address).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.address(), address);

        assert!(shutdown_server(&address).await);
        assert!(!shutdown_server(&address).await);

        // A fresh request after shutdown dials a new engine.
        let third = get_server(&address).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        shutdown_server(&address).await;
    }
}
