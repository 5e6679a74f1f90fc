//! Registry Service - owns the registry on one task.
//!
//! Connection handlers hold a cloneable [`RegistryHandle`] and send
//! [`Command`]s; the service applies them one at a time, so mutations are
//! mutually exclusive and every list observes a consistent snapshot.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{Registry, VmRecord};
use crate::error::RegistryError;

const COMMAND_QUEUE: usize = 32;

/// Commands that can be sent to the Registry Service.
#[derive(Debug)]
pub enum Command {
    List {
        responder: oneshot::Sender<Vec<VmRecord>>,
    },
    Create {
        name: String,
        memory_mib: i64,
        responder: oneshot::Sender<Result<u32, RegistryError>>,
    },
    Info {
        id: u32,
        responder: oneshot::Sender<Result<VmRecord, RegistryError>>,
    },
    Destroy {
        id: u32,
        responder: oneshot::Sender<Result<(), RegistryError>>,
    },
}

/// Owner of the registry.
pub struct RegistryService {
    command_rx: mpsc::Receiver<Command>,
    registry: Registry,
}

impl RegistryService {
    /// Create the service and a handle connected to it.
    pub fn new(registry: Registry) -> (Self, RegistryHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        (
            Self {
                command_rx,
                registry,
            },
            RegistryHandle { command_tx },
        )
    }

    /// Spawn the service on the current runtime.
    pub fn spawn(registry: Registry) -> RegistryHandle {
        let (service, handle) = Self::new(registry);
        tokio::spawn(service.run());
        handle
    }

    /// Run until every handle has been dropped.
    pub async fn run(mut self) {
        debug!(capacity = self.registry.capacity(), "Registry service running");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        debug!(vms = self.registry.len(), "Registry service stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::List { responder } => {
                let _ = responder.send(self.registry.list());
            }
            Command::Create {
                name,
                memory_mib,
                responder,
            } => {
                let result = self.registry.create(&name, memory_mib);
                if let Ok(id) = result {
                    info!(id, name = %name, memory_mib, "VM created");
                }
                let _ = responder.send(result);
            }
            Command::Info { id, responder } => {
                let _ = responder.send(self.registry.info(id));
            }
            Command::Destroy { id, responder } => {
                let result = self.registry.destroy(id);
                if result.is_ok() {
                    info!(id, "VM destroyed");
                }
                let _ = responder.send(result);
            }
        }
    }
}

/// Cloneable client side of the Registry Service.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    command_tx: mpsc::Sender<Command>,
}

impl RegistryHandle {
    pub async fn list(&self) -> Result<Vec<VmRecord>, RegistryError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::List { responder }).await?;
        rx.await.map_err(|_| RegistryError::Unavailable)
    }

    pub async fn create(&self, name: String, memory_mib: i64) -> Result<u32, RegistryError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Create {
            name,
            memory_mib,
            responder,
        })
        .await?;
        rx.await.map_err(|_| RegistryError::Unavailable)?
    }

    pub async fn info(&self, id: u32) -> Result<VmRecord, RegistryError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Info { id, responder }).await?;
        rx.await.map_err(|_| RegistryError::Unavailable)?
    }

    pub async fn destroy(&self, id: u32) -> Result<(), RegistryError> {
        let (responder, rx) = oneshot::channel();
        self.send(Command::Destroy { id, responder }).await?;
        rx.await.map_err(|_| RegistryError::Unavailable)?
    }

    async fn send(&self, cmd: Command) -> Result<(), RegistryError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| RegistryError::Unavailable)
    }
}
