//! Command Dispatcher - turns a protocol line into a response.

use tracing::debug;

use super::command::Request;
use super::response::Response;
use crate::VERSION;
use crate::error::CommandError;
use crate::registry::RegistryHandle;
use crate::shutdown::Shutdown;

/// Executes requests against the registry and the built-in commands.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: RegistryHandle,
    shutdown: Shutdown,
}

impl Dispatcher {
    pub fn new(registry: RegistryHandle, shutdown: Shutdown) -> Self {
        Self { registry, shutdown }
    }

    /// Handle one line. Always produces exactly one response.
    pub async fn handle_line(&self, line: &str) -> Response {
        match Request::parse(line) {
            Ok(request) => {
                let name = request.name();
                let response = self.execute(request).await.unwrap_or_else(Response::from);
                debug!(command = name, status = response.status().code(), "Request handled");
                response
            }
            Err(e) => {
                debug!(error = %e, "Request rejected");
                Response::from(e)
            }
        }
    }

    async fn execute(&self, request: Request) -> Result<Response, CommandError> {
        match request {
            Request::Ping => Ok(Response::ok("PONG")),
            Request::Version => Ok(Response::ok(format!("hostd {VERSION}"))),
            Request::Health => Ok(Response::ok("healthy")),
            Request::Echo(text) => Ok(Response::ok(text)),
            Request::Shutdown => {
                self.shutdown.trigger();
                Ok(Response::ok("bye"))
            }
            Request::VmList => {
                let vms = self.registry.list().await?;
                if vms.is_empty() {
                    return Ok(Response::ok("0 vms"));
                }
                let mut message = format!("{} vms", vms.len());
                for vm in &vms {
                    message.push_str(" | ");
                    message.push_str(&vm.to_string());
                }
                Ok(Response::ok(message))
            }
            Request::VmCreate { name, memory_mib } => {
                let id = self.registry.create(name, memory_mib).await?;
                Ok(Response::ok(format!("id={id}")))
            }
            Request::VmInfo { id } => {
                let vm = self.registry.info(id).await?;
                Ok(Response::ok(vm.to_string()))
            }
            Request::VmDestroy { id } => {
                self.registry.destroy(id).await?;
                Ok(Response::ok(format!("destroyed id={id}")))
            }
        }
    }
}
