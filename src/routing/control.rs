use std::net::Ipv4Addr;
use std::process::Command;

use log::debug;

use crate::endpoint::ExecPrefix;
use crate::error::ControlError;

/// Installs forwarding state on simulated hosts. Calls are best effort; the caller logs
/// failures and moves on.
pub trait EndpointControl {
    fn install_route(
        &mut self,
        on_host: &str,
        destination: Ipv4Addr,
        via: Ipv4Addr,
    ) -> Result<(), ControlError>;
}

impl<T: EndpointControl + ?Sized> EndpointControl for &mut T {
    fn install_route(
        &mut self,
        on_host: &str,
        destination: Ipv4Addr,
        via: Ipv4Addr,
    ) -> Result<(), ControlError> {
        (**self).install_route(on_host, destination, via)
    }
}

/// Installs host routes with `ip route replace <dst>/32 via <gw>` inside the host.
#[derive(Debug, Clone, Default)]
pub struct CommandControl {
    prefix: ExecPrefix,
}

impl CommandControl {
    pub fn new(prefix: ExecPrefix) -> Self {
        Self { prefix }
    }

    fn route_argv(&self, on_host: &str, destination: Ipv4Addr, via: Ipv4Addr) -> Vec<String> {
        let destination = format!("{}/32", destination);
        let via = via.to_string();
        self.prefix.argv(
            on_host,
            &["ip", "route", "replace", destination.as_str(), "via", via.as_str()],
        )
    }
}

impl EndpointControl for CommandControl {
    fn install_route(
        &mut self,
        on_host: &str,
        destination: Ipv4Addr,
        via: Ipv4Addr,
    ) -> Result<(), ControlError> {
        let argv = self.route_argv(on_host, destination, via);
        let Some((program, args)) = argv.split_first() else {
            return Err(ControlError::EmptyCommand);
        };
        debug!("{}: {}", on_host, argv.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ControlError::Spawn {
                host: on_host.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ControlError::CommandFailed {
                host: on_host.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
