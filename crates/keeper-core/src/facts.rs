//! Host facts for templates
//!
//! Gathered once at the start of a run and held immutable for it.

use std::io::ErrorKind;
use std::net::SocketAddrV4;
use std::path::Path;
use std::process::Command;

use nix::ifaddrs::getifaddrs;
use nix::net::if_::if_nametoindex;
use nix::unistd::gethostname;
use tracing::{debug, info};

use crate::render::{NetIf, TemplateContext};
use crate::{Error, Result};

/// Builds a [`TemplateContext`] from the local host.
pub struct HostFacts;

impl HostFacts {
    /// Collect hostname, network interfaces and custom variables.
    ///
    /// `facts_command` is run from `repo_root`; if it does not exist the
    /// custom variables are empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Facts`] if the host cannot be inspected, or the facts
    /// command fails or prints anything other than a JSON object.
    pub fn gather(repo_root: &Path, facts_command: Option<&Path>) -> Result<TemplateContext> {
        let context = TemplateContext {
            hostname: hostname()?,
            network: interfaces()?,
            x: custom_variables(repo_root, facts_command)?,
        };
        info!(
            hostname = %context.hostname,
            interfaces = context.network.len(),
            custom = context.x.len(),
            "gathered host facts"
        );
        Ok(context)
    }
}

fn facts_error(message: impl Into<String>) -> Error {
    Error::Facts {
        message: message.into(),
    }
}

fn hostname() -> Result<String> {
    gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .map_err(|e| facts_error(format!("hostname: {e}")))
}

/// Interfaces in the order the kernel lists them, addresses grouped by name.
fn interfaces() -> Result<Vec<NetIf>> {
    let addrs = getifaddrs().map_err(|e| facts_error(format!("network interfaces: {e}")))?;

    let mut network: Vec<NetIf> = Vec::new();
    for ifaddr in addrs {
        let position = match network.iter().position(|i| i.name == ifaddr.interface_name) {
            Some(position) => position,
            None => {
                network.push(NetIf {
                    index: if_nametoindex(ifaddr.interface_name.as_str()).unwrap_or(0),
                    name: ifaddr.interface_name.clone(),
                    ..NetIf::default()
                });
                network.len() - 1
            }
        };
        let iface = &mut network[position];

        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(inet) = address.as_sockaddr_in() {
            iface.ip4addrs.push(SocketAddrV4::from(*inet).ip().to_string());
        } else if let Some(mac) = address.as_link_addr().and_then(|link| link.addr())
            && mac != [0; 6]
        {
            iface.hwaddr = format_mac(mac);
        }
    }
    Ok(network)
}

fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn custom_variables(
    repo_root: &Path,
    command: Option<&Path>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let Some(command) = command else {
        return Ok(serde_json::Map::new());
    };

    let output = match Command::new(command).current_dir(repo_root).output() {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(command = %command.display(), "no facts command");
            return Ok(serde_json::Map::new());
        }
        Err(e) => return Err(facts_error(format!("{}: {e}", command.display()))),
    };

    if !output.status.success() {
        return Err(facts_error(format!(
            "{} exited with {}: {}",
            command.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| facts_error(format!("{} printed invalid JSON: {e}", command.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("myenvs");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn mac_is_lowercase_colon_separated() {
        assert_eq!(
            format_mac([0x52, 0x54, 0x00, 0xab, 0xCD, 0x0f]),
            "52:54:00:ab:cd:0f"
        );
    }

    #[test]
    fn missing_facts_command_gives_empty_variables() {
        let dir = tempfile::tempdir().unwrap();
        let vars = custom_variables(dir.path(), Some(&dir.path().join("myenvs"))).unwrap();
        assert!(vars.is_empty());
        assert!(custom_variables(dir.path(), None).unwrap().is_empty());
    }

    #[test]
    fn facts_command_output_becomes_variables() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = script(dir.path(), r#"echo '{"role": "db", "replicas": 3}'"#);

        let vars = custom_variables(dir.path(), Some(&cmd)).unwrap();
        assert_eq!(vars["role"], serde_json::json!("db"));
        assert_eq!(vars["replicas"], serde_json::json!(3));
    }

    #[test]
    fn failing_facts_command_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = script(dir.path(), "echo boom >&2; exit 3");

        let err = custom_variables(dir.path(), Some(&cmd)).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("boom"), "got: {err}");
    }

    #[test]
    fn invalid_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = script(dir.path(), "echo not-json");

        assert!(custom_variables(dir.path(), Some(&cmd)).unwrap_err().is_fatal());
    }

    #[test]
    fn host_has_a_hostname_and_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let context = HostFacts::gather(dir.path(), None).unwrap();
        assert!(!context.hostname.is_empty());
        assert!(context.network.iter().any(|iface| iface.name == "lo"));
    }
}
