//! Docker Compose port models and manifest helpers.
//!
//! Everything here is pure: the planner in `application::compose` does
//! the file I/O and port allocation around it.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Name of the generated override manifest, written next to the base one.
pub const OVERRIDE_FILENAME: &str = ".pa-compose-override.yml";

/// Manifest file names looked up in a project directory, in order.
pub const MANIFEST_FILENAMES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

// ============================================================================
// Port models
// ============================================================================

/// Transport protocol suffix of a port declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "tcp" => Ok(PortProtocol::Tcp),
            "udp" => Ok(PortProtocol::Udp),
            other => Err(Error::UnsupportedPortFormat(format!(
                "unknown protocol '{}'",
                other
            ))),
        }
    }
}

/// One declared `host:container` port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposePortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<PortProtocol>,
}

/// All port pairs declared by one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeServicePorts {
    pub service_name: String,
    pub ports: Vec<ComposePortMapping>,
}

/// A port pair after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedComposePort {
    #[serde(flatten)]
    pub mapping: ComposePortMapping,
    pub original_host_port: u16,
    pub new_host_port: u16,
}

impl AllocatedComposePort {
    pub fn new(mapping: ComposePortMapping, new_host_port: u16) -> Self {
        Self {
            mapping,
            original_host_port: mapping.host_port,
            new_host_port,
        }
    }

    /// Whether allocation moved this port away from its declared value.
    pub fn is_reassigned(&self) -> bool {
        self.original_host_port != self.new_host_port
    }

    /// `"<new>:<container>[/<protocol>]"` as written into the override file.
    pub fn override_entry(&self) -> String {
        match self.mapping.protocol {
            Some(protocol) => format!(
                "{}:{}/{}",
                self.new_host_port,
                self.mapping.container_port,
                protocol.as_str()
            ),
            None => format!("{}:{}", self.new_host_port, self.mapping.container_port),
        }
    }
}

/// The allocated ports of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedService {
    pub service_name: String,
    pub ports: Vec<AllocatedComposePort>,
}

impl AllocatedService {
    pub fn has_conflict(&self) -> bool {
        self.ports.iter().any(AllocatedComposePort::is_reassigned)
    }

    /// First allocated host port, used as the service's display port.
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.new_host_port)
    }
}

// ============================================================================
// Port string parsing
// ============================================================================

fn parse_port_number(value: &str, original: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| Error::UnsupportedPortFormat(original.to_string()))
}

/// Parse the short port syntax.
///
/// Supported forms, each with an optional `/tcp` or `/udp` suffix:
/// - `"3000"` → 3000:3000
/// - `"3000:8000"` → 3000:8000
/// - `"127.0.0.1:3000:8000"` → 3000:8000 (the IP is dropped)
pub fn parse_port_string(value: &str) -> Result<ComposePortMapping> {
    let (port_part, protocol) = match value.rsplit_once('/') {
        Some((ports, proto)) => (ports, Some(PortProtocol::parse(proto)?)),
        None => (value, None),
    };

    let parts: Vec<&str> = port_part.split(':').collect();
    let (host, container) = match parts.as_slice() {
        [single] => {
            let port = parse_port_number(single, value)?;
            (port, port)
        }
        [host, container] => (
            parse_port_number(host, value)?,
            parse_port_number(container, value)?,
        ),
        [_ip, host, container] => (
            parse_port_number(host, value)?,
            parse_port_number(container, value)?,
        ),
        _ => return Err(Error::UnsupportedPortFormat(value.to_string())),
    };

    Ok(ComposePortMapping {
        host_port: host,
        container_port: container,
        protocol,
    })
}

fn yaml_port(value: &Value, original: &Value) -> Result<u16> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| Error::UnsupportedPortFormat(describe(original))),
        Value::String(s) => parse_port_number(s, &describe(original)),
        _ => Err(Error::UnsupportedPortFormat(describe(original))),
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

/// Parse one entry of a service's `ports` list (short or long syntax).
pub fn parse_port_entry(entry: &Value) -> Result<ComposePortMapping> {
    match entry {
        Value::String(s) => parse_port_string(s),
        Value::Number(_) => {
            let port = yaml_port(entry, entry)?;
            Ok(ComposePortMapping {
                host_port: port,
                container_port: port,
                protocol: None,
            })
        }
        Value::Mapping(map) => {
            let target = map
                .get("target")
                .ok_or_else(|| Error::UnsupportedPortFormat(describe(entry)))
                .and_then(|t| yaml_port(t, entry))?;
            let published = match map.get("published") {
                Some(Value::Null) | None => None,
                Some(p) => Some(yaml_port(p, entry)?),
            };
            let protocol = match map.get("protocol") {
                Some(Value::String(p)) => Some(PortProtocol::parse(p)?),
                Some(Value::Null) | None => None,
                Some(_) => return Err(Error::UnsupportedPortFormat(describe(entry))),
            };
            Ok(ComposePortMapping {
                host_port: published.unwrap_or(target),
                container_port: target,
                protocol,
            })
        }
        _ => Err(Error::UnsupportedPortFormat(describe(entry))),
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// A parsed Compose manifest.
#[derive(Debug, Clone)]
pub struct ComposeManifest {
    services: Mapping,
}

impl ComposeManifest {
    /// Parse manifest text. The document must be a mapping; a missing
    /// `services` key yields a manifest without services.
    pub fn parse(content: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| Error::InvalidManifest(e.to_string()))?;

        let Value::Mapping(mut root) = document else {
            return Err(Error::InvalidManifest(
                "top level is not a mapping".to_string(),
            ));
        };

        let services = match root.remove("services") {
            Some(Value::Mapping(services)) => services,
            Some(Value::Null) | None => Mapping::new(),
            Some(_) => {
                return Err(Error::InvalidManifest(
                    "'services' is not a mapping".to_string(),
                ))
            }
        };

        Ok(Self { services })
    }

    /// Service names in declaration order.
    pub fn service_names(&self) -> Vec<String> {
        self.services
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect()
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Port mappings declared by one service. Missing `ports` means none.
    pub fn service_ports(&self, name: &str) -> Result<Vec<ComposePortMapping>> {
        let service = self
            .services
            .get(name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))?;

        match service.get("ports") {
            Some(Value::Sequence(entries)) => entries.iter().map(parse_port_entry).collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(Error::UnsupportedPortFormat(describe(other))),
        }
    }

    /// Port mappings of the requested services (all services when the list
    /// is empty), skipping services that publish nothing.
    pub fn all_service_ports(&self, requested: &[String]) -> Result<Vec<ComposeServicePorts>> {
        let targets = if requested.is_empty() {
            self.service_names()
        } else {
            requested.to_vec()
        };

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for service_name in targets {
            if !seen.insert(service_name.clone()) {
                continue;
            }
            let ports = self.service_ports(&service_name)?;
            if !ports.is_empty() {
                result.push(ComposeServicePorts {
                    service_name,
                    ports,
                });
            }
        }
        Ok(result)
    }
}

// ============================================================================
// Command helpers
// ============================================================================

static COMPOSE_INVOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"docker\s+compose\b").unwrap());

static SERVICE_SUBCOMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"docker\s+compose\s+(up|start|run)\b(.*)").unwrap());

/// Options of `up` and `run` whose value is the next token.
const VALUE_OPTIONS: &[&str] = &[
    "-t",
    "--timeout",
    "--wait-timeout",
    "--scale",
    "--pull",
    "--attach",
    "--no-attach",
    "--exit-code-from",
    "-e",
    "--env",
    "-p",
    "--publish",
    "-w",
    "--workdir",
    "-u",
    "--user",
    "-l",
    "--label",
    "-v",
    "--volume",
    "--name",
    "--entrypoint",
    "--cap-add",
    "--cap-drop",
];

/// Service names named after the `up`, `start` or `run` subcommand.
///
/// Flags and the values of options that take one are skipped. For `run`
/// only the first positional token is a service; the rest is the command
/// executed inside the container.
pub fn extract_service_names(command: &str) -> Vec<String> {
    let Some(caps) = SERVICE_SUBCOMMAND.captures(command) else {
        return Vec::new();
    };
    let single = &caps[1] == "run";

    let mut services = Vec::new();
    let mut tokens = caps[2].split_whitespace();
    while let Some(token) = tokens.next() {
        if token.starts_with('-') {
            // `--timeout=10` carries its value inline.
            if VALUE_OPTIONS.contains(&token) {
                tokens.next();
            }
            continue;
        }
        services.push(token.to_string());
        if single {
            break;
        }
    }
    services
}

/// Render the override manifest for the given services.
///
/// Ports use the `!override` tag so the runtime replaces the base list
/// instead of appending to it.
pub fn generate_override_yaml(services: &[AllocatedService]) -> String {
    let mut yaml = String::from("services:\n");
    for service in services {
        yaml.push_str(&format!("  {}:\n", service.service_name));
        yaml.push_str("    ports: !override\n");
        for port in &service.ports {
            yaml.push_str(&format!("      - \"{}\"\n", port.override_entry()));
        }
    }
    yaml
}

/// Layer the override file over the base manifest.
///
/// `docker compose up -d web` becomes
/// `docker compose -f docker-compose.yml -f .pa-compose-override.yml up -d web`.
pub fn transform_compose_command(command: &str, manifest_filename: &str) -> String {
    let Some(found) = COMPOSE_INVOCATION.find(command) else {
        return command.to_string();
    };

    let (head, rest) = command.split_at(found.end());
    let rest = strip_layered_files(rest, manifest_filename);
    format!(
        "{} -f {} -f {}{}",
        head, manifest_filename, OVERRIDE_FILENAME, rest
    )
}

/// Drop leading `-f <manifest>` / `-f <override>` pairs left by an earlier
/// rewrite so the files are never layered twice.
fn strip_layered_files<'a>(rest: &'a str, manifest_filename: &str) -> Cow<'a, str> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut skip = 0;
    while tokens.get(skip) == Some(&"-f")
        && tokens
            .get(skip + 1)
            .is_some_and(|file| *file == manifest_filename || *file == OVERRIDE_FILENAME)
    {
        skip += 2;
    }

    if skip == 0 {
        return rest.into();
    }
    tokens[skip..]
        .iter()
        .map(|token| format!(" {}", token))
        .collect::<String>()
        .into()
}
