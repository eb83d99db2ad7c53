//! Command recognition and port injection.
//!
//! A static, ordered rule table maps raw shell command strings onto the
//! tool conventions we know how to rewrite. The first rule with a matching
//! pattern wins, so framework rules sit above the generic ones that would
//! also match (e.g. `next` before `node`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::mapping::InjectionType;

/// Port used when no rule matches and none was requested.
pub const DEFAULT_PORT: u16 = 3000;

/// Environment variable set by the env strategy.
pub const PORT_ENV_VAR: &str = "PORT";

/// Tool name reported when no rule matches.
pub const UNKNOWN_TOOL: &str = "unknown";

// ============================================================================
// Strategy
// ============================================================================

/// How a rule applies a port to its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Leave the command alone and export `PORT`.
    Env,
    /// Append `<flag> <port>` after removing earlier occurrences.
    ///
    /// With `separator`, the pair is passed through a package manager's
    /// `--` so it reaches the wrapped script instead of the wrapper.
    Flag {
        flag: &'static str,
        separator: bool,
    },
    /// Append the port as the last positional argument, after removing a
    /// port token that directly follows `anchor`.
    Arg {
        anchor: &'static str,
        host_port: bool,
    },
    /// Ports come from the Compose manifest; the command is left untouched.
    Compose,
}

impl Strategy {
    pub fn injection_type(&self) -> InjectionType {
        match self {
            Strategy::Env => InjectionType::Env,
            Strategy::Flag { .. } => InjectionType::Flag,
            Strategy::Arg { .. } => InjectionType::Arg,
            Strategy::Compose => InjectionType::Compose,
        }
    }

    /// Rewrite `command` so the tool binds `port`.
    pub fn apply(&self, command: &str, port: u16) -> String {
        match *self {
            Strategy::Env | Strategy::Compose => command.to_string(),
            Strategy::Flag { flag, separator } => {
                let mut tokens = tokenize(command);
                if separator {
                    remove_sequence(&mut tokens, &["--", flag]);
                    tokens.extend(["--".to_string(), flag.to_string(), port.to_string()]);
                } else {
                    remove_sequence(&mut tokens, &[flag]);
                    tokens.extend([flag.to_string(), port.to_string()]);
                }
                tokens.join(" ")
            }
            Strategy::Arg { anchor, host_port } => {
                let mut tokens = tokenize(command);
                if let Some(idx) = tokens.iter().position(|t| t == anchor) {
                    let next = idx + 1;
                    if next < tokens.len() && is_port_token(&tokens[next], host_port) {
                        tokens.remove(next);
                    }
                }
                tokens.push(port.to_string());
                tokens.join(" ")
            }
        }
    }
}

fn tokenize(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_port_token(token: &str, allow_host: bool) -> bool {
    if is_numeric(token) {
        return true;
    }
    if !allow_host {
        return false;
    }
    match token.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                && is_numeric(port)
        }
        None => false,
    }
}

/// Remove every occurrence of `prefix` followed by a numeric token.
fn remove_sequence(tokens: &mut Vec<String>, prefix: &[&str]) {
    let span = prefix.len() + 1;
    let mut i = 0;
    while i + span <= tokens.len() {
        let matches = prefix
            .iter()
            .enumerate()
            .all(|(offset, expected)| tokens[i + offset] == *expected)
            && is_numeric(&tokens[i + prefix.len()]);
        if matches {
            tokens.drain(i..i + span);
        } else {
            i += 1;
        }
    }
}

// ============================================================================
// Rule table
// ============================================================================

/// One recognized tool convention.
#[derive(Debug)]
pub struct CommandRule {
    pub name: &'static str,
    patterns: Vec<Regex>,
    pub strategy: Strategy,
    /// Conventional port of the tool; `None` when ports come from elsewhere.
    pub default_port: Option<u16>,
}

impl CommandRule {
    fn new(
        name: &'static str,
        patterns: &[&str],
        strategy: Strategy,
        default_port: Option<u16>,
    ) -> Self {
        Self {
            name,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("built-in command pattern is valid"))
                .collect(),
            strategy,
            default_port,
        }
    }

    pub fn matches(&self, command: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(command))
    }
}

const PORT_FLAG: Strategy = Strategy::Flag {
    flag: "--port",
    separator: false,
};

static RULES: LazyLock<Vec<CommandRule>> = LazyLock::new(|| {
    vec![
        CommandRule::new(
            "next",
            &[r"\bnext\s+dev\b", r"\bnext\s+start\b", r"\bnext\b"],
            Strategy::Env,
            Some(3000),
        ),
        CommandRule::new(
            "node",
            &[r"\bnode\s+\S+\.js\b", r"\bnode\s+\S+\.mjs\b", r"\bnode\s+\S+\.cjs\b"],
            Strategy::Env,
            Some(3000),
        ),
        CommandRule::new("vite", &[r"\bvite\b"], PORT_FLAG, Some(5173)),
        CommandRule::new(
            "npm-dev",
            &[r"\bnpm\s+run\s+dev\b"],
            Strategy::Flag {
                flag: "--port",
                separator: true,
            },
            Some(5173),
        ),
        CommandRule::new(
            "yarn-dev",
            &[r"\byarn\s+run\s+dev\b", r"\byarn\s+dev\b"],
            PORT_FLAG,
            Some(5173),
        ),
        CommandRule::new(
            "pnpm-dev",
            &[r"\bpnpm\s+run\s+dev\b", r"\bpnpm\s+dev\b"],
            PORT_FLAG,
            Some(5173),
        ),
        CommandRule::new("uvicorn", &[r"\buvicorn\b"], PORT_FLAG, Some(8000)),
        CommandRule::new("fastapi", &[r"\bfastapi\s+(dev|run)\b"], PORT_FLAG, Some(8000)),
        CommandRule::new("flask", &[r"\bflask\s+run\b"], PORT_FLAG, Some(5000)),
        CommandRule::new(
            "http-server",
            &[r"\bhttp-server\b"],
            Strategy::Flag {
                flag: "-p",
                separator: false,
            },
            Some(8080),
        ),
        CommandRule::new(
            "http.server",
            &[r"python3?\s+-m\s+http\.server"],
            Strategy::Arg {
                anchor: "http.server",
                host_port: false,
            },
            Some(8000),
        ),
        CommandRule::new(
            "django",
            &[r"manage\.py\s+runserver"],
            Strategy::Arg {
                anchor: "runserver",
                host_port: true,
            },
            Some(8000),
        ),
        CommandRule::new(
            "docker-compose",
            &[r"docker\s+compose\s+(up|start|run)\b"],
            Strategy::Compose,
            None,
        ),
    ]
});

/// The ordered rule table.
pub fn rules() -> &'static [CommandRule] {
    &RULES
}

/// Find the first rule matching `command`.
pub fn classify(command: &str) -> Option<&'static CommandRule> {
    rules().iter().find(|rule| rule.matches(command))
}

/// Conventional port of the tool `command` runs.
///
/// Unrecognized commands fall back to [`DEFAULT_PORT`]; Compose commands
/// return `None` because their ports come from the manifest.
pub fn default_port(command: &str) -> Option<u16> {
    match classify(command) {
        Some(rule) => rule.default_port,
        None => Some(DEFAULT_PORT),
    }
}

// ============================================================================
// Injection
// ============================================================================

/// The rewritten command and environment overlay for one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionResult {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub injection_type: InjectionType,
    pub tool_name: String,
}

/// Rewrite `command` (or its environment) so the tool binds `port`.
///
/// Unrecognized commands get the env strategy with tool name `unknown`.
pub fn inject(command: &str, port: u16) -> InjectionResult {
    let Some(rule) = classify(command) else {
        return InjectionResult {
            command: command.to_string(),
            env: port_env(port),
            injection_type: InjectionType::Env,
            tool_name: UNKNOWN_TOOL.to_string(),
        };
    };

    let env = match rule.strategy {
        Strategy::Env => port_env(port),
        _ => BTreeMap::new(),
    };

    InjectionResult {
        command: rule.strategy.apply(command, port),
        env,
        injection_type: rule.strategy.injection_type(),
        tool_name: rule.name.to_string(),
    }
}

fn port_env(port: u16) -> BTreeMap<String, String> {
    BTreeMap::from([(PORT_ENV_VAR.to_string(), port.to_string())])
}
