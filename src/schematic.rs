//! Schematic loading - TOML declaration of the orders in a run
//!
//! ```toml
//! [settings]
//! halt-on-failure = true
//!
//! [[data]]
//! id = "port"
//! value = "8080"
//!
//! [[script]]
//! id = "serve"
//! source = "echo serving on #shared[port]"
//! ```
//!
//! Orders run in declaration order across all kinds unless an order sets an
//! explicit `sequence`. Declaration order comes from where each table sits in
//! the document, so string contents never affect it.

use anyhow::{Context, Result};
use orderkit::{
    BoxedOrder, DataOrder, EngineOptions, EnvOrder, FailurePolicy, Order, RestorePolicy, RunOrder,
    ScriptOrder,
};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use toml::Spanned;

/// Problems in a schematic that TOML decoding does not catch
#[derive(Debug, Error)]
pub enum SchematicError {
    #[error("{kind} order #{index} has an empty id")]
    EmptyId { kind: &'static str, index: usize },

    #[error("env order {id} lists an empty target")]
    EmptyTarget { id: String },
}

/// Where a schematic is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    /// Treat `http://` and `https://` locations as URLs, anything else as a path
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(PathBuf::from(shellexpand::tilde(location).as_ref()))
        }
    }

    /// Read the schematic text
    pub fn fetch(&self) -> Result<String> {
        match self {
            Self::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Could not read schematic file: {}", path.display())),
            Self::Url(url) => fetch_url(url),
        }
    }
}

fn fetch_url(url: &str) -> Result<String> {
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(url)
        .header("User-Agent", "fortress")
        .call()
        .with_context(|| format!("Failed to get schematic from {url}"))?;

    response
        .body_mut()
        .read_to_string()
        .with_context(|| format!("Failed to read schematic body from {url}"))
}

// ============================================================================
// Schema
// ============================================================================

/// Decoded schematic
#[derive(Debug, Default, Deserialize)]
pub struct Schematic {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub env: Vec<Spanned<EnvEntry>>,
    #[serde(default)]
    pub run: Vec<Spanned<RunEntry>>,
    #[serde(default)]
    pub script: Vec<Spanned<ScriptEntry>>,
    #[serde(default)]
    pub data: Vec<Spanned<DataEntry>>,
}

/// Optional `[settings]` table
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default)]
    pub halt_on_failure: bool,
    #[serde(default)]
    pub keep_scripts: bool,
    #[serde(default)]
    pub restore: RestorePolicy,
}

/// Fields shared by every order table
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Header {
    /// Explicit position, overriding declaration order
    #[serde(default)]
    pub sequence: Option<i64>,
    pub id: String,
    #[serde(default)]
    pub ignore_fail: bool,
    #[serde(default)]
    pub ignore_global: bool,
}

impl Header {
    fn to_order(&self, declared: i64) -> Order {
        Order::new(self.sequence.unwrap_or(declared), self.id.clone())
            .ignore_fail(self.ignore_fail)
            .ignore_global(self.ignore_global)
    }
}

#[derive(Debug, Deserialize)]
pub struct EnvEntry {
    #[serde(flatten)]
    pub header: Header,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunEntry {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub find: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScriptEntry {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataEntry {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub value: String,
}

impl Schematic {
    /// Load and decode a schematic from a file or URL
    pub fn load(source: &Source) -> Result<Self> {
        let text = source.fetch()?;
        Self::parse(&text)
    }

    /// Decode schematic text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid TOML format in schematic")
    }

    /// Engine options from the `[settings]` table
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            failure: if self.settings.halt_on_failure {
                FailurePolicy::Halt
            } else {
                FailurePolicy::Continue
            },
            restore: self.settings.restore,
            keep_scripts: self.settings.keep_scripts,
        }
    }

    /// Total number of declared orders
    pub fn len(&self) -> usize {
        self.env.len() + self.run.len() + self.script.len() + self.data.len()
    }

    /// Position of every order table in the document, ascending
    fn declaration_offsets(&self) -> Vec<usize> {
        let mut offsets: Vec<usize> = self
            .env
            .iter()
            .map(|e| e.span().start)
            .chain(self.run.iter().map(|e| e.span().start))
            .chain(self.script.iter().map(|e| e.span().start))
            .chain(self.data.iter().map(|e| e.span().start))
            .collect();
        offsets.sort_unstable();
        offsets
    }

    /// Build the orders, in declaration order
    ///
    /// Each order's default sequence is its declaration position across all
    /// kinds, counting from 0.
    pub fn into_orders(self) -> Result<Vec<BoxedOrder>, SchematicError> {
        let offsets = self.declaration_offsets();
        let position = |offset: usize| {
            offsets
                .binary_search(&offset)
                .unwrap_or_else(|insert_at| insert_at) as i64
        };
        let mut declared: Vec<(i64, BoxedOrder)> = Vec::with_capacity(offsets.len());

        for (index, entry) in self.env.into_iter().enumerate() {
            let at = position(entry.span().start);
            let entry = entry.into_inner();
            check_id("env", index, &entry.header)?;
            if entry.targets.iter().any(String::is_empty) {
                return Err(SchematicError::EmptyTarget {
                    id: entry.header.id,
                });
            }
            let order = EnvOrder::new(entry.header.to_order(at), entry.key, entry.value)
                .with_targets(entry.targets);
            declared.push((at, Box::new(order)));
        }

        for (index, entry) in self.run.into_iter().enumerate() {
            let at = position(entry.span().start);
            let entry = entry.into_inner();
            check_id("run", index, &entry.header)?;
            let order = RunOrder {
                order: entry.header.to_order(at),
                command: entry.command,
                args: entry.args,
                find: entry.find,
            };
            declared.push((at, Box::new(order)));
        }

        for (index, entry) in self.script.into_iter().enumerate() {
            let at = position(entry.span().start);
            let entry = entry.into_inner();
            check_id("script", index, &entry.header)?;
            let order = ScriptOrder {
                order: entry.header.to_order(at),
                source_dir: non_empty(entry.dir).map(|dir| expand_path(&dir)),
                shell: non_empty(entry.shell).map(|shell| expand_path(&shell)),
                source: entry.source,
                output_var: non_empty(entry.output),
            };
            declared.push((at, Box::new(order)));
        }

        for (index, entry) in self.data.into_iter().enumerate() {
            let at = position(entry.span().start);
            let entry = entry.into_inner();
            check_id("data", index, &entry.header)?;
            let order = DataOrder::new(entry.header.to_order(at), entry.value);
            declared.push((at, Box::new(order)));
        }

        declared.sort_by_key(|(at, _)| *at);
        Ok(declared.into_iter().map(|(_, order)| order).collect())
    }
}

fn check_id(kind: &'static str, index: usize, header: &Header) -> Result<(), SchematicError> {
    if header.id.trim().is_empty() {
        return Err(SchematicError::EmptyId { kind, index });
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
