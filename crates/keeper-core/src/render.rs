//! Template rendering
//!
//! Template entries are rendered with [minijinja] against a
//! [`TemplateContext`] gathered once per run. Undefined variables are hard
//! errors. Two helpers are available to templates:
//!
//! - `by_ifname(network, "eth0")` returns the named interface, or an empty
//!   interface (blank name, no addresses) if there is none
//! - `ifelse(flag, "yes|no")` picks the first or second `|`-separated value

use std::fs;
use std::path::Path;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One network interface as seen by templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetIf {
    pub index: u32,
    pub name: String,
    pub hwaddr: String,
    pub ip4addrs: Vec<String>,
}

/// Variables available to every template of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateContext {
    pub hostname: String,
    pub network: Vec<NetIf>,
    /// Custom variables from the facts command
    pub x: serde_json::Map<String, serde_json::Value>,
}

/// Renders template entries against a fixed context.
#[derive(Debug, Clone, Default)]
pub struct ContentRenderer {
    context: TemplateContext,
}

impl ContentRenderer {
    pub fn new(context: TemplateContext) -> Self {
        Self { context }
    }

    /// Read and render the template at `path`.
    pub fn render_file(&self, path: &Path) -> Result<String> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.render_str(path, &source)
    }

    /// Render template `source`; `path` names it in error messages.
    pub fn render_str(&self, path: &Path, source: &str) -> Result<String> {
        let name = path.display().to_string();
        environment()
            .render_named_str(&name, source, &self.context)
            .map_err(|e| Error::Render {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_function("by_ifname", by_ifname);
    env.add_function("ifelse", ifelse);
    env
}

fn by_ifname(network: Value, name: &str) -> std::result::Result<Value, minijinja::Error> {
    for iface in network.try_iter()? {
        if iface.get_attr("name")?.as_str() == Some(name) {
            return Ok(iface);
        }
    }
    Ok(Value::from_serialize(&NetIf::default()))
}

fn ifelse(flag: bool, values: &str) -> String {
    let mut fields = values.split('|');
    let when_true = fields.next().unwrap_or_default();
    let when_false = fields.next().unwrap_or(when_true);
    if flag { when_true } else { when_false }.to_string()
}
