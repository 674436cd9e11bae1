use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Matches commands that stage files themselves
static GIT_ADD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgit\s+add\b").expect("Valid regex pattern"));

/// Produces commands at run time from the matched file list.
///
/// The result must be a string or an array of strings. Each receives its own
/// copy of the file list, so mutating it has no effect on the run.
#[async_trait]
pub trait DynamicCommand: Send + Sync {
    async fn generate(&self, files: Vec<String>) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F> DynamicCommand for F
where
    F: Fn(Vec<String>) -> anyhow::Result<Value> + Send + Sync,
{
    async fn generate(&self, files: Vec<String>) -> anyhow::Result<Value> {
        self(files)
    }
}

/// What to run for one pattern
#[derive(Clone)]
pub enum CommandSpec {
    /// A single command line
    Literal(String),
    /// Commands run one after another
    Sequence(Vec<CommandSpec>),
    /// Commands generated from the matched files
    Dynamic(Arc<dyn DynamicCommand>),
    /// A command with a custom display title
    Titled { title: String, spec: Box<CommandSpec> },
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Literal(command) => f.debug_tuple("Literal").field(command).finish(),
            CommandSpec::Sequence(specs) => f.debug_tuple("Sequence").field(specs).finish(),
            CommandSpec::Dynamic(_) => f.write_str("Dynamic(<function>)"),
            CommandSpec::Titled { title, spec } => f
                .debug_struct("Titled")
                .field("title", title)
                .field("spec", spec)
                .finish(),
        }
    }
}

impl CommandSpec {
    pub fn literal(command: impl Into<String>) -> Self {
        CommandSpec::Literal(command.into())
    }

    pub fn dynamic<F>(generator: F) -> Self
    where
        F: Fn(Vec<String>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        CommandSpec::Dynamic(Arc::new(generator))
    }

    pub fn titled(title: impl Into<String>, spec: CommandSpec) -> Self {
        CommandSpec::Titled {
            title: title.into(),
            spec: Box::new(spec),
        }
    }

    /// Interpret a configuration value
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(command) => {
                if command.trim().is_empty() {
                    Err("commands should not be empty strings".to_string())
                } else {
                    Ok(CommandSpec::Literal(command.clone()))
                }
            }
            Value::Array(items) => {
                if items.is_empty() {
                    return Err("command arrays should not be empty".to_string());
                }
                items
                    .iter()
                    .map(CommandSpec::from_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map(CommandSpec::Sequence)
            }
            Value::Object(object) => match (object.get("title"), object.get("task")) {
                (Some(Value::String(title)), Some(task)) => {
                    Ok(CommandSpec::titled(title.clone(), CommandSpec::from_value(task)?))
                }
                _ => Err("objects should have a string `title` and a `task`".to_string()),
            },
            other => Err(format!(
                "should be a string or an array of strings, got {}",
                value_kind(other)
            )),
        }
    }

    /// Whether any literal command stages files itself
    pub fn uses_git_add(&self) -> bool {
        match self {
            CommandSpec::Literal(command) => GIT_ADD_REGEX.is_match(command),
            CommandSpec::Sequence(specs) => specs.iter().any(CommandSpec::uses_git_add),
            CommandSpec::Dynamic(_) => false,
            CommandSpec::Titled { spec, .. } => spec.uses_git_add(),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl<'de> Deserialize<'de> for CommandSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        CommandSpec::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Ordered mapping of glob pattern to command
#[derive(Debug, Clone, Default)]
pub struct CommandMap(Vec<(String, CommandSpec)>);

impl CommandMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pattern: impl Into<String>, spec: CommandSpec) -> Self {
        self.0.push((pattern.into(), spec));
        self
    }

    pub fn from_value(value: &Value) -> Result<Self, String> {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(format!(
                    "configuration should be an object, got {}",
                    value_kind(other)
                ))
            }
        };

        if object.is_empty() {
            return Err("configuration should not be empty".to_string());
        }

        object
            .iter()
            .map(|(pattern, spec)| {
                CommandSpec::from_value(spec)
                    .map(|spec| (pattern.clone(), spec))
                    .map_err(|e| format!("invalid value for `{pattern}`: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CommandMap)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, CommandSpec)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn uses_git_add(&self) -> bool {
        self.0.iter().any(|(_, spec)| spec.uses_git_add())
    }
}

impl<'de> Deserialize<'de> for CommandMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        CommandMap::from_value(&value).map_err(serde::de::Error::custom)
    }
}
