//! Normalizing a [`CommandSpec`] into runnable [`Task`]s

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::chunk::chunk_files;
use super::resolve::resolve_program;
use super::{Invocation, Task};
use crate::config::CommandSpec;
use crate::error::{ErrorCode, Result, StageGateError};

const FUNCTION_TASK_ERROR: &str = "Function task should return a string or an array of strings";

/// Where and how the tasks of one configuration run
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Directory of the configuration; tasks run here
    pub cwd: PathBuf,
    /// Repository top level; `git` commands run here
    pub top_level: PathBuf,
    pub max_arg_length: usize,
    /// Run through the system shell instead of spawning directly
    pub shell: bool,
}

/// A command line before it is split into invocations
#[derive(Debug)]
struct Resolved {
    command: String,
    title: Option<String>,
    provided: bool,
}

fn function_task_error(message: impl Into<String>) -> StageGateError {
    StageGateError::validation_with_code(ErrorCode::VALIDATION_FUNCTION_TASK, message, None)
}

fn empty_command_error() -> StageGateError {
    StageGateError::validation_with_code(
        ErrorCode::VALIDATION_EMPTY_COMMAND,
        "Commands should not be empty",
        None,
    )
}

fn function_commands(value: Value) -> Result<Vec<String>> {
    match value {
        Value::String(command) => Ok(vec![command]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(command) => Ok(command),
                _ => Err(function_task_error(FUNCTION_TASK_ERROR)),
            })
            .collect(),
        _ => Err(function_task_error(FUNCTION_TASK_ERROR)),
    }
}

fn normalize<'a>(
    spec: &'a CommandSpec,
    files: &'a [String],
    title: Option<&'a str>,
    out: &'a mut Vec<Resolved>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        match spec {
            CommandSpec::Literal(command) => out.push(Resolved {
                command: command.clone(),
                title: title.map(str::to_string),
                provided: true,
            }),
            CommandSpec::Sequence(specs) => {
                for spec in specs {
                    normalize(spec, files, title, out).await?;
                }
            }
            CommandSpec::Titled { title, spec } => {
                normalize(spec, files, Some(title.as_str()), out).await?;
            }
            CommandSpec::Dynamic(generator) => {
                // The generator owns its copy; nothing it does reaches `files`
                let value = generator
                    .generate(files.to_vec())
                    .await
                    .map_err(|e| function_task_error(format!("Function task failed: {e:#}")))?;
                for command in function_commands(value)? {
                    out.push(Resolved {
                        command,
                        title: title.map(str::to_string),
                        provided: false,
                    });
                }
            }
        }
        Ok(())
    }
    .boxed()
}

fn is_git(program: &str) -> bool {
    let name = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program)
        .to_ascii_lowercase();
    name == "git" || name == "git.exe"
}

fn task_cwd(program: &str, options: &TaskOptions) -> PathBuf {
    if is_git(program) {
        options.top_level.clone()
    } else {
        options.cwd.clone()
    }
}

/// Length of `program` and `args` as they appear on the command line, before
/// any file is appended
fn base_length(program: &str, args: &[String]) -> usize {
    program.len() + args.iter().map(|arg| arg.len() + 1).sum::<usize>()
}

fn chunks_or_single(files: &[String], max_length: usize, base_length: usize) -> Vec<Vec<String>> {
    let chunks = chunk_files(files, max_length, base_length);
    if chunks.is_empty() {
        vec![Vec::new()]
    } else {
        chunks
    }
}

fn direct_invocations(
    command: &str,
    files: &[String],
    options: &TaskOptions,
) -> Result<(PathBuf, Vec<Invocation>)> {
    let parts = shell_words::split(command).map_err(|e| {
        StageGateError::validation(format!("Failed to parse command '{command}': {e}"))
    })?;
    let Some((program, args)) = parts.split_first() else {
        return Err(empty_command_error());
    };

    let cwd = task_cwd(program, options);
    let program = resolve_program(program, &cwd, &options.top_level);

    let base = base_length(&program, args);
    let invocations = chunks_or_single(files, options.max_arg_length, base)
        .into_iter()
        .map(|chunk| Invocation {
            program: program.clone(),
            args: args.to_vec(),
            files: chunk,
            cwd: cwd.clone(),
        })
        .collect();
    Ok((cwd, invocations))
}

fn shell_program() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

fn shell_invocations(command: &str, files: &[String], options: &TaskOptions) -> (PathBuf, Vec<Invocation>) {
    let first_word = command.split_whitespace().next().unwrap_or(command);
    let cwd = task_cwd(first_word, options);
    let (shell, flag) = shell_program();

    let quoted: Vec<String> = files
        .iter()
        .map(|file| shell_words::quote(file).into_owned())
        .collect();

    let base = base_length(shell, &[flag.to_string(), command.to_string()]);
    let invocations = chunks_or_single(&quoted, options.max_arg_length, base)
        .into_iter()
        .map(|chunk| {
            let script = if chunk.is_empty() {
                command.to_string()
            } else {
                format!("{} {}", command, chunk.join(" "))
            };
            Invocation {
                program: shell.to_string(),
                args: vec![flag.to_string(), script],
                files: Vec::new(),
                cwd: cwd.clone(),
            }
        })
        .collect();
    (cwd, invocations)
}

fn make_task(resolved: Resolved, files: &[String], options: &TaskOptions) -> Result<Task> {
    let command = resolved.command.trim();
    if command.is_empty() {
        return Err(empty_command_error());
    }

    let files: &[String] = if resolved.provided { files } else { &[] };
    let (cwd, invocations) = if options.shell {
        shell_invocations(command, files, options)
    } else {
        direct_invocations(command, files, options)?
    };

    Ok(Task {
        title: resolved.title.unwrap_or_else(|| command.to_string()),
        command: command.to_string(),
        invocations,
        should_be_provided_paths: resolved.provided,
        cwd,
    })
}

/// Build the tasks for one pattern.
///
/// `files` are the matched paths as tasks should receive them. Function
/// commands are called once here, each with its own copy of `files`.
pub async fn build_tasks(
    spec: &CommandSpec,
    files: &[String],
    options: &TaskOptions,
) -> Result<Vec<Task>> {
    let mut resolved = Vec::new();
    normalize(spec, files, None, &mut resolved).await?;

    let tasks = resolved
        .into_iter()
        .map(|r| make_task(r, files, options))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Built {} task(s) for {} file(s) in {}",
        tasks.len(),
        files.len(),
        options.cwd.display()
    );
    Ok(tasks)
}
