use std::path::Path;

use crate::subprocess::ProcessCommand;

/// Assembles a [`ProcessCommand`] as `program args... files...`.
///
/// File paths always come last; the count is kept so logs can tell
/// configured arguments from matched files.
pub struct ProcessCommandBuilder {
    program: String,
    args: Vec<String>,
    files: Vec<String>,
    working_dir: Option<std::path::PathBuf>,
}

impl ProcessCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            files: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Paths appended after every argument, in order
    pub fn files(mut self, files: &[String]) -> Self {
        self.files.extend_from_slice(files);
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> ProcessCommand {
        let file_args = self.files.len();
        let mut args = self.args;
        args.extend(self.files);
        ProcessCommand {
            program: self.program,
            args,
            working_dir: self.working_dir,
            file_args,
        }
    }
}
