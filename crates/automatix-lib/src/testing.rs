//! Test doubles for the command runner, shared by unit and integration tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::infrastructure::exec::{CommandRunner, DEFAULT_DIR, ExecError};

type Handler = Box<dyn Fn(&Path) -> Result<String, ExecError>>;

/// A command recorded by [`FakeRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub dir: PathBuf,
    pub command: String,
}

/// Records commands instead of running them. Commands matching a registered
/// prefix run the registered handler, all others succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<Call>>,
    handlers: Vec<(String, Handler)>,
}

impl FakeRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` with the working directory for commands starting with `prefix`.
    #[must_use]
    pub fn on<F>(mut self, prefix: &str, handler: F) -> Self
    where
        F: Fn(&Path) -> Result<String, ExecError> + 'static,
    {
        self.handlers.push((prefix.to_owned(), Box::new(handler)));
        self
    }

    /// Fail commands starting with `prefix` with exit `code`.
    #[must_use]
    pub fn fail_on(self, prefix: &str, code: i32) -> Self {
        self.on(prefix, move |dir| {
            Err(ExecError::Exit {
                command: "failing command".to_owned(),
                dir: dir.to_path_buf(),
                code,
                output: "simulated failure\n".to_owned(),
            })
        })
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.command.clone()).collect()
    }

    /// Commands run in `dir` or one of its subdirectories.
    #[must_use]
    pub fn commands_in(&self, dir: &Path) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.dir.starts_with(dir))
            .map(|c| c.command.clone())
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, dir: Option<&Path>, command: &str) -> Result<String, ExecError> {
        let dir = dir.map_or_else(|| PathBuf::from(DEFAULT_DIR), Path::to_path_buf);
        self.calls.borrow_mut().push(Call {
            dir: dir.clone(),
            command: command.to_owned(),
        });
        match self.handlers.iter().find(|(p, _)| command.starts_with(p)) {
            Some((_, handler)) => handler(&dir),
            None => Ok(String::new()),
        }
    }
}
