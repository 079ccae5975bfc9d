pub mod exec;
pub mod fs;
pub mod git;
pub mod github;
pub mod gomod;

pub use exec::{CommandRunner, ExecError, ShellRunner};
pub use fs::FsError;
pub use git::{GitError, WorkingCopy};
pub use github::{GithubClient, GithubError};
pub use gomod::{DependencyManifest, GoModule, ModuleError};
