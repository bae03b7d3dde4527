/// vw process launcher
///
/// Builds `<executable> <options>` by splitting the option string on
/// whitespace, so option values cannot contain spaces. Only stderr is kept:
/// that is where vw writes its progress table and summary. The exit code is
/// not inspected; success is decided from the captured text.
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{ExecutorError, Result};
use crate::logging::{operations, status};

#[derive(Debug, Clone)]
pub struct Launcher {
    executable: PathBuf,
    no_run: bool,
}

impl Launcher {
    /// Resolve `executable` through `PATH`, falling back to the literal path.
    pub fn new(executable: impl AsRef<Path>, no_run: bool) -> Self {
        let executable = executable.as_ref();
        let resolved = which::which(executable).unwrap_or_else(|e| {
            warn!(
                executable = %executable.display(),
                error = %e,
                "could not resolve executable, trying as-is"
            );
            executable.to_path_buf()
        });

        Self {
            executable: resolved,
            no_run,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Whether process execution is disabled (cache-only mode).
    pub fn no_run(&self) -> bool {
        self.no_run
    }

    pub fn command_line(&self, args: &str) -> String {
        format!("{} {}", self.executable.display(), args)
    }

    /// Run the executable to completion and return its stderr.
    ///
    /// Blocks until the process exits; there is no timeout.
    pub fn invoke(&self, args: &str) -> Result<String> {
        debug!(
            operation = operations::VW_EXEC,
            command = %self.command_line(args),
            "executing"
        );
        let start = Instant::now();

        let output = Command::new(&self.executable)
            .args(args.split_whitespace())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| {
                warn!(
                    operation = operations::VW_EXEC,
                    status = status::ERROR,
                    executable = %self.executable.display(),
                    error = %source,
                    "failed to spawn"
                );
                ExecutorError::Spawn {
                    executable: self.executable.clone(),
                    source,
                }
            })?;

        debug!(
            operation = operations::VW_EXEC,
            status = status::SUCCESS,
            exit_code = output.status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis() as u64,
            "process finished"
        );

        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("tool.sh");
        fs::write(&script, body).unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[test]
    fn test_invoke_captures_stderr_only() {
        let temp = TempDir::new().unwrap();
        let script = write_script(
            temp.path(),
            "#!/usr/bin/env bash\necho \"to stdout\"\necho \"args: $*\" >&2\n",
        );

        let launcher = Launcher::new(&script, false);
        let captured = launcher.invoke("-d  data.txt   --quiet").unwrap();

        assert_eq!(captured, "args: -d data.txt --quiet\n");
    }

    #[test]
    fn test_exit_code_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "#!/usr/bin/env bash\necho failing >&2\nexit 3\n");

        let captured = Launcher::new(&script, false).invoke("").unwrap();

        assert_eq!(captured, "failing\n");
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let launcher = Launcher::new(temp.path().join("missing-vw"), false);

        let err = launcher.invoke("-d data.txt").unwrap_err();

        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }
}
