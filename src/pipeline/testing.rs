//! Test support: an installed copy of `fixtures/fake_vw.sh`.

use std::fs;
use std::path::{Path, PathBuf};

const FAKE_VW: &str = include_str!("../../fixtures/fake_vw.sh");

pub struct FakeVw {
    path: PathBuf,
}

impl FakeVw {
    /// Install the fake executable into `dir`. Its invocation log lives next to it.
    pub fn new(dir: &Path) -> Self {
        let path = dir.join("fake_vw.sh");
        fs::write(&path, FAKE_VW).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
        }

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Argument lines of every invocation so far.
    pub fn invocations(&self) -> Vec<String> {
        let log = self.path.with_file_name("invocations.log");
        fs::read_to_string(log)
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
