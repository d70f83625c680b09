use super::History;
use crate::utils::StoreError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Author and committer identity for snapshot commits.
#[derive(Debug, Clone)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// History backed by the `git` command line.
#[derive(Debug)]
pub struct GitHistory {
    root: PathBuf,
    committer: Committer,
}

impl GitHistory {
    /// Use the repository at `root`, running `git init` if there is none.
    pub fn open_or_init(root: &Path, committer: Committer) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root)?;
        let history = Self {
            root: root.to_path_buf(),
            committer,
        };

        if !root.join(".git").exists() {
            tracing::info!(root = %root.display(), "Initializing git repository");
            history.git(["init", "--quiet"])?;
        }
        Ok(history)
    }

    /// Number of commits reachable from HEAD.
    pub fn commit_count(&self) -> Result<usize, StoreError> {
        let out = self.git(["rev-list", "--count", "HEAD"])?;
        out.trim().parse().map_err(|e| StoreError::Git {
            command: "rev-list".into(),
            stderr: format!("unexpected output {out:?}: {e}"),
        })
    }

    fn git<I, S>(&self, args: I) -> Result<String, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .arg("-c")
            .arg(format!("user.name={}", self.committer.name))
            .arg("-c")
            .arg(format!("user.email={}", self.committer.email))
            .args(["-c", "commit.gpgsign=false"])
            // identities may contain glob characters such as `[` or `*`
            .arg("--literal-pathspecs")
            .args(&args)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(StoreError::Git {
                command: args
                    .first()
                    .map(|a| a.as_ref().to_string_lossy().into_owned())
                    .unwrap_or_default(),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl History for GitHistory {
    fn commit(&mut self, relative_path: &Path, message: &str) -> Result<String, StoreError> {
        let path = relative_path.as_os_str();
        self.git([OsStr::new("add"), OsStr::new("--"), path])?;
        self.git([
            OsStr::new("commit"),
            OsStr::new("--quiet"),
            OsStr::new("-m"),
            OsStr::new(message),
            OsStr::new("--"),
            path,
        ])?;
        let head = self.git(["rev-parse", "HEAD"])?;
        tracing::info!(path = %relative_path.display(), commit = %head.trim(), "Committed snapshot");
        Ok(head.trim().to_string())
    }
}
