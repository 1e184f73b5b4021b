use std::fs;
use std::path::Path;
use std::process::Command;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;

use super::ScmHandler;
use crate::component::{Auth, AuthMethod, Repository};
use crate::error::{Error, Result};

const REFSPEC_BRANCHES: &str = "+refs/heads/*:refs/remotes/origin/*";
const REFSPEC_TAGS: &str = "+refs/tags/*:refs/tags/*";

/// Git-backed handler using the system `git` command.
#[derive(Debug, Default)]
pub struct GitHandler;

impl GitHandler {
    pub fn new() -> Self {
        Self
    }
}

/// Extra `git -c` options carrying the credentials of `auth`.
///
/// Credentials always travel in an HTTP header so the URL handed to git,
/// and echoed back in its errors, stays clean.
fn auth_config(auth: Option<&Auth>) -> Result<Vec<String>> {
    let Some(auth) = auth else {
        return Ok(Vec::new());
    };
    let header = match auth.resolve()? {
        AuthMethod::Basic { user, password } | AuthMethod::Password { user, password } => {
            format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
        }
        AuthMethod::Token { token } => format!("Bearer {}", token),
    };
    Ok(vec![format!("http.extraHeader=Authorization: {}", header)])
}

/// Runs `git` with `args` and returns its trimmed stdout.
///
/// `display_url` names the repository in errors; it never carries credentials.
fn run_git(
    operation: &str,
    display_url: &str,
    path: &Path,
    config: &[String],
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<String> {
    let mut command = Command::new("git");
    for option in config {
        command.arg("-c").arg(option);
    }
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    // Never block on an interactive credential prompt.
    command.env("GIT_TERMINAL_PROMPT", "0");

    let output = command.output().map_err(|e| Error::Scm {
        operation: operation.to_string(),
        url: display_url.to_string(),
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Provide helpful error message for common auth failures
        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("could not read Username")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                Declare an `auth` block on the component, or configure SSH keys or\n\
                git credentials for the host.\n\
                Error: {}",
                stderr.trim()
            )
        } else {
            stderr.trim().to_string()
        };

        return Err(Error::Scm {
            operation: operation.to_string(),
            url: display_url.to_string(),
            path: path.display().to_string(),
            message,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// True if `git rev-parse --verify` resolves `reference` in `path`.
fn resolves(path: &Path, reference: &str) -> bool {
    Command::new("git")
        .args(["rev-parse", "--verify", "--quiet"])
        .arg(format!("{}^{{commit}}", reference))
        .current_dir(path)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn remote_url(path: &Path) -> Option<String> {
    Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(path)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn same_remote(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

impl ScmHandler for GitHandler {
    fn matches(&self, repository: &Repository, path: &Path) -> bool {
        if !path.join(".git").exists() {
            return false;
        }
        match remote_url(path) {
            Some(remote) => same_remote(&remote, repository.url.as_str()),
            None => false,
        }
    }

    fn fetch(&self, repository: &Repository, path: &Path, auth: Option<&Auth>) -> Result<()> {
        let url = repository.url.to_string();
        let config = auth_config(auth)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Cloning {} into {}", url, path.display());
        let target = path.to_string_lossy();
        run_git("clone", &url, path, &config, &["clone", &url, &target], None)?;
        Ok(())
    }

    fn update(&self, path: &Path, auth: Option<&Auth>) -> Result<()> {
        let display_url = remote_url(path).ok_or_else(|| Error::Scm {
            operation: "update".to_string(),
            url: String::new(),
            path: path.display().to_string(),
            message: "checkout has no origin remote".to_string(),
        })?;
        let config = auth_config(auth)?;

        debug!("Updating {} in {}", display_url, path.display());
        run_git(
            "update",
            &display_url,
            path,
            &config,
            &["fetch", "--prune", "origin", REFSPEC_BRANCHES, REFSPEC_TAGS],
            Some(path),
        )?;

        // Fast-forward the current branch, if any; a detached HEAD is left
        // for `switch` to move.
        let on_branch = run_git(
            "update",
            &display_url,
            path,
            &[],
            &["symbolic-ref", "--short", "HEAD"],
            Some(path),
        )
        .ok();
        if let Some(branch) = on_branch {
            let upstream = format!("refs/remotes/origin/{}", branch);
            if resolves(path, &upstream) {
                run_git(
                    "update",
                    &display_url,
                    path,
                    &[],
                    &["merge", "--ff-only", &upstream],
                    Some(path),
                )?;
            }
        }
        Ok(())
    }

    fn switch(&self, path: &Path, reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Ok(());
        }
        let display_url = remote_url(path).unwrap_or_default();

        // Raw refs are checked out as written.
        if reference.starts_with("refs/") {
            debug!("Checking out raw ref {} in {}", reference, path.display());
            run_git(
                "switch",
                &display_url,
                path,
                &[],
                &["checkout", "--detach", reference],
                Some(path),
            )?;
            return Ok(());
        }

        let tag = format!("refs/tags/{}", reference);
        if resolves(path, &tag) {
            debug!("Checking out tag {} in {}", reference, path.display());
            run_git(
                "switch",
                &display_url,
                path,
                &[],
                &["checkout", "--detach", &tag],
                Some(path),
            )?;
            return Ok(());
        }

        let branch = format!("refs/remotes/origin/{}", reference);
        if resolves(path, &branch) {
            debug!("Checking out branch {} in {}", reference, path.display());
            run_git(
                "switch",
                &display_url,
                path,
                &[],
                &["checkout", "-B", reference, &branch],
                Some(path),
            )?;
            return Ok(());
        }

        Err(Error::Scm {
            operation: "switch".to_string(),
            url: display_url,
            path: path.display().to_string(),
            message: format!("reference '{}' is neither a tag nor a remote branch", reference),
        })
    }
}
