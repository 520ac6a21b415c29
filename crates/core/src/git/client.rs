//! Local Git working-tree operations via `git2`.
//!
//! This is the version-control-primitive capability the sync strategies
//! drive: stage/commit/push for local dominance, fetch/reset/clean for
//! remote dominance, plus the open/clone/init trio used at bootstrap.

use std::path::{Path, PathBuf};

use git2::{
    build::CheckoutBuilder, BranchType, Cred, FetchOptions, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository, ResetType, Signature, StatusOptions,
};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Initialize a new repository at `path`.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        info!(path = %path.display(), "initializing git repository");
        let repo = Repository::init(path)?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Clone a remote repository to `path`.
    #[instrument(skip(token), fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path, token: Option<&str>) -> Result<Self, GitError> {
        info!("cloning git repository");
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(auth_callbacks(token));
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        let repo = builder.clone(url, path)?;
        info!("clone completed");
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Register a remote. Errors if a remote with that name already exists.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo.remote(name, url)?;
        info!(name, url, "registered remote");
        Ok(())
    }

    /// Whether a remote with the given name is configured.
    pub fn has_remote(&self, name: &str) -> bool {
        self.repo.find_remote(name).is_ok()
    }

    /// Stage all working-tree changes (additions, modifications, deletions).
    pub fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        debug!("staged all changes");
        Ok(())
    }

    /// Whether the working tree or index differs from HEAD, counting
    /// untracked files.
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    /// Create a commit from the current index state.
    ///
    /// Uses the repository's configured identity, falling back to a
    /// service identity when none is set.
    #[instrument(skip(self, message))]
    pub fn commit(&self, message: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self
            .repo
            .signature()
            .or_else(|_| Signature::now("gitmirror", "gitmirror@localhost"))?;
        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        info!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Push a local branch to a remote. With `force`, remote history is
    /// overwritten unconditionally.
    #[instrument(skip(self, token))]
    pub fn push(
        &self,
        remote_name: &str,
        branch: &str,
        force: bool,
        token: Option<&str>,
    ) -> Result<(), GitError> {
        info!(remote = remote_name, branch, force, "pushing");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut callbacks = auth_callbacks(token);

        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let prefix = if force { "+" } else { "" };
        let refspec = format!("{prefix}refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[&refspec], Some(&mut push_opts))?;
        if let Some(err_msg) = push_error.lock().unwrap().take() {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail: err_msg,
            });
        }
        info!("push completed");
        Ok(())
    }

    /// Fetch all refs from a named remote.
    #[instrument(skip(self, token))]
    pub fn fetch(&self, remote_name: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(auth_callbacks(token));
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Hard-reset the working tree and index to the given reference
    /// (e.g. `refs/remotes/origin/main`).
    #[instrument(skip(self))]
    pub fn reset_hard(&self, reference: &str) -> Result<(), GitError> {
        let object = self
            .repo
            .revparse_single(reference)
            .map_err(|_| GitError::RefNotFound(reference.to_string()))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(&object, ResetType::Hard, Some(&mut checkout))?;
        info!(reference, "hard reset completed");
        Ok(())
    }

    /// Remove untracked files and directories from the working tree.
    pub fn clean_untracked(&self) -> Result<(), GitError> {
        let mut opts = StatusOptions::new();
        // Untracked directories show up as a single entry, so a whole
        // directory is removed in one go.
        opts.include_untracked(true).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut removed = 0usize;
        for entry in statuses.iter() {
            if !entry.status().contains(git2::Status::WT_NEW) {
                continue;
            }
            let Some(rel) = entry.path() else { continue };
            let full = self.repo_path.join(rel);
            let result = if full.is_dir() {
                std::fs::remove_dir_all(&full)
            } else {
                std::fs::remove_file(&full)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %full.display(), error = %e, "failed to remove untracked path"),
            }
        }
        debug!(removed, "removed untracked paths");
        Ok(())
    }

    /// Check out a branch, creating it from the current HEAD when it does
    /// not exist yet.
    #[instrument(skip(self))]
    pub fn checkout_branch(&self, branch: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{branch}");
        if self.repo.find_branch(branch, BranchType::Local).is_err() {
            match self.repo.head().and_then(|h| h.peel_to_commit()) {
                Ok(head_commit) => {
                    info!(branch, "creating branch from current state");
                    self.repo.branch(branch, &head_commit, false)?;
                }
                Err(_) => {
                    // Unborn HEAD (fresh init or clone of an empty remote):
                    // point HEAD at the branch so the first commit lands there.
                    info!(branch, "no commits yet, pointing HEAD at unborn branch");
                    self.repo.set_head(&refname)?;
                    return Ok(());
                }
            }
        }
        self.repo.set_head(&refname)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        debug!(branch, "checked out branch");
        Ok(())
    }

    /// Return the SHA of HEAD.
    pub fn head_sha(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}

/// Remote callbacks carrying token credentials, when configured.
fn auth_callbacks(token: Option<&str>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(tok) = token {
        let tok = tok.to_string();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext("x-access-token", &tok)
        });
    }
    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_and_commit(client: &GitClient, name: &str, content: &str) -> Oid {
        std::fs::write(client.repo_path().join(name), content).unwrap();
        client.stage_all().unwrap();
        client.commit(&format!("add {name}")).unwrap();
        Oid::from_str(&client.head_sha().unwrap()).unwrap()
    }

    #[test]
    fn test_init_stage_commit() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        assert!(!client.is_dirty().unwrap());

        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        assert!(client.is_dirty().unwrap());

        client.stage_all().unwrap();
        let oid = client.commit("initial commit").unwrap();
        assert!(!oid.is_zero());
        assert!(!client.is_dirty().unwrap());
        assert_eq!(client.head_sha().unwrap(), oid.to_string());
    }

    #[test]
    fn test_stage_all_picks_up_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        write_and_commit(&client, "a.txt", "a");

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        assert!(client.is_dirty().unwrap());
        client.stage_all().unwrap();
        client.commit("remove a").unwrap();
        assert!(!client.is_dirty().unwrap());
    }

    #[test]
    fn test_checkout_branch_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        write_and_commit(&client, "f.txt", "c");

        client.checkout_branch("mirror").unwrap();
        assert_eq!(
            client.repo.head().unwrap().shorthand().unwrap(),
            "mirror"
        );

        // Checking out an existing branch is a no-op path.
        client.checkout_branch("mirror").unwrap();
    }

    #[test]
    fn test_checkout_branch_on_unborn_head() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        client.checkout_branch("main").unwrap();

        std::fs::write(dir.path().join("first.txt"), "x").unwrap();
        client.stage_all().unwrap();
        client.commit("first").unwrap();
        assert_eq!(client.repo.head().unwrap().shorthand().unwrap(), "main");
    }

    #[test]
    fn test_push_fetch_reset_roundtrip_via_local_bare() {
        let dir = tempfile::tempdir().unwrap();
        let bare_path = dir.path().join("remote.git");
        Repository::init_bare(&bare_path).unwrap();

        let work = dir.path().join("work");
        let client = GitClient::init(&work).unwrap();
        client.checkout_branch("main").unwrap();
        client
            .add_remote("origin", bare_path.to_str().unwrap())
            .unwrap();
        assert!(client.has_remote("origin"));

        write_and_commit(&client, "a.txt", "v1");
        client.push("origin", "main", true, None).unwrap();

        let bare = Repository::open_bare(&bare_path).unwrap();
        assert!(bare.find_reference("refs/heads/main").is_ok());

        client.fetch("origin", None).unwrap();
        client.reset_hard("refs/remotes/origin/main").unwrap();
    }

    #[test]
    fn test_reset_hard_missing_ref() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        let result = client.reset_hard("refs/remotes/origin/missing");
        assert!(matches!(result, Err(GitError::RefNotFound(_))));
    }

    #[test]
    fn test_clean_untracked_removes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path()).unwrap();
        write_and_commit(&client, "tracked.txt", "keep");

        std::fs::write(dir.path().join("junk.txt"), "junk").unwrap();
        std::fs::create_dir(dir.path().join("junkdir")).unwrap();
        std::fs::write(dir.path().join("junkdir/inner.txt"), "junk").unwrap();

        client.clean_untracked().unwrap();
        assert!(dir.path().join("tracked.txt").exists());
        assert!(!dir.path().join("junk.txt").exists());
        assert!(!dir.path().join("junkdir").exists());
    }

    #[test]
    fn test_repo_not_found() {
        assert!(matches!(
            GitClient::open("/nonexistent"),
            Err(GitError::RepositoryNotFound(_))
        ));
    }
}
