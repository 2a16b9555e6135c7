//! Scratch repositories for tests
//!
//! Layout under one temp dir:
//! - `repos/owner/project`: the upstream
//! - `repos/<fork>/project`: forks created with [`Fixture::fork`]
//! - `scratch/`: parent for mirrors and build workspaces

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use super::mirror::Mirror;
use super::upstream::UpstreamRepo;

const BUILD_SCRIPT: &str = "#!/bin/sh\ncp VERSION insights.zip\n";
const BROKEN_SCRIPT: &str = "#!/bin/sh\necho 'setup.py: cannot build' >&2\nexit 3\n";

pub struct Fixture {
    dir: TempDir,
    upstream: Repository,
}

impl Fixture {
    /// Upstream with branches `main`, `feature`, `broken` and three tags
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scratch")).unwrap();

        let upstream = init_repo(&dir.path().join("repos/owner/project"));
        let fixture = Self { dir, upstream };

        let first = fixture.commit(
            "main",
            &[("VERSION", "main-1"), ("build.sh", BUILD_SCRIPT)],
            "initial",
        );
        fixture.branch("feature", first);
        fixture.commit("feature", &[("VERSION", "feature-1")], "feature work");
        fixture.branch("broken", first);
        fixture.commit("broken", &[("build.sh", BROKEN_SCRIPT)], "break the build");

        fixture.tag("insights-core-1.0.0", first);
        fixture.tag("falafel-0.9.0", first);
        fixture.tag("2.0.0", first);

        fixture
    }

    pub fn upstream(&self) -> UpstreamRepo {
        UpstreamRepo::parse(&self.upstream_path().display().to_string()).unwrap()
    }

    pub fn upstream_path(&self) -> PathBuf {
        self.dir.path().join("repos/owner/project")
    }

    /// Parent directory for mirrors and workspaces
    pub fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    pub fn mirror(&self) -> Mirror {
        Mirror::initialize(self.upstream(), &self.scratch()).unwrap()
    }

    /// Commit `files` on top of `branch` in the upstream, creating the branch if needed
    pub fn commit(&self, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
        commit_on(&self.upstream, branch, files, message)
    }

    pub fn branch(&self, name: &str, target: Oid) {
        let commit = self.upstream.find_commit(target).unwrap();
        self.upstream.branch(name, &commit, true).unwrap();
    }

    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.upstream.find_object(target, None).unwrap();
        self.upstream.tag_lightweight(name, &object, false).unwrap();
    }

    /// A fork owned by `owner` with one extra branch `<owner>-work`
    pub fn fork(&self, owner: &str) -> PathBuf {
        let path = self.dir.path().join("repos").join(owner).join("project");
        let fork = init_repo(&path);
        let work = format!("{}-work", owner);
        commit_on(
            &fork,
            "main",
            &[("VERSION", "fork-main"), ("build.sh", BUILD_SCRIPT)],
            "fork",
        );
        commit_on(&fork, &work, &[("VERSION", &work)], "work");
        path
    }

    /// Point tag `name` at the head of `branch` in `owner`'s fork, replacing any existing tag
    pub fn tag_fork(&self, owner: &str, name: &str, branch: &str) -> Oid {
        let path = self.dir.path().join("repos").join(owner).join("project");
        let fork = Repository::open(path).unwrap();
        let head = fork
            .find_reference(&format!("refs/heads/{}", branch))
            .unwrap()
            .peel_to_commit()
            .unwrap();
        fork.tag_lightweight(name, head.as_object(), true).unwrap();
        head.id()
    }

    /// Directories currently under the scratch root
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.scratch())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn init_repo(path: &Path) -> Repository {
    fs::create_dir_all(path).unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    Repository::init_opts(path, &opts).unwrap()
}

/// Commit to the repository at `path`; for threads that cannot share the fixture
pub fn commit_at(path: &Path, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
    commit_on(&Repository::open(path).unwrap(), branch, files, message)
}

fn commit_on(repo: &Repository, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let refname = format!("refs/heads/{}", branch);
    let parent = repo
        .find_reference(&refname)
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let parent_tree = parent.as_ref().map(|c| c.tree().unwrap());

    let mut builder = repo.treebuilder(parent_tree.as_ref()).unwrap();
    for (name, content) in files {
        let blob = repo.blob(content.as_bytes()).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(&refname), &sig, &sig, message, &tree, &parents).unwrap()
}
