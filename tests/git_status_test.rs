use anyhow::Result;
use gitbar::adapters::Git2Adapter;
use gitbar_core::ports::{AuthProbe, GitPort};
use gitbar_core::{
    aggregate, AuthSettings, FetchSettings, RepoStatus, RepositorySetScanner, StatusProbe,
    WidgetIcons, WidgetOutput,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct NoAuth;

impl AuthProbe for NoAuth {
    fn ssh_agent(&self) -> bool {
        false
    }

    fn cli_auth(&self) -> bool {
        false
    }
}

fn probe() -> StatusProbe<Git2Adapter, NoAuth> {
    StatusProbe::new(
        Git2Adapter::new(),
        NoAuth,
        AuthSettings::default(),
        FetchSettings::default(),
    )
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn commit_file(repo: &git2::Repository, name: &str, content: &str) -> Result<git2::Oid> {
    let workdir = repo.workdir().ok_or_else(|| anyhow::anyhow!("bare repository"))?;
    fs::write(workdir.join(name), content)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(name))?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let signature = git2::Signature::now("Test User", "test@example.com")?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    Ok(repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &format!("Add {}", name),
        &tree,
        &parents,
    )?)
}

fn create_test_git_repo(path: PathBuf) -> Result<git2::Repository> {
    fs::create_dir_all(&path)?;
    let git_repo = git2::Repository::init(&path)?;
    commit_file(&git_repo, "README.md", "# test\n")?;
    Ok(git_repo)
}

fn current_branch(repo: &git2::Repository) -> Result<String> {
    Ok(repo
        .head()?
        .shorthand()
        .ok_or_else(|| anyhow::anyhow!("unnamed branch"))?
        .to_string())
}

/// Point `origin/<branch>` at `upstream_oid` and make it the branch's
/// upstream. The remote URL is a local path, so no fetch is attempted.
fn track_origin(repo: &git2::Repository, upstream_oid: git2::Oid, remote_url: &str) -> Result<()> {
    let branch = current_branch(repo)?;
    repo.remote("origin", remote_url)?;
    repo.reference(
        &format!("refs/remotes/origin/{}", branch),
        upstream_oid,
        true,
        "test upstream",
    )?;
    repo.find_branch(&branch, git2::BranchType::Local)?
        .set_upstream(Some(&format!("origin/{}", branch)))?;
    Ok(())
}

#[test]
fn test_clean_repository() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("clean-repo");
    create_test_git_repo(path.clone())?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Clean);
    assert_eq!(result.name, "clean-repo");
    assert!(result.raw_statuses.is_empty());
    assert!(result.error.is_none());
    Ok(())
}

#[test]
fn test_modified_and_staged_files_are_uncommitted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("dirty-repo");
    let repo = create_test_git_repo(path.clone())?;

    fs::write(path.join("README.md"), "# changed\n")?;
    fs::write(path.join("staged.txt"), "staged content")?;
    let mut index = repo.index()?;
    index.add_path(Path::new("staged.txt"))?;
    index.write()?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Uncommitted);
    assert_eq!(result.details.uncommitted_count, Some(2));
    assert_eq!(result.details.untracked_count, None);
    Ok(())
}

#[test]
fn test_untracked_files_but_not_ignored_ones() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("untracked-repo");
    let repo = create_test_git_repo(path.clone())?;
    commit_file(&repo, ".gitignore", "*.log\n")?;

    fs::write(path.join("notes.txt"), "new")?;
    fs::write(path.join("build.log"), "ignored")?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Untracked);
    assert_eq!(result.details.untracked_count, Some(1));
    Ok(())
}

#[test]
fn test_modified_and_untracked_is_multiple() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("busy-repo");
    create_test_git_repo(path.clone())?;
    fs::write(path.join("README.md"), "# changed\n")?;
    fs::write(path.join("scratch.txt"), "new")?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Multiple);
    assert!(result.raw_statuses.contains(&RepoStatus::Uncommitted));
    assert!(result.raw_statuses.contains(&RepoStatus::Untracked));
    Ok(())
}

#[test]
fn test_unpushed_commits() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("ahead-repo");
    let repo = create_test_git_repo(path.clone())?;
    let base = repo.head()?.peel_to_commit()?.id();
    track_origin(&repo, base, &path_str(&temp_dir.path().join("origin")))?;

    commit_file(&repo, "a.txt", "a")?;
    commit_file(&repo, "b.txt", "b")?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Unpushed);
    assert_eq!(result.details.unpushed_count, Some(2));
    assert!(result.error.is_none());
    Ok(())
}

#[test]
fn test_upstream_available() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("behind-repo");
    let repo = create_test_git_repo(path.clone())?;
    let base = repo.head()?.peel_to_commit()?;
    let ahead = commit_file(&repo, "remote-change.txt", "from upstream")?;

    track_origin(&repo, ahead, &path_str(&temp_dir.path().join("origin")))?;
    repo.reset(base.as_object(), git2::ResetType::Hard, None)?;

    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::UpstreamAvailable);
    assert_eq!(result.details.upstream_count, Some(1));
    assert_eq!(result.details.unpushed_count, None);
    Ok(())
}

#[test]
fn test_detached_head_reports_no_sync_state() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("detached-repo");
    let repo = create_test_git_repo(path.clone())?;
    let base = repo.head()?.peel_to_commit()?.id();
    track_origin(&repo, base, &path_str(&temp_dir.path().join("origin")))?;
    let tip = commit_file(&repo, "a.txt", "a")?;
    repo.set_head_detached(tip)?;

    assert!(Git2Adapter::new().head_detached(&path)?);
    let result = probe().check_repository(&path_str(&path));
    assert_eq!(result.priority_status, RepoStatus::Clean);
    Ok(())
}

#[test]
fn test_branch_without_upstream_has_no_tracking_ref() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("local-repo");
    create_test_git_repo(path.clone())?;

    assert_eq!(Git2Adapter::new().tracking_ref(&path)?, None);
    Ok(())
}

#[test]
fn test_adapter_tracking_and_ranges() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("range-repo");
    let repo = create_test_git_repo(path.clone())?;
    let base = repo.head()?.peel_to_commit()?.id();
    let origin_url = path_str(&temp_dir.path().join("origin"));
    track_origin(&repo, base, &origin_url)?;
    commit_file(&repo, "a.txt", "a")?;

    let adapter = Git2Adapter::new();
    let tracking = adapter
        .tracking_ref(&path)?
        .ok_or_else(|| anyhow::anyhow!("expected tracking ref"))?;
    assert_eq!(tracking.remote, "origin");
    assert_eq!(tracking.upstream, format!("origin/{}", current_branch(&repo)?));

    assert_eq!(adapter.commits_between(&path, &tracking.ahead_range())?, 1);
    assert_eq!(adapter.commits_between(&path, &tracking.behind_range())?, 0);
    assert_eq!(adapter.remote_url(&path, "origin")?, Some(origin_url));
    assert_eq!(adapter.remote_url(&path, "nope")?, None);
    Ok(())
}

#[test]
fn test_invalid_paths() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let plain_dir = temp_dir.path().join("plain");
    fs::create_dir_all(&plain_dir)?;

    let missing = probe().check_repository(&path_str(&temp_dir.path().join("missing")));
    assert_eq!(missing.priority_status, RepoStatus::Error);

    let not_repo = probe().check_repository(&path_str(&plain_dir));
    assert_eq!(not_repo.priority_status, RepoStatus::NotARepo);
    assert_eq!(not_repo.name, "plain");
    Ok(())
}

#[test]
fn test_scan_aggregate_and_emit() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let clean = temp_dir.path().join("api");
    let dirty = temp_dir.path().join("web");
    create_test_git_repo(clean.clone())?;
    create_test_git_repo(dirty.clone())?;
    fs::write(dirty.join("README.md"), "# edited\n")?;

    let scanner = RepositorySetScanner::with_parallelism(Arc::new(probe()), 2)?;
    let paths = vec![path_str(&clean), "  ".to_string(), path_str(&dirty)];
    let results = scanner.scan(&paths);
    assert_eq!(results.len(), 2);

    let summary = aggregate(&results);
    assert_eq!(summary.overall_status, RepoStatus::Uncommitted);
    assert_eq!(
        summary.summary_lines,
        vec![
            "1 of 2 repositories need attention:".to_string(),
            "  ● web (1 modified)".to_string(),
        ]
    );

    let output = WidgetOutput::from_summary(&summary, &WidgetIcons::new());
    let json: serde_json::Value = serde_json::to_value(&output)?;
    assert_eq!(json["text"], "●");
    assert_eq!(json["class"], "uncommitted");
    assert_eq!(
        json["tooltip"],
        "1 of 2 repositories need attention:\n  ● web (1 modified)"
    );

    // A missing path among other issues escalates the overall status
    let with_missing = vec![
        path_str(&dirty),
        path_str(&temp_dir.path().join("gone")),
    ];
    let summary = aggregate(&scanner.scan(&with_missing));
    assert_eq!(summary.overall_status, RepoStatus::Error);
    assert_eq!(summary.display_class, "error");
    Ok(())
}
