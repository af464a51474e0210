//! # Repository Template Resolution
//!
//! Derives the persisted [`GitRepoTemplate`] from the repository a client
//! asked for. This is pure parsing; no git host is contacted.

use super::GitRepo;
use crate::crd::{GitRepoTemplate, RepoType};
use thiserror::Error;
use url::Url;

/// The repository URL cannot be turned into a `{path, name}` pair
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid repository URL '{url}': {reason}")]
pub struct InvalidRepoUrl {
    pub url: String,
    pub reason: String,
}

impl InvalidRepoUrl {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Resolve the repository template for a tenant or cluster.
///
/// - No repository, or one without URL and type: `None`.
/// - Unmanaged: a template tagged unmanaged with empty path and name.
/// - Managed (explicit or implied): path and name parsed from the URL. The
///   template's display name is `fallback_name`.
///
/// # Errors
///
/// Returns [`InvalidRepoUrl`] if a managed repository has no URL, the URL does
/// not parse, or its path has fewer than two segments.
pub fn resolve(
    repo: Option<&GitRepo>,
    fallback_name: &str,
) -> Result<Option<GitRepoTemplate>, InvalidRepoUrl> {
    let Some(repo) = repo else {
        return Ok(None);
    };
    if repo.repo_type == Some(RepoType::Unmanaged) {
        return Ok(Some(GitRepoTemplate::unmanaged()));
    }
    match repo.url.as_deref().filter(|u| !u.is_empty()) {
        None if repo.repo_type.is_none() => Ok(None),
        None => Err(InvalidRepoUrl::new("", "a managed repository requires a URL")),
        Some(url) => {
            let (path, name) = split_repo_url(url)?;
            let mut template = GitRepoTemplate::managed(path, name);
            template.display_name = fallback_name.to_string();
            Ok(Some(template))
        }
    }
}

/// Split a repository URL into its group path and repository name.
///
/// # Errors
///
/// Returns [`InvalidRepoUrl`] if the URL does not parse or has fewer than two
/// path segments.
pub fn split_repo_url(raw: &str) -> Result<(String, String), InvalidRepoUrl> {
    let url = Url::parse(raw).map_err(|e| InvalidRepoUrl::new(raw, e.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let Some((last, rest)) = segments.split_last() else {
        return Err(InvalidRepoUrl::new(raw, "URL has no path"));
    };
    if rest.is_empty() {
        return Err(InvalidRepoUrl::new(
            raw,
            "path needs at least a group and a repository name",
        ));
    }
    let name = last.strip_suffix(".git").unwrap_or(last);
    Ok((rest.join("/"), name.to_string()))
}
