//! Construction and rewriting of Jenkins URLs.
//!
//! All URLs are built by manipulating `url::Url` path segments and query pairs,
//! so owner, repository and branch names are percent-encoded rather than
//! spliced into strings.

use thiserror::Error;
use url::Url;

use crate::types::{BranchName, RepoId};

/// Query parameter the setup job reads the branch name from.
pub const RECONFIGURE_BRANCH_PARAM: &str = "RECONFIGURE_BRANCH";

/// Errors building or rewriting a Jenkins URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// The URL has no hierarchical path (e.g. `mailto:`), so segments cannot be appended.
    #[error("URL cannot have path segments: {0}")]
    CannotBeABase(String),

    /// The reported URL's scheme, host or port could not be replaced.
    #[error("cannot rewrite {reported} onto {base}")]
    Rewrite { reported: String, base: String },
}

/// Appends path segments to `base`, percent-encoding each one.
fn with_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, UrlError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UrlError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `{ci}/job/setup_{owner}-{repo}/buildWithParameters?RECONFIGURE_BRANCH={branch}`
///
/// The branch travels form-encoded in the query, so the setup job receives
/// `feature/login` unchanged. The trigger URL for the same branch is
/// `job/feature%2Flogin` (see [`trigger_job_url`]); the setup job must create
/// the branch job under that one-segment name.
pub fn setup_job_url(base: &Url, repo: &RepoId, branch: &BranchName) -> Result<Url, UrlError> {
    let job = format!("setup_{}", repo.job_folder());
    let mut url = with_segments(base, ["job", job.as_str(), "buildWithParameters"])?;
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair(RECONFIGURE_BRANCH_PARAM, branch.as_str());
    Ok(url)
}

/// `{ci}/job/{owner}-{repo}/job/{branch}/job/{trigger_job}/build`
///
/// The branch is a single path segment: `feature/login` becomes
/// `job/feature%2Flogin`, not two nested folders. Multibranch jobs whose
/// names are themselves escaped would need `feature%252Flogin`, which is not
/// produced.
pub fn trigger_job_url(
    base: &Url,
    repo: &RepoId,
    branch: &BranchName,
    trigger_job: &str,
) -> Result<Url, UrlError> {
    let folder = repo.job_folder();
    with_segments(
        base,
        [
            "job",
            folder.as_str(),
            "job",
            branch.as_str(),
            "job",
            trigger_job,
            "build",
        ],
    )
}

/// `{resource}/api/json`, tolerating a trailing slash on `resource`.
pub fn api_json_url(resource: &Url) -> Result<Url, UrlError> {
    let mut url = with_segments(resource, ["api", "json"])?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Moves a URL reported by Jenkins onto the configured Jenkins address.
///
/// Jenkins builds the URLs it reports from its own configured root URL, which
/// is often an internal hostname. The scheme, host and port of `reported` are
/// replaced with those of `base`; the path and query are kept.
///
/// # Examples
///
/// ```
/// use jenkins_pr_trigger::jenkins::urls::rewrite_host;
/// use url::Url;
///
/// let reported = Url::parse("http://jenkins-internal:8080/job/Org-Repo/42/").unwrap();
/// let base = Url::parse("https://ci.example.com").unwrap();
///
/// let rewritten = rewrite_host(&reported, &base).unwrap();
/// assert_eq!(rewritten.as_str(), "https://ci.example.com/job/Org-Repo/42/");
/// ```
pub fn rewrite_host(reported: &Url, base: &Url) -> Result<Url, UrlError> {
    let rewrite_err = || UrlError::Rewrite {
        reported: reported.to_string(),
        base: base.to_string(),
    };

    let mut url = reported.clone();
    url.set_host(base.host_str()).map_err(|_| rewrite_err())?;
    url.set_port(base.port()).map_err(|_| rewrite_err())?;
    if url.scheme() != base.scheme() {
        url.set_scheme(base.scheme()).map_err(|_| rewrite_err())?;
        // The old scheme's explicit port may now be the new scheme's default.
        url.set_port(base.port()).map_err(|_| rewrite_err())?;
    }
    Ok(url)
}
