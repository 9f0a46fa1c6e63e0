//! Release retention planning.
//!
//! Pure selection logic: given every release of a repository and the
//! configured count/size limits, decide which releases stay inside the
//! retention window. Ordering is publish time descending, so the most
//! recent release is always attempted first regardless of budget; the
//! budget check happens before starting a release, never mid-release.

use crate::github::Release;

/// Select the releases to retain.
///
/// `num_limit` bounds the release count, `size_limit` the cumulative byte
/// size of uploaded assets; a negative limit means unbounded. A release
/// whose processing began before the budget was exhausted is kept whole.
pub fn plan(mut releases: Vec<Release>, num_limit: i64, size_limit: i64) -> Vec<Release> {
    releases.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    if num_limit >= 0 {
        releases.truncate(num_limit as usize);
    }

    let mut retained = Vec::new();
    let mut accumulated: u64 = 0;
    for release in releases {
        if size_limit >= 0 && accumulated >= size_limit as u64 {
            break;
        }
        accumulated += release
            .assets
            .iter()
            .filter(|a| a.uploaded())
            .map(|a| a.size)
            .sum::<u64>();
        retained.push(release);
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::ReleaseAsset;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(t: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(t, 0).unwrap())
    }

    fn release(tag: &str, published: i64, sizes: &[u64]) -> Release {
        Release {
            tag: tag.to_string(),
            published_at: at(published),
            assets: sizes
                .iter()
                .map(|&size| ReleaseAsset {
                    name: format!("{tag}-{size}.bin"),
                    size,
                    state: "uploaded".to_string(),
                    url: String::new(),
                })
                .collect(),
        }
    }

    fn tags(plan: &[Release]) -> Vec<&str> {
        plan.iter().map(|r| r.tag.as_str()).collect()
    }

    #[test]
    fn count_then_size_limits() {
        let releases = vec![
            release("r3", 3, &[60]),
            release("r1", 5, &[100]),
            release("r2", 4, &[150]),
        ];
        // Count truncates to {r1, r2}; budget of 200 is reached only after
        // r2 started, so r2 is still fully retained.
        let kept = plan(releases, 2, 200);
        assert_eq!(tags(&kept), vec!["r1", "r2"]);
    }

    #[test]
    fn most_recent_release_ignores_budget() {
        let releases = vec![release("big", 9, &[1_000_000]), release("old", 1, &[10])];
        let kept = plan(releases, -1, 100);
        assert_eq!(tags(&kept), vec!["big"]);
    }

    #[test]
    fn unbounded_limits_keep_everything() {
        let releases = vec![
            release("a", 1, &[500]),
            release("b", 2, &[500]),
            release("c", 3, &[500]),
        ];
        let kept = plan(releases, -1, -1);
        assert_eq!(kept.len(), 3);
        assert_eq!(tags(&kept), vec!["c", "b", "a"]);
    }

    #[test]
    fn non_uploaded_assets_do_not_count_toward_budget() {
        let mut r = release("a", 2, &[50]);
        r.assets.push(ReleaseAsset {
            name: "draft.bin".to_string(),
            size: 10_000,
            state: "starter".to_string(),
            url: String::new(),
        });
        let kept = plan(vec![r, release("b", 1, &[50])], -1, 100);
        assert_eq!(tags(&kept), vec!["a", "b"]);
    }

    #[test]
    fn zero_count_limit_keeps_nothing() {
        let kept = plan(vec![release("a", 1, &[10])], 0, -1);
        assert!(kept.is_empty());
    }

    #[test]
    fn unpublished_releases_sort_last() {
        let mut unpublished = release("draft", 0, &[1]);
        unpublished.published_at = None;
        let kept = plan(vec![unpublished, release("r", 5, &[1])], 1, -1);
        assert_eq!(tags(&kept), vec!["r"]);
    }
}
