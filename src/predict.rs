//! Conflict prediction without touching any working tree.
//!
//! Both branches are diffed against their merge base with zero context lines,
//! so every hunk is expressed in the base file's line numbers. Files changed
//! on both sides are candidates; hunk geometry decides how risky each is.
//! This is advisory: git's own merge is the only authority.

use color_print::cformat;

use crate::git::{FileDiff, LineRange, Repository};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConflictPrediction {
    pub file: String,
    pub risk: Risk,
    pub reason: String,
}

impl ConflictPrediction {
    fn new(file: &str, risk: Risk, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            risk,
            reason: reason.into(),
        }
    }

    /// `path  [risk]  reason`, colored by risk.
    pub fn render(&self) -> String {
        match self.risk {
            Risk::High => cformat!("<red>{}</>  <red,bold>[high]</>  {}", self.file, self.reason),
            Risk::Medium => cformat!(
                "<yellow>{}</>  <yellow,bold>[medium]</>  {}",
                self.file,
                self.reason
            ),
            Risk::Low => cformat!("{}  <dim>[low]</>  {}", self.file, self.reason),
        }
    }
}

/// Thresholds for the hunk heuristic.
#[derive(Debug, Clone, Copy)]
pub struct RiskPolicy {
    /// Hunks at most this many untouched lines apart count as medium risk.
    pub proximity_lines: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self { proximity_lines: 3 }
    }
}

/// Predict conflicts from merging `branch` into `main_branch`.
pub fn predict(
    repo: &Repository,
    branch: &str,
    main_branch: &str,
) -> anyhow::Result<Vec<ConflictPrediction>> {
    predict_with_policy(repo, branch, main_branch, RiskPolicy::default())
}

pub fn predict_with_policy(
    repo: &Repository,
    branch: &str,
    main_branch: &str,
    policy: RiskPolicy,
) -> anyhow::Result<Vec<ConflictPrediction>> {
    let base = repo.merge_base(main_branch, branch)?;
    let on_branch = repo.changed_files(&base, branch)?;
    let on_main = repo.changed_files(&base, main_branch)?;

    // Both lists are sorted, so the intersection comes out ordered by path
    let candidates: Vec<&String> = on_branch
        .iter()
        .filter(|path| on_main.binary_search(path).is_ok())
        .collect();
    log::debug!(
        "Prediction {branch} vs {main_branch}: {} changed on branch, {} on main, {} on both",
        on_branch.len(),
        on_main.len(),
        candidates.len()
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let branch_hunks = repo.diff_hunks(&base, branch)?;
    let main_hunks = repo.diff_hunks(&base, main_branch)?;

    candidates
        .into_iter()
        .map(|path| {
            let identical = repo.blob_id(branch, path)? == repo.blob_id(main_branch, path)?;
            Ok(classify(
                path,
                branch_hunks.get(path),
                main_hunks.get(path),
                identical,
                policy,
            ))
        })
        .collect()
}

/// Classify one file changed on both sides.
///
/// `identical` means both tips hold the same content for the path (including
/// both having deleted it).
pub fn classify(
    path: &str,
    branch: Option<&FileDiff>,
    main: Option<&FileDiff>,
    identical: bool,
    policy: RiskPolicy,
) -> ConflictPrediction {
    if identical {
        let both_deleted = branch.is_some_and(|d| d.deleted) && main.is_some_and(|d| d.deleted);
        let reason = if both_deleted {
            "deleted on both branches"
        } else {
            "identical changes on both branches"
        };
        return ConflictPrediction::new(path, Risk::Low, reason);
    }

    let (Some(branch), Some(main)) = (branch, main) else {
        return ConflictPrediction::new(path, Risk::Low, "changed on both branches");
    };

    match (branch.deleted, main.deleted) {
        (true, false) => {
            return ConflictPrediction::new(
                path,
                Risk::High,
                "deleted on the branch, modified on main",
            );
        }
        (false, true) => {
            return ConflictPrediction::new(
                path,
                Risk::High,
                "modified on the branch, deleted on main",
            );
        }
        _ => {}
    }

    if branch.added && main.added {
        return ConflictPrediction::new(
            path,
            Risk::High,
            "added on both branches with different content",
        );
    }
    if branch.binary || main.binary {
        return ConflictPrediction::new(path, Risk::High, "binary file changed on both branches");
    }

    let mut overlap: Option<LineRange> = None;
    let mut closest: Option<(u32, LineRange)> = None;
    for ours in &branch.hunks {
        for theirs in &main.hunks {
            if ours.touches(theirs) {
                let joined = ours.union(theirs);
                overlap = Some(overlap.map_or(joined, |o| o.union(&joined)));
            } else {
                let gap = ours.gap(theirs);
                if closest.is_none_or(|(best, _)| gap < best) {
                    closest = Some((gap, ours.union(theirs)));
                }
            }
        }
    }

    if let Some(range) = overlap {
        return ConflictPrediction::new(
            path,
            Risk::High,
            format!("both branches modified {range}"),
        );
    }
    match closest {
        Some((gap, range)) if gap <= policy.proximity_lines => ConflictPrediction::new(
            path,
            Risk::Medium,
            format!(
                "nearby changes {gap} line{} apart around {range}",
                if gap == 1 { "" } else { "s" }
            ),
        ),
        _ => ConflictPrediction::new(
            path,
            Risk::Low,
            "both branches modified separate regions",
        ),
    }
}
