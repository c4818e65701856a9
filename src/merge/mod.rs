//! The guarded merge: validate, predict, snapshot, merge, clean up.
//!
//! [`MergeRun`] is a resumable state machine. It never prompts; whenever it
//! needs a decision it hands back [`Progress::NeedsConfirmation`] and waits
//! for [`MergeRun::resume`]. Callers that can answer synchronously use
//! [`merge`], which drives a run with a closure.
//!
//! ```text
//! Resolving → Validating → (Predicting) → Snapshotting → Merging
//!           → Succeeded | Conflicted | Failed → (CleaningUp)
//! ```

mod outcome;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backup::{MergeState, SnapshotStore};
use crate::config::Config;
use crate::git::{GitError, MergeAttempt, WorktreeRecord, plain_error};
use crate::path::file_name_str;
use crate::ports::PortManager;
use crate::predict::{ConflictPrediction, predict};
use crate::topology::{self, RepositoryHandle};
use crate::utils::now;
use crate::validate::{Unpushed, ValidateOptions, Validator};

pub use outcome::{
    Decision, DecisionKind, DecisionRequest, MergeOutcome, MergeSuccess, Phase,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Skip prediction and merge past uncommitted worktree changes or a
    /// failed snapshot.
    pub force: bool,
    /// Only predict; no snapshot, no merge.
    pub check: bool,
    /// Clean up after a successful merge without asking.
    pub delete: bool,
    /// Never clean up, even with auto-cleanup configured. Wins over `delete`.
    pub no_delete: bool,
    /// Answer every question with yes.
    pub auto_confirm: bool,
}

#[derive(Debug, Clone)]
pub enum Progress {
    NeedsConfirmation(DecisionRequest),
    Finished(MergeOutcome),
}

enum Step {
    Resolve,
    Validate,
    Predict,
    ConfirmConflicts(Vec<ConflictPrediction>),
    OfferPush(Unpushed),
    Snapshot,
    Merge,
    OfferCleanup,
    Cleanup,
    Done,
}

enum Flow {
    Next(Step),
    Ask(Step, DecisionRequest),
    Finish(MergeOutcome),
}

/// What earlier steps established about the merge target.
#[derive(Default)]
struct Target {
    worktree_name: String,
    worktree: Option<WorktreeRecord>,
    branch: String,
    main_branch: String,
}

/// One orchestrated merge.
pub struct MergeRun<'a> {
    handle: &'a RepositoryHandle,
    config: &'a Config,
    ports: &'a dyn PortManager,
    requested_name: Option<String>,
    cwd: Option<PathBuf>,
    options: MergeOptions,

    step: Step,
    history: Vec<Phase>,
    pending: Option<DecisionRequest>,
    answer: Option<(DecisionKind, Decision)>,
    finished: Option<MergeOutcome>,

    target: Target,
    /// Unpushed commits found by validation, offered once after prediction.
    pending_push: Option<Unpushed>,
    snapshot_id: Option<String>,
    fast_forward: bool,
    warnings: Vec<String>,
}

impl<'a> MergeRun<'a> {
    /// Prepare a merge of the worktree called `name`, or of the linked
    /// worktree containing `cwd` when no name is given.
    pub fn new(
        handle: &'a RepositoryHandle,
        config: &'a Config,
        ports: &'a dyn PortManager,
        name: Option<&str>,
        options: MergeOptions,
    ) -> Self {
        Self {
            handle,
            config,
            ports,
            requested_name: name.map(str::to_string),
            cwd: None,
            options,
            step: Step::Resolve,
            history: Vec::new(),
            pending: None,
            answer: None,
            finished: None,
            target: Target::default(),
            pending_push: None,
            snapshot_id: None,
            fast_forward: false,
            warnings: Vec::new(),
        }
    }

    /// The directory the caller runs from; used to infer the target and to
    /// locate checkouts git's registry has lost track of.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Phases entered so far, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// The question the run is waiting on, if any.
    pub fn pending(&self) -> Option<&DecisionRequest> {
        self.pending.as_ref()
    }

    /// Answer the pending question. Ignored when nothing is pending.
    pub fn resume(&mut self, decision: Decision) {
        if let Some(request) = self.pending.take() {
            log::debug!("Decision for {}: {decision:?}", request.kind());
            self.answer = Some((request.kind(), decision));
        }
    }

    /// Run until the merge finishes or needs a decision.
    pub fn advance(&mut self) -> Progress {
        loop {
            let step = std::mem::replace(&mut self.step, Step::Done);
            if matches!(step, Step::Done) {
                return Progress::Finished(self.finished.clone().unwrap_or_else(|| {
                    MergeOutcome::from_error(&anyhow::anyhow!("merge run has no outcome"))
                }));
            }
            match self.run_step(step) {
                Flow::Next(next) => self.step = next,
                Flow::Ask(step, request) => {
                    self.step = step;
                    self.pending = Some(request.clone());
                    return Progress::NeedsConfirmation(request);
                }
                Flow::Finish(outcome) => {
                    self.finished = Some(outcome.clone());
                    return Progress::Finished(outcome);
                }
            }
        }
    }

    fn run_step(&mut self, step: Step) -> Flow {
        match step {
            Step::Resolve => self.resolve(),
            Step::Validate => self.validate(),
            Step::Predict => self.predict(),
            Step::ConfirmConflicts(predictions) => self.confirm_conflicts(predictions),
            Step::OfferPush(unpushed) => self.offer_push(unpushed),
            Step::Snapshot => self.snapshot(),
            Step::Merge => self.merge(),
            Step::OfferCleanup => self.offer_cleanup(),
            Step::Cleanup => self.cleanup(),
            Step::Done => Flow::Next(Step::Done),
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("Merge phase: {phase}");
        self.history.push(phase);
    }

    fn fail(&mut self, err: anyhow::Error) -> Flow {
        log::debug!("Merge failed: {}", plain_error(&err));
        self.enter(Phase::Failed);
        Flow::Finish(MergeOutcome::from_error(&err))
    }

    /// Auto-confirm approves; otherwise consume the caller's answer to this
    /// kind of question, if there is one.
    fn decision_for(&mut self, kind: DecisionKind) -> Option<Decision> {
        if self.options.auto_confirm {
            return Some(Decision::Approve);
        }
        match self.answer.take() {
            Some((answered, decision)) if answered == kind => Some(decision),
            _ => None,
        }
    }

    fn resolve(&mut self) -> Flow {
        self.enter(Phase::Resolving);
        let name = match self.requested_name.clone() {
            Some(name) => name,
            None => match self.infer_name() {
                Ok(name) => name,
                Err(err) => return self.fail(err),
            },
        };
        log::debug!("Merging worktree {name} in {}", self.handle.main_root().display());
        self.target.worktree_name = name;
        Flow::Next(Step::Validate)
    }

    /// Name of the linked worktree the caller stands in.
    fn infer_name(&self) -> anyhow::Result<String> {
        let cwd = match &self.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        let topology = topology::resolve(&cwd)?;
        if !topology.is_linked_worktree {
            anyhow::bail!(
                "No worktree name given and {} is not a linked worktree",
                crate::path::format_path_for_display(&topology.working_path)
            );
        }
        file_name_str(&topology.working_path)
            .map(str::to_string)
            .ok_or_else(|| {
                GitError::WorktreeNotFound {
                    name: topology.working_path.display().to_string(),
                }
                .into()
            })
    }

    fn validate(&mut self) -> Flow {
        self.enter(Phase::Validating);
        let mut validator = Validator::new(self.handle, self.config);
        if let Some(cwd) = &self.cwd {
            validator = validator.with_cwd(cwd);
        }
        let options = ValidateOptions {
            force: self.options.force,
        };
        let report = match validator.validate(&self.target.worktree_name, options) {
            Ok(report) => report,
            Err(err) => return self.fail(err),
        };

        if !report.is_safe() {
            self.enter(Phase::Failed);
            return Flow::Finish(MergeOutcome::ValidationFailed(report.issues));
        }
        self.warnings
            .extend(report.warnings().map(|issue| issue.message.clone()));

        // A safe report always carries these
        let (Some(worktree), Some(main_branch)) = (report.worktree, report.main_branch) else {
            return self.fail(anyhow::anyhow!("validation passed without a merge target"));
        };
        let Some(branch) = worktree.branch.clone() else {
            return self.fail(
                GitError::DetachedHead {
                    worktree: Some(self.target.worktree_name.clone()),
                }
                .into(),
            );
        };
        self.target.branch = branch;
        self.target.main_branch = main_branch;
        self.target.worktree = Some(worktree);
        self.pending_push = report.unpushed;

        if self.options.force && !self.options.check {
            return self.after_prediction();
        }
        Flow::Next(Step::Predict)
    }

    fn predict(&mut self) -> Flow {
        self.enter(Phase::Predicting);
        let predictions = match predict(
            self.handle.main(),
            &self.target.branch,
            &self.target.main_branch,
        ) {
            Ok(predictions) => predictions,
            Err(err) => return self.fail(err),
        };

        if self.options.check {
            return Flow::Finish(MergeOutcome::Preview(predictions));
        }
        if predictions.is_empty() {
            return self.after_prediction();
        }
        Flow::Next(Step::ConfirmConflicts(predictions))
    }

    fn confirm_conflicts(&mut self, predictions: Vec<ConflictPrediction>) -> Flow {
        match self.decision_for(DecisionKind::PredictedConflicts) {
            Some(Decision::Approve) => self.after_prediction(),
            Some(Decision::Decline) => {
                Flow::Finish(MergeOutcome::Declined(DecisionKind::PredictedConflicts))
            }
            None => {
                let request = DecisionRequest::PredictedConflicts {
                    branch: self.target.branch.clone(),
                    main_branch: self.target.main_branch.clone(),
                    predictions: predictions.clone(),
                };
                Flow::Ask(Step::ConfirmConflicts(predictions), request)
            }
        }
    }

    fn after_prediction(&mut self) -> Flow {
        match self.pending_push.take() {
            Some(unpushed) => Flow::Next(Step::OfferPush(unpushed)),
            None => Flow::Next(Step::Snapshot),
        }
    }

    fn offer_push(&mut self, unpushed: Unpushed) -> Flow {
        match self.decision_for(DecisionKind::PushUnpushed) {
            Some(Decision::Approve) => {
                let Some(worktree) = &self.target.worktree else {
                    return Flow::Next(Step::Snapshot);
                };
                let repo = self.handle.repo_at(&worktree.path);
                match repo.push() {
                    Ok(()) => log::info!(
                        "Pushed {} commit(s) on {} to {}",
                        unpushed.count,
                        self.target.branch,
                        unpushed.upstream
                    ),
                    Err(err) => {
                        let reason = plain_error(&err);
                        log::warn!("Push of {} failed: {reason}", self.target.branch);
                        self.warnings
                            .push(format!("Could not push {}: {reason}", self.target.branch));
                    }
                }
                Flow::Next(Step::Snapshot)
            }
            Some(Decision::Decline) => Flow::Next(Step::Snapshot),
            None => {
                let request = DecisionRequest::PushUnpushed {
                    branch: self.target.branch.clone(),
                    upstream: unpushed.upstream.clone(),
                    count: unpushed.count,
                };
                Flow::Ask(Step::OfferPush(unpushed), request)
            }
        }
    }

    fn snapshot(&mut self) -> Flow {
        self.enter(Phase::Snapshotting);
        let metadata = BTreeMap::from([
            ("worktree".to_string(), self.target.worktree_name.clone()),
            ("branch".to_string(), self.target.branch.clone()),
            ("main_branch".to_string(), self.target.main_branch.clone()),
        ]);
        match SnapshotStore::new(self.handle).snapshot("merge", metadata) {
            Ok(snapshot) => self.snapshot_id = Some(snapshot.id),
            Err(err) => {
                let persistence = matches!(
                    err.downcast_ref::<GitError>(),
                    Some(GitError::SnapshotPersistenceFailed { .. })
                );
                if !(persistence && self.options.force) {
                    return self.fail(err);
                }
                log::warn!("Merging without a safety snapshot: {}", plain_error(&err));
                self.warnings
                    .push("No safety snapshot was saved (forced past a write failure)".to_string());
            }
        }
        Flow::Next(Step::Merge)
    }

    fn merge(&mut self) -> Flow {
        self.enter(Phase::Merging);
        let main = self.handle.main();
        if let Err(err) = main.checkout(&self.target.main_branch) {
            return self.fail(err);
        }
        match main.merge(&self.target.branch) {
            Ok(MergeAttempt::Merged {
                fast_forward,
                commit,
            }) => {
                self.enter(Phase::Succeeded);
                log::info!(
                    "Merged {} into {} at {commit}",
                    self.target.branch,
                    self.target.main_branch
                );
                self.fast_forward = fast_forward;
                Flow::Next(Step::OfferCleanup)
            }
            Ok(MergeAttempt::Conflicted { paths }) => {
                self.enter(Phase::Conflicted);
                self.finish_conflicted(paths)
            }
            Err(err) => self.fail(err),
        }
    }

    fn finish_conflicted(&mut self, paths: Vec<String>) -> Flow {
        let state = MergeState {
            worktree_name: self.target.worktree_name.clone(),
            branch_name: self.target.branch.clone(),
            main_branch: self.target.main_branch.clone(),
            conflicted: true,
            timestamp: now(),
            snapshot_id: self.snapshot_id.clone(),
            conflicted_paths: paths.clone(),
        };
        let state_saved = match SnapshotStore::new(self.handle).save_merge_state(&state) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Could not record merge state: {}", plain_error(&err));
                false
            }
        };
        Flow::Finish(MergeOutcome::Conflicted {
            branch: self.target.branch.clone(),
            conflict_count: (!paths.is_empty()).then_some(paths.len()),
            paths,
            snapshot_id: self.snapshot_id.clone(),
            state_saved,
        })
    }

    fn offer_cleanup(&mut self) -> Flow {
        if self.options.no_delete {
            return self.succeed(false);
        }
        if self.options.delete {
            return Flow::Next(Step::Cleanup);
        }
        if !self.config.auto_cleanup {
            return self.succeed(false);
        }
        match self.decision_for(DecisionKind::DeleteAfterMerge) {
            Some(Decision::Approve) => Flow::Next(Step::Cleanup),
            Some(Decision::Decline) => self.succeed(false),
            None => {
                let request = DecisionRequest::DeleteAfterMerge {
                    worktree_name: self.target.worktree_name.clone(),
                    branch: self.target.branch.clone(),
                    path: self
                        .target
                        .worktree
                        .as_ref()
                        .map(|wt| wt.path.clone())
                        .unwrap_or_default(),
                };
                Flow::Ask(Step::OfferCleanup, request)
            }
        }
    }

    /// Remove the worktree, then its branch, then its ports. Each failure is
    /// reported and the rest still run where they can. Ports stay reserved
    /// while the worktree directory is still around.
    fn cleanup(&mut self) -> Flow {
        self.enter(Phase::CleaningUp);
        let main = self.handle.main();
        let name = self.target.worktree_name.clone();
        let branch = self.target.branch.clone();

        let removed = match &self.target.worktree {
            Some(worktree) if worktree.registered => match main.remove_worktree(&worktree.path) {
                Ok(()) => true,
                Err(err) => {
                    let reason = plain_error(&err);
                    log::warn!("Could not remove worktree {name}: {reason}");
                    self.warnings
                        .push(format!("Could not remove worktree {name}: {reason}"));
                    false
                }
            },
            Some(worktree) => {
                self.warnings.push(format!(
                    "Worktree {name} at {} is not registered with git; left in place",
                    worktree.path.display()
                ));
                false
            }
            None => false,
        };

        if !removed {
            self.warnings
                .push(format!("Ports reserved for {name} are kept while the worktree exists"));
            return self.succeed(false);
        }

        let mut branch_deleted = false;
        match main.delete_branch(&branch) {
            Ok(()) => branch_deleted = true,
            Err(err) => {
                let reason = plain_error(&err);
                log::warn!("Could not delete branch {branch}: {reason}");
                self.warnings
                    .push(format!("Could not delete branch {branch}: {reason}"));
            }
        }

        match self.ports.release_ports(&name) {
            Ok(released) if !released.is_empty() => {
                log::info!("Released ports {released:?} held by {name}");
            }
            Ok(_) => {}
            Err(err) => {
                let reason = plain_error(&err);
                log::warn!("Could not release ports for {name}: {reason}");
                self.warnings
                    .push(format!("Could not release ports for {name}: {reason}"));
            }
        }

        self.succeed(branch_deleted)
    }

    fn succeed(&mut self, cleaned_up: bool) -> Flow {
        Flow::Finish(MergeOutcome::Succeeded(MergeSuccess {
            branch: self.target.branch.clone(),
            main_branch: self.target.main_branch.clone(),
            cleaned_up,
            fast_forward: self.fast_forward,
            snapshot_id: self.snapshot_id.clone(),
            warnings: std::mem::take(&mut self.warnings),
        }))
    }
}

/// Drive a merge to completion, answering questions with `decide`.
pub fn merge(
    handle: &RepositoryHandle,
    config: &Config,
    ports: &dyn PortManager,
    name: Option<&str>,
    cwd: Option<&Path>,
    options: MergeOptions,
    mut decide: impl FnMut(&DecisionRequest) -> Decision,
) -> MergeOutcome {
    let mut run = MergeRun::new(handle, config, ports, name, options);
    if let Some(cwd) = cwd {
        run = run.with_cwd(cwd);
    }
    loop {
        match run.advance() {
            Progress::NeedsConfirmation(request) => {
                let decision = decide(&request);
                run.resume(decision);
            }
            Progress::Finished(outcome) => return outcome,
        }
    }
}
