// SPDX-License-Identifier: MIT OR Apache-2.0
//! The bake queue: accumulate, deduplicate, run in phases.

use crate::fingerprint::{fingerprint, ParamBag};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rigforge_scene::{HostScene, RangeError, SceneNodeId};
use std::sync::OnceLock;
use thiserror::Error;

/// Failure inside a queued entry. Absorbed at the queue boundary: one failing
/// entry never aborts its siblings.
#[derive(Debug, Error)]
pub enum BakeError {
    /// Range policy rejected the requested span
    #[error(transparent)]
    Range(#[from] RangeError),

    /// A target disappeared between enqueue and run
    #[error("bake target no longer exists: {0}")]
    MissingTarget(SceneNodeId),

    /// Anything else the entry wants to surface
    #[error("{0}")]
    Failed(String),
}

/// A deduplicated bake command.
pub type BakeFn =
    Box<dyn FnMut(&mut dyn HostScene, &[SceneNodeId], &ParamBag) -> Result<(), BakeError> + Send>;

/// A pre-process entry. Returns transient nodes (temporary constraints and
/// the like) for the queue to delete after the bake phase.
pub type PreProcessFn =
    Box<dyn FnMut(&mut dyn HostScene, &ParamBag) -> Result<Vec<SceneNodeId>, BakeError> + Send>;

/// A post-process entry.
pub type PostProcessFn =
    Box<dyn FnMut(&mut dyn HostScene, &ParamBag) -> Result<(), BakeError> + Send>;

struct BakeCommand {
    kind: String,
    func: BakeFn,
    targets: Vec<SceneNodeId>,
    params: ParamBag,
}

struct PreProcessEntry {
    func: PreProcessFn,
    params: ParamBag,
    priority: i32,
    seq: usize,
}

struct PostProcessEntry {
    func: PostProcessFn,
    params: ParamBag,
}

/// Queue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Default)]
pub enum QueueState {
    /// Nothing queued
    #[default]
    Idle,
    /// Entries queued, not yet run
    Accumulating,
    /// Inside `run_queue`
    Running,
}

/// What a `run_queue` pass did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Deduplicated bake commands executed
    pub commands: usize,
    /// Pre-process entries executed
    pub pre_processes: usize,
    /// Post-process entries executed
    pub post_processes: usize,
    /// Transient nodes deleted after the bake phase
    pub transients_deleted: usize,
    /// Context strings for absorbed failures
    pub failures: Vec<String>,
}

/// Accumulates bake requests and pre/post work, deduplicates by parameter
/// fingerprint, and executes in three strict phases.
#[derive(Default)]
pub struct BakeQueue {
    state: QueueState,
    commands: IndexMap<u64, BakeCommand>,
    pre: Vec<PreProcessEntry>,
    post: Vec<PostProcessEntry>,
}

impl BakeQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.pre.is_empty() && self.post.is_empty()
    }

    /// Number of deduplicated bake commands queued.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Queue a bake command and return its fingerprint.
    ///
    /// Two requests with equal `kind` and canonically-equal `params` merge
    /// regardless of originating caller: target lists union as an ordered set
    /// and the first callable is kept. Commands execute in first-registration
    /// order of their fingerprint.
    pub fn add_command(
        &mut self,
        kind: &str,
        func: BakeFn,
        targets: Vec<SceneNodeId>,
        params: ParamBag,
    ) -> u64 {
        let fp = fingerprint(kind, &params);
        match self.commands.get_mut(&fp) {
            Some(existing) => {
                for target in targets {
                    if !existing.targets.contains(&target) {
                        existing.targets.push(target);
                    }
                }
                tracing::debug!(kind, fp, "merged bake command into existing fingerprint");
            }
            None => {
                let mut deduped = Vec::new();
                for target in targets {
                    if !deduped.contains(&target) {
                        deduped.push(target);
                    }
                }
                self.commands.insert(
                    fp,
                    BakeCommand {
                        kind: kind.to_string(),
                        func,
                        targets: deduped,
                        params,
                    },
                );
            }
        }
        self.state = QueueState::Accumulating;
        fp
    }

    /// Queue a pre-process entry.
    ///
    /// Entries run ascending by `priority`; ties keep insertion order.
    pub fn add_pre_process(&mut self, func: PreProcessFn, params: ParamBag, priority: i32) {
        let seq = self.pre.len();
        self.pre.push(PreProcessEntry {
            func,
            params,
            priority,
            seq,
        });
        self.state = QueueState::Accumulating;
    }

    /// Queue a post-process entry. Entries run in insertion order.
    pub fn add_post_process(&mut self, func: PostProcessFn, params: ParamBag) {
        self.post.push(PostProcessEntry { func, params });
        self.state = QueueState::Accumulating;
    }

    /// Drain the queue against `scene`.
    ///
    /// Phases: suspend autokey, pre-process (priority order), bake commands
    /// (fingerprint-registration order), delete accumulated transients,
    /// post-process (insertion order), then unconditionally restore autokey
    /// and clear the queue. Entry failures are logged and absorbed so one bad
    /// actor cannot derail an unattended batch.
    ///
    /// Running an empty queue touches nothing, autokey state included.
    pub fn run_queue(&mut self, scene: &mut dyn HostScene) -> RunReport {
        if self.is_empty() {
            self.state = QueueState::Idle;
            return RunReport::default();
        }
        self.state = QueueState::Running;
        let mut report = RunReport::default();

        let autokey_was = scene.autokey_enabled();
        scene.set_autokey(false);

        // Phase 1: pre-process, accumulating transient nodes for cleanup.
        let mut pre: Vec<PreProcessEntry> = self.pre.drain(..).collect();
        pre.sort_by_key(|e| (e.priority, e.seq));
        let mut transients: Vec<SceneNodeId> = Vec::new();
        for entry in &mut pre {
            match (entry.func)(scene, &entry.params) {
                Ok(mut nodes) => {
                    transients.append(&mut nodes);
                    report.pre_processes += 1;
                }
                Err(e) => {
                    tracing::error!(priority = entry.priority, "pre-process failed: {e}");
                    report.failures.push(format!("pre-process: {e}"));
                }
            }
        }

        // Phase 2: deduplicated bake commands.
        let commands: Vec<BakeCommand> = self.commands.drain(..).map(|(_, c)| c).collect();
        for mut command in commands {
            let live: Vec<SceneNodeId> = command
                .targets
                .iter()
                .copied()
                .filter(|t| scene.node_exists(*t))
                .collect();
            match (command.func)(scene, &live, &command.params) {
                Ok(()) => report.commands += 1,
                Err(e) => {
                    tracing::error!(kind = command.kind, "bake command failed: {e}");
                    report.failures.push(format!("{}: {e}", command.kind));
                }
            }
        }

        // Phase 3: transient cleanup.
        transients.retain(|t| scene.node_exists(*t));
        report.transients_deleted = transients.len();
        scene.delete_nodes(&transients);

        // Phase 4: post-process.
        let mut post: Vec<PostProcessEntry> = self.post.drain(..).collect();
        for entry in &mut post {
            match (entry.func)(scene, &entry.params) {
                Ok(()) => report.post_processes += 1,
                Err(e) => {
                    tracing::error!("post-process failed: {e}");
                    report.failures.push(format!("post-process: {e}"));
                }
            }
        }

        scene.set_autokey(autokey_was);
        self.clear();
        report
    }

    /// Drop everything queued and return to `Idle`.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.pre.clear();
        self.post.clear();
        self.state = QueueState::Idle;
    }
}

static DEFAULT_QUEUE: OnceLock<Mutex<BakeQueue>> = OnceLock::new();

/// The process-wide default queue, used for cross-component coordination
/// during a single file load. Private instances are equally valid for
/// isolated atomic batches.
pub fn default_queue() -> &'static Mutex<BakeQueue> {
    DEFAULT_QUEUE.get_or_init(|| Mutex::new(BakeQueue::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigforge_scene::{OfflineScene, SceneValue};
    use std::sync::mpsc;

    fn params(pairs: &[(&str, i64)]) -> ParamBag {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), SceneValue::Int(*v)))
            .collect()
    }

    #[test]
    fn test_equal_fingerprints_union_targets() {
        let mut scene = OfflineScene::new();
        let a = scene.create_node("a");
        let b = scene.create_node("b");
        let c = scene.create_node("c");

        let (tx, rx) = mpsc::channel();
        let mut queue = BakeQueue::new();
        let tx2 = tx.clone();
        queue.add_command(
            "bake",
            Box::new(move |_, targets, _| {
                tx2.send(targets.to_vec()).ok();
                Ok(())
            }),
            vec![a, b],
            params(&[("start", 1), ("end", 10)]),
        );
        // Reversed insertion order, same key/value set: must merge.
        queue.add_command(
            "bake",
            Box::new(move |_, targets, _| {
                tx.send(targets.to_vec()).ok();
                Ok(())
            }),
            vec![b, c],
            params(&[("end", 10), ("start", 1)]),
        );

        assert_eq!(queue.command_count(), 1);
        let report = queue.run_queue(&mut scene);
        assert_eq!(report.commands, 1);
        assert_eq!(rx.recv().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_pre_process_priority_order_with_stable_ties() {
        let mut scene = OfflineScene::new();
        let (tx, rx) = mpsc::channel();
        let mut queue = BakeQueue::new();
        for (tag, priority) in [("p5", 5), ("p1a", 1), ("p3", 3), ("p1b", 1)] {
            let tx = tx.clone();
            queue.add_pre_process(
                Box::new(move |_, _| {
                    tx.send(tag).ok();
                    Ok(Vec::new())
                }),
                ParamBag::new(),
                priority,
            );
        }
        queue.run_queue(&mut scene);
        let order: Vec<&str> = rx.try_iter().collect();
        assert_eq!(order, vec!["p1a", "p1b", "p3", "p5"]);
    }

    #[test]
    fn test_empty_queue_run_leaves_autokey_alone() {
        let mut scene = OfflineScene::new();
        scene.set_autokey(true);
        let mut queue = BakeQueue::new();
        let report = queue.run_queue(&mut scene);
        assert!(scene.autokey_enabled());
        assert_eq!(report.commands, 0);
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_autokey_suspended_during_run_and_restored() {
        let mut scene = OfflineScene::new();
        scene.set_autokey(true);
        let (tx, rx) = mpsc::channel();
        let mut queue = BakeQueue::new();
        queue.add_post_process(
            Box::new(move |scene, _| {
                tx.send(scene.autokey_enabled()).ok();
                Ok(())
            }),
            ParamBag::new(),
        );
        queue.run_queue(&mut scene);
        assert!(!rx.recv().unwrap(), "suspended while running");
        assert!(scene.autokey_enabled(), "restored afterwards");
    }

    #[test]
    fn test_failure_is_absorbed_and_siblings_run() {
        let mut scene = OfflineScene::new();
        let mut queue = BakeQueue::new();
        queue.add_command(
            "broken",
            Box::new(|_, _, _| Err(BakeError::Failed("boom".into()))),
            Vec::new(),
            params(&[("x", 1)]),
        );
        let (tx, rx) = mpsc::channel();
        queue.add_command(
            "bake",
            Box::new(move |_, _, _| {
                tx.send(()).ok();
                Ok(())
            }),
            Vec::new(),
            params(&[("x", 1)]),
        );
        let report = queue.run_queue(&mut scene);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.commands, 1);
        assert!(rx.recv().is_ok(), "sibling command still ran");
        assert!(queue.is_empty(), "queue cleared even after a failure");
    }

    #[test]
    fn test_transients_from_pre_process_are_deleted() {
        let mut scene = OfflineScene::new();
        let mut queue = BakeQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.add_pre_process(
            Box::new(move |scene, _| {
                let tmp = scene.create_node("tmp_constraint");
                tx.send(tmp).ok();
                Ok(vec![tmp])
            }),
            ParamBag::new(),
            0,
        );
        let report = queue.run_queue(&mut scene);
        let tmp = rx.recv().unwrap();
        assert!(!scene.node_exists(tmp));
        assert_eq!(report.transients_deleted, 1);
    }

    #[test]
    fn test_different_kinds_never_merge() {
        let mut queue = BakeQueue::new();
        queue.add_command(
            "bake",
            Box::new(|_, _, _| Ok(())),
            Vec::new(),
            params(&[("x", 1)]),
        );
        queue.add_command(
            "strip",
            Box::new(|_, _, _| Ok(())),
            Vec::new(),
            params(&[("x", 1)]),
        );
        assert_eq!(queue.command_count(), 2);
    }
}
