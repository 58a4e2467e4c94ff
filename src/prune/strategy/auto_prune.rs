//! Automatic pruning strategy implementation.
//!
//! Each searched epoch the controller proposes a token vector, which is
//! applied to the optimization graph as a reversible trial. At the end of
//! the epoch the trial is scored with the configured metric and rolled back
//! from its ledger. At `end_epoch` the controller's best tokens are applied
//! for good and normal training resumes on the pruned model.

use regex::Regex;
use tracing::Dispatch;

use crate::error::{AutoPruneError, Result};
use crate::graph::{mirror_structure, ModelGraph, ParamScope, SearchContext};
use crate::prune::codec::{ratios_to_tokens, tokens_to_ratios, Token};
use crate::prune::config::AutoPruneConfig;
use crate::prune::constraint::ConstraintEvaluator;
use crate::prune::ledger::TrialBackup;
use crate::prune::pruner::Pruner;
use crate::prune::uniform::UniformRatioSearch;
use crate::search::{SearchController, SequencedController};

use super::schedule::EpochSchedule;
use super::traits::{CompressionStrategy, EpochOutcome, SearchPhase, SkipReason};

/// A trial that has been applied but not yet restored.
#[derive(Debug)]
struct OpenTrial {
    tokens: Vec<Token>,
    opened_at: usize,
    backup: TrialBackup,
    mutated: Vec<String>,
}

#[derive(Debug)]
enum SearchState {
    Idle,
    TrialOpen(OpenTrial),
    Committed,
}

/// How `restore_and_resync` leaves the optimization graph.
enum Settle<'a> {
    /// Back to the pre-trial baseline.
    Transient,
    /// Baseline, then these ratios applied with no backup.
    Permanent(&'a [f64]),
}

/// Searches per-parameter pruning ratios under a FLOPs band.
///
/// # Example
///
/// ```ignore
/// use entrenar_autoprune::prune::{AutoPruneConfig, AutoPruneStrategy, ChannelPruner};
/// use entrenar_autoprune::search::SaController;
///
/// let config = AutoPruneConfig::default().with_epochs(0, 20).with_flops_band(0.4, 0.6);
/// let mut strategy = AutoPruneStrategy::new(config, ChannelPruner, SaController::default())?;
///
/// strategy.on_compression_begin(&mut ctx)?;
/// for epoch in 0..=20 {
///     ctx.epoch_id = epoch;
///     strategy.on_epoch_begin(&mut ctx)?;
///     if !ctx.skip_training { train_one_epoch(&mut ctx); }
///     evaluate(&mut ctx);
///     strategy.on_epoch_end(&mut ctx)?;
/// }
/// ```
pub struct AutoPruneStrategy<C, P> {
    config: AutoPruneConfig,
    selector: Regex,
    schedule: EpochSchedule,
    pruner: P,
    controller: SequencedController<C>,
    params: Vec<String>,
    current_tokens: Vec<Token>,
    range_table: Vec<Token>,
    seed_tokens: Vec<Token>,
    state: SearchState,
    dispatch: Option<Dispatch>,
}

impl<C, P> std::fmt::Debug for AutoPruneStrategy<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoPruneStrategy")
            .field("config", &self.config)
            .field("params", &self.params)
            .field("current_tokens", &self.current_tokens)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<C, P> AutoPruneStrategy<C, P>
where
    C: SearchController,
    P: Pruner + Clone + 'static,
{
    /// Validate `config` and compile the parameter selector.
    pub fn new(config: AutoPruneConfig, pruner: P, controller: C) -> Result<Self> {
        config.validate()?;
        let selector = Regex::new(&format!("^(?:{})", config.pruned_params())).map_err(|e| {
            AutoPruneError::InvalidPattern {
                pattern: config.pruned_params().to_string(),
                message: e.to_string(),
            }
        })?;

        if config.retrain_epoch() != 0 && !config.honor_retrain_epoch() {
            tracing::warn!(
                retrain_epoch = config.retrain_epoch(),
                "retrain_epoch is ignored unless honor_retrain_epoch is set; trials are scored without retraining"
            );
        }

        Ok(Self {
            schedule: EpochSchedule::from_config(&config),
            config,
            selector,
            pruner,
            controller: SequencedController::new(controller),
            params: Vec::new(),
            current_tokens: Vec::new(),
            range_table: Vec::new(),
            seed_tokens: Vec::new(),
            state: SearchState::Idle,
            dispatch: None,
        })
    }

    /// Route this strategy's log events to `dispatch` instead of the global default.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn config(&self) -> &AutoPruneConfig {
        &self.config
    }

    /// Selected parameters, in token-index order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Tokens of the most recent trial (the seed before any trial).
    pub fn current_tokens(&self) -> &[Token] {
        &self.current_tokens
    }

    pub fn range_table(&self) -> &[Token] {
        &self.range_table
    }

    pub fn phase(&self) -> SearchPhase {
        match self.state {
            SearchState::Idle => SearchPhase::Idle,
            SearchState::TrialOpen(_) => SearchPhase::TrialOpen,
            SearchState::Committed => SearchPhase::Committed,
        }
    }

    /// Number of parameters backed up by the open trial (0 when none is open).
    pub fn ledger_len(&self) -> usize {
        match &self.state {
            SearchState::TrialOpen(trial) => trial.backup.len(),
            _ => 0,
        }
    }

    pub fn controller(&self) -> &SequencedController<C> {
        &self.controller
    }

    fn observed<T>(&mut self, hook: impl FnOnce(&mut Self) -> T) -> T {
        match self.dispatch.clone() {
            Some(dispatch) => tracing::dispatcher::with_default(&dispatch, || hook(self)),
            None => hook(self),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.params.is_empty() || !self.controller.is_reset() {
            return Err(AutoPruneError::NotInitialized);
        }
        Ok(())
    }

    fn check_aligned(&self, tokens: &[Token]) -> Result<()> {
        if tokens.len() != self.params.len() {
            return Err(AutoPruneError::LengthMismatch {
                what: "controller tokens",
                expected: self.params.len(),
                actual: tokens.len(),
            });
        }
        Ok(())
    }

    fn resolve_params<G: ModelGraph>(&self, graph: &G) -> Result<Vec<String>> {
        let names = graph.parameter_names();
        let available = names.len();
        let matched: Vec<String> = names.into_iter().filter(|n| self.selector.is_match(n)).collect();
        if matched.is_empty() {
            return Err(AutoPruneError::SelectorMismatch {
                pattern: self.config.pruned_params().to_string(),
                available,
            });
        }
        Ok(matched)
    }

    fn begin_compression<G, S>(&mut self, ctx: &mut SearchContext<G, S>) -> Result<()>
    where
        G: ModelGraph + Clone + 'static,
        S: ParamScope,
    {
        if self.controller.is_reset() {
            return Err(AutoPruneError::ordering("on_compression_begin called twice"));
        }

        let params = self.resolve_params(&ctx.eval_graph)?;
        let uniform = UniformRatioSearch::from_config(&self.config).search(
            &mut ctx.eval_graph,
            &self.pruner,
            &params,
        )?;

        let tokens = ratios_to_tokens(&vec![uniform.ratio; params.len()]);
        let constraint = ConstraintEvaluator::new(
            params.clone(),
            self.config.min_ratio(),
            self.config.max_ratio(),
            self.pruner.clone(),
        )
        .bind(ctx.eval_graph.clone());

        self.controller.reset(tokens.clone(), tokens.clone(), Box::new(constraint))?;

        tracing::info!(
            params = params.len(),
            ratio = uniform.ratio,
            flops_reduction = uniform.flops_reduction,
            params_reduction = uniform.params_reduction,
            controller = self.controller.name(),
            "auto-prune search initialized"
        );

        self.params = params;
        self.range_table = tokens.clone();
        self.seed_tokens = tokens.clone();
        self.current_tokens = tokens;
        Ok(())
    }

    fn begin_epoch<G, S>(&mut self, ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome>
    where
        G: ModelGraph,
        S: ParamScope,
    {
        self.ensure_initialized()?;
        let epoch = ctx.epoch_id;

        if matches!(self.state, SearchState::Committed) {
            return Ok(EpochOutcome::Skipped(SkipReason::AlreadyCommitted));
        }
        if !self.schedule.in_window(epoch) {
            return Ok(EpochOutcome::Skipped(SkipReason::OutsideWindow));
        }
        let trial_open = matches!(self.state, SearchState::TrialOpen(_));
        if !self.schedule.opens_at(epoch) {
            let reason = if trial_open { SkipReason::TrialInProgress } else { SkipReason::OffInterval };
            return Ok(EpochOutcome::Skipped(reason));
        }
        if trial_open {
            return Err(AutoPruneError::ordering(format!(
                "epoch {epoch} would open a trial while the previous one is still open"
            )));
        }

        let tokens = self.controller.next_tokens()?;
        if let Err(err) = self.check_aligned(&tokens) {
            self.controller.abandon();
            return Err(err);
        }
        let ratios = tokens_to_ratios(&tokens);

        let mut backup = TrialBackup::new();
        let report = match self.pruner.prune_tensors(
            &mut ctx.optimize_graph,
            &mut ctx.scope,
            &self.params,
            &ratios,
            &ctx.place,
            Some(&mut backup),
        ) {
            Ok(report) => report,
            Err(err) => {
                self.controller.abandon();
                // Undo whatever was applied before the failure; the prune error is the one reported.
                if let Err(restore_err) =
                    backup.restore(&mut ctx.optimize_graph, &mut ctx.scope, &ctx.place, &[])
                {
                    tracing::error!(
                        epoch,
                        error = %err,
                        restore_error = %restore_err,
                        "failed trial could not be rolled back"
                    );
                }
                return Err(err);
            }
        };

        tracing::info!(
            epoch,
            ?tokens,
            mutated = report.mutated.len(),
            flops = ctx.optimize_graph.flops(),
            "trial opened"
        );

        self.state = SearchState::TrialOpen(OpenTrial {
            tokens: tokens.clone(),
            opened_at: epoch,
            backup,
            mutated: report.mutated,
        });
        self.current_tokens = tokens.clone();
        self.sync_graphs(ctx)?;

        let skip_training = self.schedule.skips_training();
        ctx.skip_training = skip_training;
        Ok(EpochOutcome::TrialOpened { tokens, skip_training })
    }

    fn end_epoch<G, S>(&mut self, ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome>
    where
        G: ModelGraph,
        S: ParamScope,
    {
        self.ensure_initialized()?;
        let epoch = ctx.epoch_id;

        if matches!(self.state, SearchState::Committed) {
            return Ok(EpochOutcome::Skipped(SkipReason::AlreadyCommitted));
        }
        if self.schedule.is_commit_epoch(epoch) {
            return self.commit(ctx);
        }
        if !self.schedule.in_window(epoch) {
            return Ok(EpochOutcome::Skipped(SkipReason::OutsideWindow));
        }

        let (tokens, opened_at) = match &self.state {
            SearchState::TrialOpen(trial) => (trial.tokens.clone(), trial.opened_at),
            _ => return Ok(EpochOutcome::Skipped(SkipReason::NoOpenTrial)),
        };
        if epoch < self.schedule.close_epoch(opened_at) {
            return Ok(EpochOutcome::Skipped(SkipReason::TrialInProgress));
        }

        let metric = self.config.metric_name();
        let reward =
            ctx.latest_metric(metric).ok_or_else(|| AutoPruneError::MissingMetric(metric.to_string()))?;
        self.controller.update(&tokens, reward)?;
        self.restore_and_resync(ctx, Settle::Transient)?;

        tracing::info!(epoch, ?tokens, reward, "trial scored and restored");
        Ok(EpochOutcome::TrialClosed { tokens, reward })
    }

    fn commit<G, S>(&mut self, ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome>
    where
        G: ModelGraph,
        S: ParamScope,
    {
        if let Some(unscored) = self.controller.abandon() {
            tracing::debug!(tokens = ?unscored, "dropping unscored proposal at final epoch");
        }

        let tokens = match self.controller.best_tokens() {
            Some(best) => best.to_vec(),
            None => {
                tracing::warn!(
                    tokens = ?self.seed_tokens,
                    "controller has no best tokens, committing the uniform seed"
                );
                self.seed_tokens.clone()
            }
        };
        self.check_aligned(&tokens)?;
        let ratios = tokens_to_ratios(&tokens);

        self.restore_and_resync(ctx, Settle::Permanent(&ratios))?;
        ctx.skip_training = false;

        tracing::info!(
            epoch = ctx.epoch_id,
            ?tokens,
            flops = ctx.optimize_graph.flops(),
            params = ctx.optimize_graph.numel_params(),
            "best pruning configuration committed"
        );
        Ok(EpochOutcome::Committed { tokens, ratios })
    }

    /// Restore any open trial, optionally apply permanent ratios, then resync.
    fn restore_and_resync<G, S>(&mut self, ctx: &mut SearchContext<G, S>, settle: Settle<'_>) -> Result<()>
    where
        G: ModelGraph,
        S: ParamScope,
    {
        match std::mem::replace(&mut self.state, SearchState::Idle) {
            SearchState::TrialOpen(mut trial) => {
                let restored =
                    trial.backup.restore(&mut ctx.optimize_graph, &mut ctx.scope, &ctx.place, &trial.mutated);
                if let Err(err) = restored {
                    self.state = SearchState::TrialOpen(trial);
                    return Err(err);
                }
                tracing::debug!(opened_at = trial.opened_at, params = trial.mutated.len(), "trial restored");
            }
            other => self.state = other,
        }

        if let Settle::Permanent(ratios) = settle {
            self.pruner.prune_tensors(
                &mut ctx.optimize_graph,
                &mut ctx.scope,
                &self.params,
                ratios,
                &ctx.place,
                None,
            )?;
            self.state = SearchState::Committed;
        }

        self.sync_graphs(ctx)
    }

    /// Mirror optimize → eval, recompute group bookkeeping, recompile.
    fn sync_graphs<G, S>(&self, ctx: &mut SearchContext<G, S>) -> Result<()>
    where
        G: ModelGraph,
        S: ParamScope,
    {
        mirror_structure(&mut ctx.eval_graph, &ctx.optimize_graph)?;
        ctx.optimize_graph.resync_structure();
        ctx.eval_graph.resync_structure();
        ctx.optimize_graph.compile()
    }
}

impl<C, P, G, S> CompressionStrategy<G, S> for AutoPruneStrategy<C, P>
where
    C: SearchController,
    P: Pruner + Clone + 'static,
    G: ModelGraph + Clone + 'static,
    S: ParamScope,
{
    fn on_compression_begin(&mut self, ctx: &mut SearchContext<G, S>) -> Result<()> {
        self.observed(|s| s.begin_compression(ctx))
    }

    fn on_epoch_begin(&mut self, ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome> {
        self.observed(|s| {
            let _span = tracing::debug_span!("on_epoch_begin", epoch = ctx.epoch_id).entered();
            s.begin_epoch(ctx)
        })
    }

    fn on_epoch_end(&mut self, ctx: &mut SearchContext<G, S>) -> Result<EpochOutcome> {
        self.observed(|s| {
            let _span = tracing::debug_span!("on_epoch_end", epoch = ctx.epoch_id).entered();
            s.end_epoch(ctx)
        })
    }

    fn name(&self) -> &'static str {
        "AutoPruneStrategy"
    }
}
