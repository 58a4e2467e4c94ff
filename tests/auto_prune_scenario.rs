//! End-to-end auto-prune search over a three-layer conv chain

use std::collections::VecDeque;

use entrenar_autoprune::graph::{
    ConvLayer, ModelGraph, ParamScope, Placement, SearchContext, SequentialConvGraph, TensorScope,
};
use entrenar_autoprune::prune::{
    ratios_to_tokens, AutoPruneConfig, AutoPruneStrategy, ChannelPruner, CompressionStrategy, ConstraintEvaluator,
    EpochOutcome, SearchPhase, SkipReason, Token,
};
use entrenar_autoprune::search::{ConstraintPredicate, SaConfig, SaController, SearchController};

type Ctx = SearchContext<SequentialConvGraph, TensorScope>;

fn scenario_graph() -> SequentialConvGraph {
    SequentialConvGraph::new(
        3,
        vec![
            ConvLayer::new("conv1_weights", [64, 3, 3, 3], (1, 1)),
            ConvLayer::new("conv2_weights", [128, 64, 3, 3], (1, 1)),
            ConvLayer::new("conv3_weights", [256, 128, 3, 3], (1, 1)),
        ],
    )
    .expect("valid graph")
}

fn scenario_ctx() -> Ctx {
    let graph = scenario_graph();
    let scope = TensorScope::for_graph(&graph, |name, i| {
        let salt = name.len() as f32;
        ((i as f32 * 0.37 + salt).sin() * 100.0).round() / 100.0
    });
    SearchContext::new(graph.clone(), graph, scope, Placement::Cpu)
}

fn params() -> Vec<String> {
    vec!["conv1_weights".into(), "conv2_weights".into(), "conv3_weights".into()]
}

fn band_config(end_epoch: usize) -> AutoPruneConfig {
    AutoPruneConfig::default()
        .with_epochs(0, end_epoch)
        .with_flops_band(0.5, 0.7)
        .with_metric("top1_acc")
        .with_pruned_params("conv.*_weights")
}

/// Pretend accuracy: larger models score higher.
fn evaluate(ctx: &mut Ctx) {
    let baseline = 370_368.0;
    let acc = ctx.optimize_graph.flops() as f64 / baseline;
    ctx.record_metric("top1_acc", acc);
}

fn assert_scope_matches_graph(ctx: &Ctx) {
    for name in ctx.optimize_graph.parameter_names() {
        let tensor = ctx.scope.tensor(&name).expect("tensor present");
        assert_eq!(tensor.shape(), ctx.optimize_graph.shape(&name).expect("shape present"), "{name}");
    }
}

struct Replay {
    queue: VecDeque<Vec<Token>>,
    seed: Vec<Token>,
    best: Option<(Vec<Token>, f64)>,
}

impl Replay {
    fn new(proposals: Vec<Vec<Token>>) -> Self {
        Self { queue: proposals.into(), seed: Vec::new(), best: None }
    }
}

impl SearchController for Replay {
    fn reset(&mut self, _range: Vec<Token>, initial: Vec<Token>, _c: Box<dyn ConstraintPredicate>) {
        self.seed = initial;
    }

    fn next_tokens(&mut self) -> Vec<Token> {
        self.queue.pop_front().unwrap_or_else(|| self.seed.clone())
    }

    fn update(&mut self, tokens: &[Token], reward: f64) {
        if self.best.as_ref().map_or(true, |(_, best)| reward > *best) {
            self.best = Some((tokens.to_vec(), reward));
        }
    }

    fn best_tokens(&self) -> Option<&[Token]> {
        self.best.as_ref().map(|(t, _)| t.as_slice())
    }
}

#[test]
fn test_initializer_lands_inside_band() {
    let mut strategy = AutoPruneStrategy::new(band_config(10), ChannelPruner, Replay::new(Vec::new()))
        .expect("valid config");
    let mut ctx = scenario_ctx();
    strategy.on_compression_begin(&mut ctx).expect("initialization succeeds");

    let seed = strategy.current_tokens().to_vec();
    let evaluator = ConstraintEvaluator::new(params(), 0.5, 0.7, ChannelPruner);
    let reduction = evaluator.flops_reduction(&mut ctx.eval_graph, &seed).expect("measurable");
    assert!((0.5..=0.7).contains(&reduction), "seed {seed:?} reduces {reduction}");
    assert_eq!(ctx.eval_graph.shapes(), scenario_graph().shapes());
}

#[test]
fn test_scripted_search_trial_restore_commit() {
    let proposals = vec![vec![30, 40, 35], vec![20, 45, 40], vec![35, 35, 35]];
    let mut strategy =
        AutoPruneStrategy::new(band_config(3), ChannelPruner, Replay::new(proposals)).expect("valid config");
    let mut ctx = scenario_ctx();
    let baseline_scope = ctx.scope.clone();
    let baseline_shapes = ctx.optimize_graph.shapes();

    strategy.on_compression_begin(&mut ctx).expect("initialization succeeds");

    // Epoch 0: first trial opens with the expected shapes.
    ctx.epoch_id = 0;
    let opened = strategy.on_epoch_begin(&mut ctx).expect("trial opens");
    assert_eq!(opened, EpochOutcome::TrialOpened { tokens: vec![30, 40, 35], skip_training: true });
    assert_eq!(ctx.optimize_graph.shape("conv1_weights"), Some(&[45, 3, 3, 3][..]));
    assert_eq!(strategy.ledger_len(), 3);
    assert_scope_matches_graph(&ctx);

    evaluate(&mut ctx);
    assert!(matches!(strategy.on_epoch_end(&mut ctx), Ok(EpochOutcome::TrialClosed { .. })));
    assert_eq!(ctx.optimize_graph.shapes(), baseline_shapes);
    assert_eq!(ctx.eval_graph.shapes(), baseline_shapes);
    assert_eq!(ctx.scope, baseline_scope);
    assert_eq!(strategy.ledger_len(), 0);

    for epoch in 1..3 {
        ctx.epoch_id = epoch;
        strategy.on_epoch_begin(&mut ctx).expect("trial opens");
        assert_scope_matches_graph(&ctx);
        evaluate(&mut ctx);
        strategy.on_epoch_end(&mut ctx).expect("trial closes");
        assert_eq!(ctx.scope, baseline_scope, "epoch {epoch} left residue");
    }

    // Epoch 3 is the commit epoch; the trial it opens is dropped unscored.
    ctx.epoch_id = 3;
    strategy.on_epoch_begin(&mut ctx).expect("trial opens");
    evaluate(&mut ctx);
    let committed = strategy.on_epoch_end(&mut ctx).expect("commit succeeds");

    // [35, 35, 35] keeps the most FLOPs, so it scored best.
    let tokens = match committed {
        EpochOutcome::Committed { tokens, .. } => tokens,
        other => panic!("expected commit, got {other:?}"),
    };
    assert_eq!(tokens, vec![35, 35, 35]);
    assert_eq!(strategy.phase(), SearchPhase::Committed);
    assert_eq!(strategy.ledger_len(), 0);
    assert!(!ctx.skip_training);
    assert_eq!(ctx.optimize_graph.shape("conv1_weights"), Some(&[42, 3, 3, 3][..]));
    assert_eq!(ctx.eval_graph.shapes(), ctx.optimize_graph.shapes());
    assert_scope_matches_graph(&ctx);

    ctx.epoch_id = 4;
    assert_eq!(
        strategy.on_epoch_begin(&mut ctx).expect("skip"),
        EpochOutcome::Skipped(SkipReason::AlreadyCommitted)
    );
}

#[test]
fn test_repeated_trials_restore_identically() {
    let same = vec![vec![30, 40, 35]; 4];
    let mut strategy =
        AutoPruneStrategy::new(band_config(10), ChannelPruner, Replay::new(same)).expect("valid config");
    let mut ctx = scenario_ctx();
    let baseline = ctx.clone();
    strategy.on_compression_begin(&mut ctx).expect("initialization succeeds");

    for epoch in 0..4 {
        ctx.epoch_id = epoch;
        strategy.on_epoch_begin(&mut ctx).expect("trial opens");
        evaluate(&mut ctx);
        strategy.on_epoch_end(&mut ctx).expect("trial closes");
        assert_eq!(ctx.scope, baseline.scope);
        assert_eq!(ctx.optimize_graph.shapes(), baseline.optimize_graph.shapes());
    }
}

#[test]
fn test_annealing_search_end_to_end() {
    let end_epoch = 12;
    let controller = SaController::new(SaConfig { seed: 7, ..SaConfig::default() });
    let mut strategy =
        AutoPruneStrategy::new(band_config(end_epoch), ChannelPruner, controller).expect("valid config");
    let mut ctx = scenario_ctx();
    strategy.on_compression_begin(&mut ctx).expect("initialization succeeds");

    let evaluator = ConstraintEvaluator::new(params(), 0.5, 0.7, ChannelPruner);
    let mut oracle_graph = scenario_graph();
    let mut scored = 0;

    for epoch in 0..=end_epoch {
        ctx.epoch_id = epoch;
        if let EpochOutcome::TrialOpened { tokens, .. } = strategy.on_epoch_begin(&mut ctx).expect("begin") {
            assert!(evaluator.check(&mut oracle_graph, &tokens).expect("measurable"), "{tokens:?}");
        }
        assert!(ctx.skip_training, "trials are scored without retraining");
        evaluate(&mut ctx);
        match strategy.on_epoch_end(&mut ctx).expect("end") {
            EpochOutcome::TrialClosed { .. } => scored += 1,
            EpochOutcome::Committed { tokens, ratios } => {
                assert_eq!(ratios_to_tokens(&ratios), tokens);
                let reduction = 1.0 - ctx.optimize_graph.flops() as f64 / 370_368.0;
                assert!((0.5..=0.7).contains(&reduction), "committed reduction {reduction}");
            }
            other => panic!("unexpected outcome at epoch {epoch}: {other:?}"),
        }
    }

    assert_eq!(scored, end_epoch);
    assert_eq!(strategy.phase(), SearchPhase::Committed);
    assert_eq!(strategy.controller().scored(), end_epoch);
    assert_eq!(ctx.eval_graph.shapes(), ctx.optimize_graph.shapes());
    assert_scope_matches_graph(&ctx);
}
