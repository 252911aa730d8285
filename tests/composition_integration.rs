//! Integration tests for the composition algebra.
//!
//! These cover chain building across both flavors, the way groups absorb the
//! operands composed around them, and the rejected compositions.

mod common;

use chainable::pipeline::{
    compose, AsyncFnStage, AsyncGroup, AsyncPipeline, FallibleStage, Pipeline, PureStage, Stage,
    ThreadGroup,
};
use chainable::{BatchItem, PipelineError};
use common::{async_square, init_tracing, square};
use pretty_assertions::assert_eq;

// ============================================================================
// Linear chains
// ============================================================================

#[test]
fn test_square_of_square() {
    init_tracing();
    let chain = compose(Pipeline::new(square()), Pipeline::new(square())).unwrap();
    assert_eq!(chain.process(vec![3]).unwrap(), vec![81]);
}

#[test]
fn test_compose_matches_manual_chaining() {
    let inc = || PureStage::new("Inc", |x: i64| x + 1);
    let triple = || PureStage::new("Triple", |x: i64| x * 3);

    let composed = compose(Pipeline::new(inc()), Pipeline::new(triple())).unwrap();
    for x in [-5, 0, 1, 42] {
        let manual = triple().process(inc().process(x).unwrap()).unwrap();
        assert_eq!(composed.process(x).unwrap(), manual);
    }
}

#[test]
fn test_chain_names_join_in_order() {
    let chain = Pipeline::new(PureStage::new("Parse", |s: String| s.len()))
        .then(PureStage::new("Double", |n: usize| n * 2))
        .then(PureStage::new("Render", |n: usize| n.to_string()));

    assert_eq!(chain.name(), "Parse | Double | Render");
    assert_eq!(chain.process("abc".to_string()).unwrap(), "6");
}

#[test]
fn test_error_stops_chain_and_names_stage() {
    let chain = Pipeline::new(FallibleStage::new("Parse", |s: String| {
        s.parse::<i64>().map_err(|e| PipelineError::other(e.to_string()))
    }))
    .then(PureStage::new("Negate", |n: i64| -n));

    assert_eq!(chain.process("12".to_string()).unwrap(), -12);

    let err = chain.process("twelve".to_string()).unwrap_err();
    assert_eq!(
        err,
        PipelineError::stage("Parse", "invalid digit found in string")
    );
}

#[tokio::test]
async fn test_async_chain_matches_sync_chain() {
    let sync_chain = compose(Pipeline::new(square()), Pipeline::new(square())).unwrap();
    let async_chain =
        compose(AsyncPipeline::new(async_square()), AsyncPipeline::new(async_square())).unwrap();

    for n in [0, 1, 2, 7] {
        assert_eq!(
            sync_chain.process(vec![n]).unwrap(),
            async_chain.process(vec![n]).await.unwrap()
        );
    }
}

// ============================================================================
// Groups in composition
// ============================================================================

#[test]
fn test_group_absorbs_both_sides() {
    let pre = Pipeline::new(PureStage::new("Shift", |v: Vec<i64>| {
        v.into_iter().map(|x| x + 1).collect::<Vec<_>>()
    }));
    let group = compose(pre, ThreadGroup::new(Some(2)).unwrap()).unwrap();
    let group = compose(group, Pipeline::new(square())).unwrap();
    let group = compose(
        group,
        Pipeline::new(PureStage::new("Render", |v: Vec<i64>| format!("{}", v[0]))),
    )
    .unwrap();

    assert!(group.is_configured());
    assert_eq!(
        group.process(BatchItem::singles([1, 2, 3])).unwrap(),
        vec!["4".to_string(), "9".to_string(), "16".to_string()]
    );
}

#[test]
fn test_group_feeds_downstream_through_then() {
    let group = ThreadGroup::new(Some(2))
        .unwrap()
        .then(square())
        .unwrap();
    let total = Pipeline::new(group).then(PureStage::new("Sum", |outs: Vec<Vec<i64>>| {
        outs.into_iter().flatten().sum::<i64>()
    }));

    assert_eq!(total.process(BatchItem::singles([1, 2, 3])).unwrap(), 14);
}

#[test]
fn test_then_runs_group_as_plain_stage() {
    let group = ThreadGroup::new(Some(2)).unwrap().then(square()).unwrap();
    let chain = Pipeline::new(PureStage::new("Batch", |xs: Vec<i64>| BatchItem::singles(xs)))
        .then(group);

    // The group receives the whole batch instead of absorbing the upstream stage.
    assert_eq!(chain.name(), "Batch | ThreadGroup");
    assert_eq!(
        chain.process(vec![2, 3]).unwrap(),
        vec![vec![4], vec![9]]
    );
}

#[test]
fn test_group_with_group_is_rejected() {
    let left = ThreadGroup::new(Some(1))
        .unwrap()
        .named("left")
        .then(square())
        .unwrap();
    let right = ThreadGroup::new(Some(1))
        .unwrap()
        .named("right")
        .then(square())
        .unwrap();

    let err = compose(left, right).err().unwrap();
    assert!(err.is_composition_error());
    assert_eq!(
        err.to_string(),
        "Composition error: cannot compose group 'left' with group 'right'"
    );
}

#[tokio::test]
async fn test_async_group_absorbs_both_sides() {
    let pre = AsyncPipeline::new(AsyncFnStage::new("Shift", |v: Vec<i64>| async move {
        Ok::<_, PipelineError>(v.into_iter().map(|x| x + 1).collect::<Vec<_>>())
    }));
    let group = compose(pre, AsyncGroup::new(Some(2)).unwrap()).unwrap();
    let group = compose(group, AsyncPipeline::new(async_square())).unwrap();

    assert_eq!(
        group.process(BatchItem::singles([1, 2, 3])).await.unwrap(),
        vec![vec![4], vec![9], vec![16]]
    );
}

#[test]
fn test_composition_after_first_batch_is_sealed() {
    let group = ThreadGroup::new(Some(2))
        .unwrap()
        .named("squares")
        .then(square())
        .unwrap();
    group.process(BatchItem::singles([1])).unwrap();

    let err = compose(group, Pipeline::new(square())).err().unwrap();
    assert_eq!(err, PipelineError::sealed("squares"));
}
