use calibra::graph::MinFill;
use calibra::{
    CalibrationConfig, ClusterGraph, ClusterGraphInferencer, DiscreteFactor, Inferencer,
    MessageKind, Scope, Variable, VariableElimination,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256StarStar;

type BenchMarkGroup<'a> = criterion::BenchmarkGroup<'a, criterion::measurement::WallTime>;

/// Grid of `side × side` variables with `nc` values, one factor per horizontal and vertical
/// neighbour pair.
fn gen_grid(side: usize, nc: usize) -> Vec<DiscreteFactor> {
    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let var = |i: usize, j: usize| Variable::discrete(format!("x{}_{}", i, j), nc);
    let mut factors = Vec::new();
    for i in 0..side {
        for j in 0..side {
            let mut pairs = Vec::new();
            if i + 1 < side {
                pairs.push(var(i + 1, j));
            }
            if j + 1 < side {
                pairs.push(var(i, j + 1));
            }
            for other in pairs {
                let scope = Scope::new([var(i, j), other]);
                let values = Array1::<f64>::random_using(
                    scope.num_distinct_values(),
                    Uniform::new(0.1, 1.0),
                    &mut rng,
                );
                if let Ok(f) = DiscreteFactor::new(scope, values) {
                    factors.push(f);
                }
            }
        }
    }
    factors
}

fn bench_exact_inner(side: usize, nc: usize, group: &mut BenchMarkGroup) {
    let factors = gen_grid(side, nc);
    let projection = Scope::new([Variable::discrete("x0_0", nc)]);
    group.bench_with_input(BenchmarkId::new("variable_elimination", side), &side, |b, _| {
        let mut ve = VariableElimination::new(factors.clone());
        b.iter(|| ve.marginal(&projection).unwrap())
    });
    group.bench_with_input(BenchmarkId::new("junction_tree", side), &side, |b, _| {
        b.iter(|| {
            let mut jt = ClusterGraphInferencer::new(&factors).unwrap();
            jt.marginal(&projection).unwrap()
        })
    });
}

fn bench_loopy_inner(side: usize, nc: usize, kind: MessageKind, group: &mut BenchMarkGroup) {
    let factors = gen_grid(side, nc);
    let projection = Scope::new([Variable::discrete("x0_0", nc)]);
    for (name, config) in [
        ("round_robin", CalibrationConfig::round_robin()),
        ("prioritized", CalibrationConfig::prioritized()),
    ] {
        let config = config.with_message_kind(kind).with_tolerance(1e-8);
        group.bench_with_input(BenchmarkId::new(name, side), &side, |b, _| {
            b.iter(|| {
                let graph = ClusterGraph::bethe(&factors).unwrap();
                let mut inferencer = ClusterGraphInferencer::with_graph(graph, config).unwrap();
                inferencer.marginal(&projection).unwrap()
            })
        });
    }
}

fn bench_exact(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact");
    for side in [3, 4, 5] {
        bench_exact_inner(side, 2, &mut group);
    }
    group.finish();
}

fn bench_loopy(c: &mut Criterion) {
    for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
        let mut group = c.benchmark_group(format!("loopy_{:?}", kind));
        for side in [4, 8] {
            bench_loopy_inner(side, 4, kind, &mut group);
        }
        group.finish();
    }
}

fn bench_junction_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    for side in [4, 6, 8] {
        let factors = gen_grid(side, 2);
        group.bench_with_input(BenchmarkId::new("min_fill", side), &side, |b, _| {
            b.iter(|| ClusterGraph::junction_tree(&factors, &MinFill).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_exact,
    bench_loopy,
    bench_junction_tree_construction
);
criterion_main!(benches);
