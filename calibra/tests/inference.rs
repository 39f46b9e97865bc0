use approx::{assert_abs_diff_eq, assert_relative_eq};
use calibra::graph::{FixedOrder, MinFill};
use calibra::{
    CalibraError, CalibrationConfig, ClusterGraph, ClusterGraphInferencer, DiscreteFactor,
    DiscreteQueries, GaussianFactor, Inferencer, MessageKind, NaiveInferencer, Scope, Variable,
    VariableElimination,
};
use ndarray::array;

fn var(id: &str, cardinality: usize) -> Variable {
    Variable::discrete(id, cardinality)
}

fn scope_of(vars: &[&Variable]) -> Scope {
    Scope::new(vars.iter().map(|v| (*v).clone()))
}

/// A, B ∈ {0, 1, 2} are independent parents of C ∈ {0, 1}.
fn three_node_network() -> Vec<DiscreteFactor> {
    let (a, b, c) = (var("A", 3), var("B", 3), var("C", 2));
    let pa = DiscreteFactor::new(scope_of(&[&a]), vec![0.1, 0.4, 0.5]).unwrap();
    let pb = DiscreteFactor::new(scope_of(&[&b]), vec![0.5, 0.2, 0.3]).unwrap();
    // P(C = 0 | A, B), A varying fastest
    let c0 = [0.2, 0.6, 0.9, 0.45, 0.4, 0.7, 0.25, 0.4, 0.7];
    let table: Vec<f64> = c0.iter().copied().chain(c0.iter().map(|p| 1.0 - p)).collect();
    let pc = DiscreteFactor::new(scope_of(&[&a, &b, &c]), table).unwrap();
    vec![pa, pb, pc]
}

fn check_three_node_queries(inferencer: &mut dyn Inferencer<DiscreteFactor>) {
    let c = scope_of(&[&var("C", 2)]);
    let a = scope_of(&[&var("A", 3)]);
    assert_abs_diff_eq!(inferencer.joint(&c, &[0]).unwrap(), 0.6265, epsilon = 1e-9);
    assert_abs_diff_eq!(inferencer.joint(&c, &[1]).unwrap(), 0.3735, epsilon = 1e-9);
    let posterior = inferencer.conditional_distribution(&a, &c, &[1]).unwrap();
    assert_abs_diff_eq!(posterior.value(&[0]).unwrap(), 0.196787149, epsilon = 1e-9);
    assert_abs_diff_eq!(posterior.sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
        inferencer.conditional(&a, &[0], &c, &[1]).unwrap(),
        0.196787149,
        epsilon = 1e-9
    );
    // P(A = 0, C = 1) = P(A = 0 | C = 1) P(C = 1)
    assert_abs_diff_eq!(
        inferencer.joint_with_evidence(&a, &[0], &c, &[1]).unwrap(),
        0.196787149 * 0.3735,
        epsilon = 1e-9
    );
}

#[test]
fn exact_inferencers_agree() {
    let factors = three_node_network();
    check_three_node_queries(&mut NaiveInferencer::new(factors.clone()));
    check_three_node_queries(&mut VariableElimination::new(factors.clone()));
    check_three_node_queries(&mut ClusterGraphInferencer::new(&factors).unwrap());
    for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
        let config = CalibrationConfig::exact().with_message_kind(kind);
        let mut jt = ClusterGraphInferencer::junction_tree(&factors, &MinFill, config).unwrap();
        check_three_node_queries(&mut jt);
        let report = jt.report().unwrap();
        assert!(report.converged);
        assert_eq!(report.message_kind, kind);
    }
}

#[test]
fn any_valid_elimination_order() {
    let factors = three_node_network();
    let ve = VariableElimination::new(factors.clone());
    let c = scope_of(&[&var("C", 2)]);
    for order in [["A", "B"], ["B", "A"]] {
        let order: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        let marginal = ve.marginal_with_order(&c, &order).unwrap().normalize();
        assert_abs_diff_eq!(marginal.value(&[0]).unwrap(), 0.6265, epsilon = 1e-9);
    }
    let mut fixed = VariableElimination::with_heuristic(
        factors,
        FixedOrder(vec!["B".to_owned(), "A".to_owned()]),
    );
    assert_abs_diff_eq!(fixed.joint(&c, &[1]).unwrap(), 0.3735, epsilon = 1e-9);
}

#[test]
fn elimination_order_must_partition_the_model() {
    let ve = VariableElimination::new(three_node_network());
    let c = scope_of(&[&var("C", 2)]);
    let invalid: [&[&str]; 4] = [&["A"], &["A", "B", "C"], &["A", "A", "B"], &["A", "B", "Z"]];
    for order in invalid {
        let order: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            ve.marginal_with_order(&c, &order),
            Err(CalibraError::EliminationScope { .. })
        ));
    }
}

#[test]
fn queries_outside_the_model() {
    let factors = three_node_network();
    let z = scope_of(&[&var("Z", 2)]);
    let mut naive = NaiveInferencer::new(factors.clone());
    assert!(matches!(
        naive.marginal(&z),
        Err(CalibraError::ScopeMismatch { .. })
    ));
    let mut jt = ClusterGraphInferencer::new(&factors).unwrap();
    assert!(jt.marginal(&z).is_err());
}

/// A, B, C, D pairwise connected in a ring, with a unary factor on A.
fn ring() -> Vec<DiscreteFactor> {
    let pair = |x: &str, y: &str, values: [f64; 4]| {
        DiscreteFactor::new(scope_of(&[&var(x, 2), &var(y, 2)]), values.to_vec()).unwrap()
    };
    vec![
        DiscreteFactor::new(scope_of(&[&var("A", 2)]), vec![0.3, 0.7]).unwrap(),
        pair("A", "B", [10.0, 1.0, 1.0, 5.0]),
        pair("B", "C", [2.0, 3.0, 7.0, 1.0]),
        pair("C", "D", [1.0, 4.0, 6.0, 2.0]),
        pair("A", "D", [5.0, 1.0, 2.0, 8.0]),
    ]
}

fn brute_force(factors: &[DiscreteFactor], id: &str) -> DiscreteFactor {
    NaiveInferencer::new(factors.to_vec())
        .marginal(&scope_of(&[&var(id, 2)]))
        .unwrap()
        .normalize()
}

#[test]
fn loopy_schedules_on_junction_tree_are_exact() {
    let factors = ring();
    let configs = [CalibrationConfig::round_robin(), CalibrationConfig::prioritized()];
    for config in configs {
        for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
            let config = config.with_message_kind(kind);
            let mut jt = ClusterGraphInferencer::junction_tree(&factors, &MinFill, config).unwrap();
            for id in ["A", "B", "C", "D"] {
                let expected = brute_force(&factors, id);
                let got = jt.marginal(expected.scope()).unwrap().normalize();
                assert_abs_diff_eq!(got.values(), expected.values(), epsilon = 1e-6);
            }
            let report = jt.report().unwrap();
            assert!(report.converged, "{:?}", report);
            assert!(report.iterations <= report.max_iterations);
        }
    }
}

#[test]
fn bethe_graph_converges_to_one_fixed_point() {
    let factors = ring();
    for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
        let mut marginals = Vec::new();
        for config in [CalibrationConfig::round_robin(), CalibrationConfig::prioritized()] {
            let graph = ClusterGraph::bethe(&factors).unwrap();
            let config = config.with_message_kind(kind).with_max_iterations(10_000);
            let mut inferencer = ClusterGraphInferencer::with_graph(graph, config).unwrap();
            let mut per_variable = Vec::new();
            for id in ["A", "B", "C", "D"] {
                let marginal = inferencer
                    .marginal(&scope_of(&[&var(id, 2)]))
                    .unwrap()
                    .normalize();
                assert_abs_diff_eq!(marginal.sum(), 1.0, epsilon = 1e-12);
                assert!(marginal.values().iter().all(|p| *p > 0.0));
                per_variable.push(marginal);
            }
            let report = inferencer.report().unwrap();
            assert!(report.converged, "{:?}", report);
            assert!(report.iterations <= report.max_iterations);
            marginals.push(per_variable);
        }
        for (rr, prio) in marginals[0].iter().zip(marginals[1].iter()) {
            assert_abs_diff_eq!(rr.values(), prio.values(), epsilon = 1e-6);
        }
    }
}

#[test]
fn default_iteration_cap_is_ten_per_edge() {
    let graph = ClusterGraph::bethe(&ring()).unwrap();
    let edges = graph.num_edges();
    let mut inferencer =
        ClusterGraphInferencer::with_graph(graph, CalibrationConfig::round_robin()).unwrap();
    inferencer.marginal(&scope_of(&[&var("A", 2)])).unwrap();
    let report = inferencer.report().unwrap();
    assert_eq!(report.max_iterations, 10 * edges);
    assert!(report.iterations <= report.max_iterations);
}

/// P(A) P(B | A) P(C | B)
fn chain() -> Vec<DiscreteFactor> {
    let (a, b, c) = (var("A", 2), var("B", 2), var("C", 2));
    vec![
        DiscreteFactor::new(scope_of(&[&a]), vec![0.3, 0.7]).unwrap(),
        DiscreteFactor::new(scope_of(&[&a, &b]), vec![0.9, 0.2, 0.1, 0.8]).unwrap(),
        DiscreteFactor::new(scope_of(&[&b, &c]), vec![0.6, 0.3, 0.4, 0.7]).unwrap(),
    ]
}

/// Every engine on a tree-shaped cluster graph, with loopy schedules included.
fn tree_engines(factors: &[DiscreteFactor]) -> Vec<Box<dyn Inferencer<DiscreteFactor>>> {
    let mut engines: Vec<Box<dyn Inferencer<DiscreteFactor>>> = vec![
        Box::new(NaiveInferencer::new(factors.to_vec())),
        Box::new(VariableElimination::new(factors.to_vec())),
    ];
    for config in [
        CalibrationConfig::exact(),
        CalibrationConfig::round_robin(),
        CalibrationConfig::prioritized(),
    ] {
        for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
            let config = config.with_message_kind(kind);
            engines.push(Box::new(
                ClusterGraphInferencer::junction_tree(factors, &MinFill, config).unwrap(),
            ));
        }
    }
    engines
}

#[test]
fn engines_agree_on_unnormalized_marginals() {
    let factors = ring();
    let mut naive = NaiveInferencer::new(factors.clone());
    let expected: Vec<DiscreteFactor> = ["A", "B", "C", "D"]
        .iter()
        .map(|id| naive.marginal(&scope_of(&[&var(id, 2)])).unwrap())
        .collect();
    let partition = expected[0].sum();
    for mut engine in tree_engines(&factors) {
        for e in expected.iter() {
            let got = engine.marginal(e.scope()).unwrap();
            assert_relative_eq!(got.values(), e.values(), max_relative = 1e-9);
            assert_relative_eq!(got.sum(), partition, max_relative = 1e-9);
        }
        let a = scope_of(&[&var("A", 2)]);
        assert_relative_eq!(
            engine.joint(&a, &[1]).unwrap(),
            expected[0].value(&[1]).unwrap(),
            max_relative = 1e-9
        );
        assert!(engine.joint(&a, &[1]).unwrap() > 1.0);
    }
}

#[test]
fn bayesian_network_marginals_sum_to_one() {
    let factors = chain();
    let mut engines = tree_engines(&factors);
    for config in [CalibrationConfig::round_robin(), CalibrationConfig::prioritized()] {
        for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
            let graph = ClusterGraph::bethe(&factors).unwrap();
            let config = config.with_message_kind(kind);
            engines.push(Box::new(
                ClusterGraphInferencer::with_graph(graph, config).unwrap(),
            ));
        }
    }
    let (a, b, c) = (
        scope_of(&[&var("A", 2)]),
        scope_of(&[&var("B", 2)]),
        scope_of(&[&var("C", 2)]),
    );
    for engine in engines.iter_mut() {
        let pa = engine.marginal(&a).unwrap();
        assert_abs_diff_eq!(pa.values(), ndarray::aview1(&[0.3, 0.7]), epsilon = 1e-9);
        // P(B = 0) = 0.3 * 0.9 + 0.7 * 0.2, P(C = 0) = 0.41 * 0.6 + 0.59 * 0.3
        assert_abs_diff_eq!(engine.marginal(&c).unwrap().sum(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(engine.joint(&c, &[0]).unwrap(), 0.423, epsilon = 1e-9);
        // P(A = 1, B = 0) = 0.7 * 0.2, evidence applied without renormalizing
        assert_abs_diff_eq!(
            engine.joint_with_evidence(&a, &[1], &b, &[0]).unwrap(),
            0.14,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            engine.conditional(&a, &[1], &b, &[0]).unwrap(),
            0.14 / 0.41,
            epsilon = 1e-9
        );
        // contradicting the evidence on a shared variable
        assert_eq!(engine.joint_with_evidence(&c, &[1], &c, &[0]).unwrap(), 0.0);
    }
}

#[test]
fn markov_network_queries_keep_the_model_scale() {
    let factors = ring();
    let mut naive = NaiveInferencer::new(factors.clone());
    let ab = naive
        .marginal(&scope_of(&[&var("A", 2), &var("B", 2)]))
        .unwrap();
    let (a, b) = (scope_of(&[&var("A", 2)]), scope_of(&[&var("B", 2)]));
    let mut jt = ClusterGraphInferencer::new(&factors).unwrap();
    // ab is indexed with A varying fastest
    let joint = ab.value(&[1, 0]).unwrap();
    assert_relative_eq!(
        jt.joint_with_evidence(&a, &[1], &b, &[0]).unwrap(),
        joint,
        max_relative = 1e-9
    );
    let b0 = ab.value(&[0, 0]).unwrap() + joint;
    assert_relative_eq!(
        jt.conditional(&a, &[1], &b, &[0]).unwrap(),
        joint / b0,
        max_relative = 1e-9
    );
}

#[test]
fn iteration_cap_is_soft() {
    let factors = ring();
    let graph = ClusterGraph::bethe(&factors).unwrap();
    let config = CalibrationConfig::round_robin().with_max_iterations(3);
    let mut inferencer = ClusterGraphInferencer::with_graph(graph, config).unwrap();
    let marginal = inferencer.marginal(&scope_of(&[&var("B", 2)])).unwrap();
    assert!(marginal.sum() > 0.0);
    let report = inferencer.report().unwrap();
    assert!(!report.converged);
    assert_eq!(report.iterations, 3);
}

#[test]
fn exact_policy_needs_a_tree() {
    let graph = ClusterGraph::bethe(&ring()).unwrap();
    let mut inferencer = ClusterGraphInferencer::with_graph(graph, CalibrationConfig::exact()).unwrap();
    assert_eq!(
        inferencer.marginal(&scope_of(&[&var("A", 2)])).map(|f| f.sum()),
        Err(CalibraError::NotTree)
    );
}

#[test]
fn uncovered_query() {
    let mut jt = ClusterGraphInferencer::new(&ring()).unwrap();
    // the junction tree of the ring has clusters {A, B, D} and {B, C, D}
    let ac = scope_of(&[&var("A", 2), &var("C", 2)]);
    assert_eq!(
        jt.marginal(&ac).map(|f| f.sum()),
        Err(CalibraError::UncoveredQuery(vec!["A".to_owned(), "C".to_owned()]))
    );
    // the variable elimination engine has no such restriction
    let mut ve = VariableElimination::new(ring());
    let mut naive = NaiveInferencer::new(ring());
    let expected = naive.marginal(&ac).unwrap().normalize();
    let got = ve.marginal(&ac).unwrap().normalize();
    assert_abs_diff_eq!(got.values(), expected.values(), epsilon = 1e-12);
}

#[test]
fn calibrated_state_is_read_only() {
    let factors = ring();
    let mut jt = ClusterGraphInferencer::new(&factors).unwrap();
    let cluster = jt.graph().clusters()[0].clone();
    let replacement = DiscreteFactor::uniform(cluster.factors()[0].scope().clone()).unwrap();
    jt.replace_factor_potential(0, 0, replacement.clone()).unwrap();
    jt.calibrate().unwrap();
    assert!(jt.state().is_frozen());
    assert_eq!(
        jt.replace_factor_potential(0, 0, replacement),
        Err(CalibraError::ReadOnly)
    );
}

#[test]
fn gaussian_chain() {
    // X ~ N(1, 2), Y | X ~ N(0.5 X, 1), Z | Y ~ N(Y + 1, 0.5)
    let (x, y, z) = (
        Variable::continuous("X"),
        Variable::continuous("Y"),
        Variable::continuous("Z"),
    );
    let factors = vec![
        GaussianFactor::from_moment_form(
            Scope::new([x.clone()]),
            array![1.0].view(),
            array![[2.0]].view(),
        )
        .unwrap(),
        GaussianFactor::linear_conditional(y.clone(), &[x.clone()], &[0.5], 0.0, 1.0).unwrap(),
        GaussianFactor::linear_conditional(z.clone(), &[y.clone()], &[1.0], 1.0, 0.5).unwrap(),
    ];
    let expected = [("X", 1.0, 2.0), ("Y", 0.5, 1.5), ("Z", 1.5, 2.0)];
    let mut engines: Vec<Box<dyn Inferencer<GaussianFactor>>> = vec![
        Box::new(NaiveInferencer::new(factors.clone())),
        Box::new(VariableElimination::new(factors.clone())),
    ];
    for kind in [MessageKind::SumProduct, MessageKind::BeliefUpdate] {
        let config = CalibrationConfig::exact().with_message_kind(kind);
        engines.push(Box::new(
            ClusterGraphInferencer::junction_tree(&factors, &MinFill, config).unwrap(),
        ));
    }
    for engine in engines.iter_mut() {
        for (id, mean, variance) in expected {
            let marginal = engine
                .marginal(&Scope::new([Variable::continuous(id)]))
                .unwrap();
            let (m, c) = marginal.to_moment_form().unwrap();
            assert_abs_diff_eq!(m[0], mean, epsilon = 1e-9);
            assert_abs_diff_eq!(c[[0, 0]], variance, epsilon = 1e-9);
            // the model is normalized, so are its marginals
            assert_abs_diff_eq!(
                marginal.log_normalizer(),
                marginal.normalize().unwrap().log_normalizer(),
                epsilon = 1e-9
            );
        }
    }
    // Cov(Y, Z) = Var(Y)
    let mut naive = NaiveInferencer::new(factors);
    let yz = naive.marginal(&Scope::new([y, z])).unwrap();
    let (_, c) = yz.to_moment_form().unwrap();
    assert_abs_diff_eq!(c, array![[1.5, 1.5], [1.5, 2.0]], epsilon = 1e-9);
}
