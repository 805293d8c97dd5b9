//! End-to-end planar SLAM scenario
//!
//! Two robot poses facing +y observe four landmarks. The graph holds:
//! - an origin prior on x1
//! - a 1 m forward odometry between x1 and x2
//! - eight landmark observations, measured in the robot frame
//!
//! Landmarks are eliminated first (ordering l1..l4, x1, x2).

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use lieopt::{
    BetweenFactor, FactorGraph, Key, LandmarkObservationFactor, LevenbergMarquardt,
    LevenbergMarquardtConfig, LevenbergMarquardtState, LinearSolverType, LmVerbosity, NoiseModel,
    OptimizerState, Ordering, PriorFactor, Rn, SE2, Values, init_logger,
};
use nalgebra::Vector2;
use std::f64::consts::FRAC_PI_2;

const TOLERANCE: f64 = 1e-9;
const MEASUREMENT_SIGMA: f64 = 0.2;

fn x(i: u64) -> Key {
    Key::symbol('x', i)
}

fn l(i: u64) -> Key {
    Key::symbol('l', i)
}

fn landmarks() -> [(Key, [f64; 2]); 4] {
    [
        (l(1), [2.0, 5.0]),
        (l(2), [2.0, 10.0]),
        (l(3), [-2.0, 5.0]),
        (l(4), [-2.0, 10.0]),
    ]
}

fn ground_truth() -> Values {
    let mut values = Values::new();
    values.insert(x(1), SE2::from_xy_angle(0.0, 0.0, FRAC_PI_2)).unwrap();
    values.insert(x(2), SE2::from_xy_angle(0.0, 1.0, FRAC_PI_2)).unwrap();
    for (key, position) in landmarks() {
        values.insert(key, Rn::from_slice(&position)).unwrap();
    }
    values
}

fn odometry_noise() -> NoiseModel {
    NoiseModel::diagonal(&[0.01, 0.01, 1f64.to_radians()]).unwrap()
}

fn measurement_noise() -> NoiseModel {
    NoiseModel::isotropic(2, MEASUREMENT_SIGMA).unwrap()
}

/// Observations in the robot frame: from x1 a landmark at (lx, ly) is seen at
/// (ly, -lx), from x2 at (ly - 1, -lx).
fn urban_graph() -> FactorGraph {
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(
        x(1),
        SE2::from_xy_angle(0.0, 0.0, FRAC_PI_2),
        NoiseModel::diagonal(&[0.01, 0.01, 0.01]).unwrap(),
    ));
    graph.add(BetweenFactor::new(
        x(1),
        x(2),
        SE2::from_xy_angle(1.0, 0.0, 0.0),
        odometry_noise(),
    ));
    for (key, [lx, ly]) in landmarks() {
        graph.add(LandmarkObservationFactor::new(
            x(1),
            key,
            Vector2::new(ly, -lx),
            measurement_noise(),
        ));
        graph.add(LandmarkObservationFactor::new(
            x(2),
            key,
            Vector2::new(ly - 1.0, -lx),
            measurement_noise(),
        ));
    }
    graph
}

fn urban_ordering() -> Ordering {
    Ordering::from_keys([l(1), l(2), l(3), l(4), x(1), x(2)]).unwrap()
}

#[test]
fn test_single_measurement_error() {
    let mut graph = FactorGraph::new();
    graph.add(LandmarkObservationFactor::new(
        x(1),
        l(1),
        Vector2::new(4.0, -2.0),
        measurement_noise(),
    ));
    // residual of one unit against σ = 0.2
    let error = graph.error(&ground_truth()).unwrap();
    assert!((error - 12.5).abs() < TOLERANCE);
}

#[test]
fn test_wrong_odometry_error() {
    let mut graph = FactorGraph::new();
    graph.add(BetweenFactor::new(
        x(1),
        x(2),
        SE2::from_xy_angle(2.0, 0.0, 0.0),
        odometry_noise(),
    ));
    let error = graph.error(&ground_truth()).unwrap();
    assert!((error - 0.5 / (0.01 * 0.01)).abs() < 1e-6);
}

#[test]
fn test_ground_truth_has_zero_error() {
    let graph = urban_graph();
    assert_eq!(graph.len(), 10);
    assert_eq!(graph.dim(), 3 + 3 + 8 * 2);
    assert!(graph.error(&ground_truth()).unwrap() < 1e-20);
}

#[test]
fn test_zero_iterations_reports_initial_error() {
    let graph = urban_graph();
    let truth = ground_truth();
    let expected = graph.error(&truth).unwrap();

    let config = LevenbergMarquardtConfig::new().with_max_iterations(0);
    let result = LevenbergMarquardt::with_config(config)
        .optimize(&graph, &truth, &urban_ordering())
        .unwrap();
    assert_eq!(result.status, OptimizerState::ExceededMaxIterations);
    assert_eq!(result.final_cost, expected);
    assert_eq!(result.init_cost, expected);
}

#[test]
fn test_one_iteration_at_optimum_does_not_drift() {
    let graph = urban_graph();
    let truth = ground_truth();

    let mut state = LevenbergMarquardtState::new(
        &graph,
        truth.clone(),
        &urban_ordering(),
        LevenbergMarquardtConfig::new().with_verbosity(LmVerbosity::TryLambda),
    )
    .unwrap();
    let before = state.error();
    let after = state.iterate().unwrap();

    assert_ne!(after, OptimizerState::Initial);
    assert!((state.error() - before).abs() < TOLERANCE);
    assert!(state.values().equals(&truth, TOLERANCE));
}

fn perturbed_initial() -> Values {
    let mut values = Values::new();
    values.insert(x(1), SE2::from_xy_angle(0.05, -0.03, FRAC_PI_2 + 0.02)).unwrap();
    values.insert(x(2), SE2::from_xy_angle(-0.1, 1.2, FRAC_PI_2 - 0.05)).unwrap();
    for (i, (key, [lx, ly])) in landmarks().into_iter().enumerate() {
        let offset = 0.3 * if i % 2 == 0 { 1.0 } else { -1.0 };
        values.insert(key, Rn::from_slice(&[lx + offset, ly - offset])).unwrap();
    }
    values
}

#[test]
fn test_optimize_from_perturbed_start() {
    init_logger();
    let graph = urban_graph();
    let initial = perturbed_initial();

    let config = LevenbergMarquardtConfig::new().with_verbosity(LmVerbosity::Error);
    let mut optimizer = LevenbergMarquardt::with_config(config);
    let result = optimizer
        .optimize(&graph, &initial, &urban_ordering())
        .unwrap();

    assert_eq!(result.status, OptimizerState::Converged);
    assert!(result.init_cost > 1.0);
    assert!(result.final_cost < 1e-8);
    assert!(result.parameters.equals(&ground_truth(), 1e-4));
    assert!(optimizer.last_summary().is_some());
}

#[test]
fn test_ordering_does_not_change_the_answer() {
    let graph = urban_graph();
    let initial = perturbed_initial();

    let poses_first = Ordering::from_keys([x(2), x(1), l(4), l(3), l(2), l(1)]).unwrap();
    let a = LevenbergMarquardt::new()
        .optimize(&graph, &initial, &urban_ordering())
        .unwrap();
    let b = LevenbergMarquardt::with_config(
        LevenbergMarquardtConfig::new().with_linear_solver_type(LinearSolverType::SparseQR),
    )
    .optimize(&graph, &initial, &poses_first)
    .unwrap();

    assert!(a.parameters.equals(&b.parameters, 1e-4));
    let pose: &SE2 = b.parameters.at(x(2)).unwrap();
    assert!((pose.y() - 1.0).abs() < 1e-4);
}
