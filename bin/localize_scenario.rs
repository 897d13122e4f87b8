//! Simulated drift-correction run.
//!
//! A robot follows a straight planned path while its real pose drifts.
//! Every tick, each landmark is seen by the robot-mounted sensor; the
//! expected position comes from the planned pose and the observed one from
//! the drifted pose. The localizer turns the sightings into a pose offset,
//! printed next to the true drift and the error estimator's view of it.

use std::process::ExitCode;

use clap::Parser;
use landmark_localizer::{
    ErrorEstimator, Localizer, LocalizerConfig, LocalizerResult, ObservationInput,
    OffsetSolverType, PlanarPose, SignalTable, Tick, init_logger_with_level,
};
use nalgebra::{DMatrix, DVector, Vector3};
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "localize_scenario")]
#[command(about = "Correct a drifting planar pose from landmark sightings")]
struct Args {
    /// Number of control ticks to simulate
    #[arg(short, long, default_value = "10")]
    ticks: i64,

    /// Number of landmarks (one observation each)
    #[arg(short, long, default_value = "4")]
    landmarks: usize,

    /// Standard deviation of the measurement noise (meters)
    #[arg(short, long, default_value = "0.0")]
    noise: f64,

    /// Corrected DOFs, any combination of 'x', 'y' and 't' (heading)
    #[arg(short, long, default_value = "xyt")]
    dofs: String,

    /// Damping factor; a positive value selects the damped solver
    #[arg(long, default_value = "0.0")]
    damping: f64,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

/// Planned pose at `tick`: straight line along x, 0.1 m per tick.
fn planned_pose(tick: Tick) -> PlanarPose {
    PlanarPose::new(0.1 * tick as f64, 0.0, 0.0)
}

/// Real pose: slow drift in every direction.
fn actual_pose(tick: Tick) -> PlanarPose {
    let t = tick as f64;
    PlanarPose::new(0.11 * t, 0.005 * t, 0.002 * t)
}

/// Landmarks on a ring around the path, at varying heights.
fn landmark(index: usize) -> Vector3<f64> {
    let angle = index as f64 * 2.4;
    Vector3::new(
        2.0 + 3.0 * angle.cos(),
        3.0 * angle.sin(),
        0.5 + 0.3 * (index % 3) as f64,
    )
}

/// Deterministic Gaussian-like noise (Box-Muller over a hashed index).
fn noise(std_dev: f64, index: usize) -> f64 {
    let u1 = (((index * 12345 + 67890) % 10000) as f64 + 0.5) / 10000.0;
    let u2 = (((index * 54321 + 98765) % 10000) as f64 + 0.5) / 10000.0;
    std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Landmark expressed in the frame of a sensor at `pose`.
fn sensor_frame(pose: &PlanarPose, point: &Vector3<f64>) -> Vector3<f64> {
    let (s, c) = pose.theta.sin_cos();
    let dx = point.x - pose.x;
    let dy = point.y - pose.y;
    Vector3::new(c * dx + s * dy, -s * dx + c * dy, point.z)
}

/// d(sensor-frame point) / d(x, y, heading) at `pose`.
fn feature_jacobian(pose: &PlanarPose, point: &Vector3<f64>) -> DMatrix<f64> {
    let (s, c) = pose.theta.sin_cos();
    let local = sensor_frame(pose, point);
    DMatrix::from_row_slice(
        3,
        3,
        &[
            -c, -s, local.y, //
            s, -c, -local.x, //
            0.0, 0.0, 0.0,
        ],
    )
}

fn mask_signal(dofs: &str) -> DVector<f64> {
    let flag = |c: char| if dofs.contains(c) { 1.0 } else { 0.0 };
    DVector::from_vec(vec![flag('x'), flag('y'), flag('t')])
}

fn run(args: &Args) -> LocalizerResult<()> {
    let solver_type = if args.damping > 0.0 {
        OffsetSolverType::DampedLeastSquares
    } else {
        OffsetSolverType::PseudoInverse
    };
    let config = LocalizerConfig::new()
        .with_solver_type(solver_type)
        .with_damping(args.damping);

    let mut graph = SignalTable::new();
    let mut localizer = Localizer::with_config("localizer", config)?;
    for i in 0..args.landmarks {
        localizer.add_observation(&format!("landmark{i}"), &mut graph)?;
    }

    let mut estimator = ErrorEstimator::new("estimator");
    estimator.set_reference_trajectory("planner::waypoint");

    info!(
        "Simulating {} ticks with {} landmarks, noise {:.3}, dofs '{}'",
        args.ticks, args.landmarks, args.noise, args.dofs
    );

    let mask = mask_signal(&args.dofs);
    let mut sample_index = 0;
    for tick in 0..args.ticks {
        let planned = planned_pose(tick);
        let actual = actual_pose(tick);

        for (i, observation) in localizer.observations().iter().enumerate() {
            let point = landmark(i);
            let reference = sensor_frame(&planned, &point);
            let mut observed = sensor_frame(&actual, &point);
            for value in observed.iter_mut() {
                *value += noise(args.noise, sample_index);
                sample_index += 1;
            }

            let id = |input| observation.signal(input).clone();
            graph.set(
                id(ObservationInput::SensorJacobian),
                tick,
                DMatrix::<f64>::identity(3, 3),
            );
            graph.set(
                id(ObservationInput::ReferencePosition),
                tick,
                DVector::from_column_slice(reference.as_slice()),
            );
            graph.set(
                id(ObservationInput::FeatureJacobian),
                tick,
                feature_jacobian(&planned, &point),
            );
            graph.set(
                id(ObservationInput::ObservedPosition),
                tick,
                DVector::from_column_slice(observed.as_slice()),
            );
            graph.set_vector(id(ObservationInput::Weight), tick, &[1.0, 1.0, 0.0]);
            graph.set(id(ObservationInput::CorrectedDofs), tick, mask.clone());
        }

        graph.set(
            estimator.position_id().clone(),
            tick,
            DVector::from_column_slice(actual.to_vector().as_slice()),
        );
        graph.set(
            "planner::waypoint",
            tick,
            DMatrix::from_iterator(4, 4, planned.to_homogeneous().iter().copied()),
        );

        let offset = localizer.configuration_offset(&graph, tick)?;
        let drift = estimator.error(&graph, tick)?;
        info!(
            "tick {:>3} | drift {} | offset {:?}",
            tick,
            drift,
            offset.as_slice()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger_with_level(if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Localization failed: {e}");
            ExitCode::FAILURE
        }
    }
}
