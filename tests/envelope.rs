use nalgebra::{vector, DVector, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use thruster_envelope::{
    allocation::AllocationModel,
    envelope::EnvelopeSettings,
    geometry::ThrusterGeometry,
    penalty::{effort, ConstraintSettings},
    sampling::{icosahedron_vertices, EnvelopeKind},
    settings::Settings,
    Error, FloatType, Wrench,
};

const TOLERANCE: FloatType = 1e-6;

fn tetrahedral_model() -> AllocationModel {
    AllocationModel::new(ThrusterGeometry::tetrahedral(1.0)).unwrap()
}

fn assert_relative_eq(a: FloatType, b: FloatType, tolerance: FloatType) {
    let scale = a.abs().max(b.abs()).max(1.0);
    assert!((a - b).abs() <= tolerance * scale, "{a} != {b}");
}

#[test]
fn particular_solution_reproduces_any_wrench() {
    let model = tetrahedral_model();
    let targets = [
        Wrench::new(vector![1.0, 0.0, 0.0], vector![0.0, 0.0, 0.0]),
        Wrench::new(vector![0.0, 0.0, 0.0], vector![0.0, -2.0, 0.0]),
        Wrench::new(vector![0.3, -0.7, 1.1], vector![-0.4, 0.9, 0.2]),
    ];

    for target in targets {
        let forces = model.particular_solution(&target).unwrap();
        let realized = model.realized_wrench(&forces);

        assert!((realized.to_vector() - target.to_vector()).norm() < 1e-9);
    }
}

#[test]
fn allocation_realizes_target_even_when_infeasible() {
    let model = tetrahedral_model();
    let allocator = Settings::default().allocator(&model);
    let target = Wrench::new(vector![3.0, 2.0, 0.0], vector![0.0, 0.0, 4.0]);

    let allocation = allocator.allocate(&target).unwrap();

    assert!(!allocation.feasible);
    let realized = model.realized_wrench(&allocation.forces);
    assert!((realized.to_vector() - target.to_vector()).norm() < 1e-8);
}

#[test]
fn allocation_is_deterministic() {
    let model = tetrahedral_model();
    let allocator = Settings::default().allocator(&model);
    let target = Wrench::new(vector![0.2, 0.0, -0.1], vector![0.0, 0.3, 0.0]);

    let first = allocator.allocate(&target).unwrap();
    let second = allocator.allocate(&target).unwrap();

    assert_eq!(first.feasible, second.feasible);
    assert_eq!(first.forces, second.forces);
}

#[test]
fn feasibility_is_monotone_in_scale() {
    let model = tetrahedral_model();
    let allocator = Settings::default().allocator(&model);
    let direction = Wrench::pure_torque(vector![1.0, 0.0, 0.0]);

    assert!(allocator.allocate(&direction).unwrap().feasible);
    for scale in [0.5, 0.25, 0.125] {
        let allocation = allocator.allocate(&(direction * scale)).unwrap();
        assert!(allocation.feasible, "infeasible at scale {scale}");
    }
}

#[test]
fn single_aligned_thruster_has_unit_radius() {
    let geometry =
        ThrusterGeometry::from_parts(&[vector![0.0, 0.0, 0.0]], &[vector![0.0, 0.0, 1.0]])
            .unwrap();
    let model = AllocationModel::new(geometry).unwrap();
    let search = Settings::default().envelope_search(&model);

    let radius = search
        .max_radius(&Wrench::pure_force(vector![0.0, 0.0, 1.0]))
        .unwrap();

    assert_relative_eq(radius, 1.0, 1e-9);
}

#[test]
fn tetrahedral_torque_envelope_is_feasible() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let model = tetrahedral_model();
    let search = Settings::default().envelope_search(&model);
    let constraints = ConstraintSettings::default();
    let direction = Wrench::pure_torque(vector![0.0, 0.0, 1.0]);

    let sample = search.search(&direction).unwrap();

    assert!(sample.radius.is_finite() && sample.radius > 0.0);

    // Allocating again at the scale the search settled on stays within every limit
    let allocation = search
        .allocator()
        .allocate(&(direction * sample.scale))
        .unwrap();
    assert!(allocation.feasible);
    for state in search.allocator().report(&allocation) {
        assert!(state.magnitude <= constraints.max_force + TOLERANCE);
        if let Some(cosine) = state.cosine {
            assert!(cosine >= constraints.cos_gamma - TOLERANCE);
        }
    }
}

#[test]
fn symmetric_torque_directions_agree() {
    let model = tetrahedral_model();
    let search = Settings::default().envelope_search(&model);

    // A 120° turn about (1, 1, 1) maps the tetrahedron onto itself and x -> y -> z
    let radii: Vec<_> = [
        vector![1.0, 0.0, 0.0],
        vector![0.0, 1.0, 0.0],
        vector![0.0, 0.0, 1.0],
    ]
    .into_iter()
    .map(|axis| search.max_radius(&Wrench::pure_torque(axis)).unwrap())
    .collect();

    assert_relative_eq(radii[0], radii[1], 1e-3);
    assert_relative_eq(radii[1], radii[2], 1e-3);
}

#[test]
fn binding_cap_forces_halvings() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let model = tetrahedral_model();
    let settings = Settings {
        constraints: ConstraintSettings {
            max_force: 0.1,
            ..Default::default()
        },
        ..Default::default()
    };
    let search = settings.envelope_search(&model);

    let sample = search
        .search(&Wrench::pure_torque(vector![1.0, 0.0, 0.0]))
        .unwrap();

    // Four unit arms capped at 0.1 can not produce more than 0.4 of torque
    assert!(sample.halvings >= 2, "{sample:?}");
    assert!(sample.scale <= 0.4);
    assert!(sample.peak_force <= 0.1 + TOLERANCE);
    assert!(sample.allocation.feasible);
}

#[test]
fn degenerate_geometry_is_reported() {
    // Both thrusters at the origin can not produce torque
    let geometry = ThrusterGeometry::from_parts(
        &[vector![0.0, 0.0, 0.0], vector![0.0, 0.0, 0.0]],
        &[vector![1.0, 0.0, 0.0], vector![-1.0, 0.0, 0.0]],
    )
    .unwrap();
    let model = AllocationModel::new(geometry).unwrap();
    let search = Settings::default().envelope_search(&model);

    assert!(!model.is_full_rank());
    assert!(matches!(
        search.max_radius(&Wrench::pure_torque(vector![0.0, 0.0, 1.0])),
        Err(Error::DegenerateGeometry { rank: 3, .. })
    ));
}

#[test]
fn infeasible_direction_terminates() {
    // Both thrusters push +x, nothing can push -x
    let geometry = ThrusterGeometry::from_parts(
        &[vector![0.0, 1.0, 0.0], vector![0.0, -1.0, 0.0]],
        &[vector![1.0, 0.0, 0.0], vector![1.0, 0.0, 0.0]],
    )
    .unwrap();
    let model = AllocationModel::new(geometry).unwrap();
    let settings = Settings {
        envelope: EnvelopeSettings {
            max_halvings: 6,
            ..Default::default()
        },
        ..Default::default()
    };
    let search = settings.envelope_search(&model);

    assert!(matches!(
        search.max_radius(&Wrench::pure_force(vector![-1.0, 0.0, 0.0])),
        Err(Error::NoFeasibleScale { halvings: 6 })
    ));
}

#[test]
fn sweep_matches_individual_searches() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let model = tetrahedral_model();
    let search = Settings::default().envelope_search(&model);
    let directions = EnvelopeKind::Torque.wrenches(&icosahedron_vertices()[..4]);

    let swept = search.sweep(&directions);

    assert_eq!(swept.len(), directions.len());
    for (direction, result) in directions.iter().zip(swept) {
        let sample = result.unwrap();
        let radius = search.max_radius(direction).unwrap();

        assert_eq!(sample.radius, radius);
        assert!((sample.direction.norm() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn null_space_offsets_keep_wrench() {
    let model = tetrahedral_model();
    let target = Wrench::new(vector![0.1, 0.2, 0.3], vector![0.0, -0.5, 0.25]);
    let particular = model.particular_solution(&target).unwrap();

    for seed in 0..5 {
        let free = DVector::from_fn(model.free_dimension(), |idx, _| {
            ((idx * 7 + seed * 13) as FloatType).cos() * 5.0
        });
        let forces = model.forces_free(&particular, &free);

        assert!((model.realized_wrench(&forces).to_vector() - target.to_vector()).norm() < 1e-8);
    }
}

/// Forces inside every cap and cone, with about half of the thrusters idle
fn feasible_forces(geometry: &ThrusterGeometry, rng: &mut StdRng) -> DVector<FloatType> {
    let mut forces = DVector::zeros(geometry.force_dimension());

    for (idx, thruster) in geometry.thrusters().iter().enumerate() {
        if rng.gen_bool(0.5) {
            continue;
        }

        let jitter = Vector3::<FloatType>::from_fn(|_, _| rng.sample(StandardNormal));
        let mut direction = (thruster.normal + jitter * 0.5).normalize();
        if direction.dot(&thruster.normal) < 0.2 {
            direction = thruster.normal;
        }

        forces
            .fixed_rows_mut::<3>(3 * idx)
            .copy_from(&(direction * rng.gen_range(0.0..0.5)));
    }

    forces
}

#[test]
fn allocation_is_no_worse_than_a_known_feasible_assignment() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let mut rng = StdRng::seed_from_u64(11);
    let settings = Settings::default();

    for count in [5, 6, 7, 8] {
        let geometry = ThrusterGeometry::random(count, &mut rng).unwrap();
        let model = AllocationModel::new(geometry.clone()).unwrap();
        let allocator = settings.allocator(&model);

        for _ in 0..4 {
            let known = feasible_forces(&geometry, &mut rng);
            let target = geometry.net_wrench(&known);

            let allocation = allocator.allocate(&target).unwrap();

            assert!(allocation.feasible, "{count} thrusters: {allocation:?}");
            assert!(
                allocation.effort <= effort(&known) * (1.0 + 1e-3) + 1e-9,
                "{count} thrusters: {} > {}",
                allocation.effort,
                effort(&known)
            );
        }
    }
}
