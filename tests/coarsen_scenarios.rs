use mesh_coarsen::coarsen::{
    Coarsen, CoarsenOptions, CycleView, RefineRequest, SpatialResolution, UniformResolution,
    find_allowed_target_triangles, find_parallel_deletion_set, flag_vertex_remove, footprint,
};
use mesh_coarsen::debug_invariants::DebugInvariants;
use mesh_coarsen::geometry::ExactPredicates;
use mesh_coarsen::geometry::metrics::{centroid, conserved_total, mesh_area, signed_area};
use mesh_coarsen::mesh_error::MeshError;
use mesh_coarsen::mesh_generation::{MeshGenerationOptions, structured_mesh};
use mesh_coarsen::param::DomainBounds;
use mesh_coarsen::parallel::ExecutionMode;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use mesh_coarsen::topology::{Connectivity, encroached_segments, validate_orientation};

fn unit_square() -> DomainBounds {
    DomainBounds::new(0.0, 1.0, 0.0, 1.0).unwrap()
}

fn grid(n: usize, jitter: f64, seed: u64) -> Connectivity {
    structured_mesh(
        n,
        n,
        unit_square(),
        MeshGenerationOptions {
            jitter,
            rng_seed: seed,
        },
    )
    .unwrap()
}

fn linear_state(mesh: &Connectivity) -> Vec<f64> {
    mesh.vertex_coordinates
        .iter()
        .map(|p| 1.0 + p[0] + 2.0 * p[1])
        .collect()
}

fn n_on_hull(mesh: &Connectivity) -> usize {
    let bounds = unit_square();
    mesh.vertex_coordinates
        .iter()
        .filter(|p| bounds.on_boundary(**p))
        .count()
}

fn assert_valid(mesh: &Connectivity) {
    mesh.validate_invariants().unwrap();
    validate_orientation(mesh, &ExactPredicates).unwrap();
    assert!(encroached_segments(mesh, &ExactPredicates).is_empty());
    assert!((mesh_area(mesh) - 1.0).abs() < 1e-12);
}

#[test]
fn uniform_coarsening_keeps_hull_and_conserves() {
    let mut mesh = grid(12, 0.1, 7);
    let mut state = linear_state(&mesh);
    let before = conserved_total(&mesh, &state).unwrap();
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];

    let mut engine = Coarsen::new(CoarsenOptions::default());
    let report = engine
        .coarsen(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            5,
        )
        .unwrap();

    assert!(report.cycles[0].removed > 0);
    assert_eq!(report.removed(), 144 - mesh.n_vertex());
    assert_eq!(state.len(), mesh.n_vertex());
    assert_eq!(n_on_hull(&mesh), 44);
    assert_eq!(mesh.segments.len(), 44);
    assert_valid(&mesh);

    let after = conserved_total(&mesh, &state).unwrap();
    assert!((before - after).abs() < 1e-10 * before.abs());
}

#[test]
fn every_cycle_but_the_last_makes_progress() {
    let mut mesh = grid(10, 0.05, 3);
    let mut state = vec![[1.0, -2.0, 0.5]; mesh.n_vertex()];
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let mut engine = Coarsen::new(CoarsenOptions::default());
    let report = engine
        .coarsen(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            50,
        )
        .unwrap();

    let (last, rest) = report.cycles.split_last().unwrap();
    assert!(rest.iter().all(|c| c.removed > 0));
    assert!(report.cycles.len() < 50 || last.removed > 0);
    for c in &report.cycles {
        assert!(c.removed + c.commit_rejected <= c.independent);
        assert!(c.independent <= c.with_target - c.too_large);
        assert!(c.with_target <= c.flagged);
    }
    for s in &state {
        assert!((s[0] - 1.0).abs() < 1e-12);
        assert!((s[1] + 2.0).abs() < 1e-12);
        assert!((s[2] - 0.5).abs() < 1e-12);
    }
    assert_valid(&mesh);
}

#[test]
fn keep_requests_remove_nothing() {
    let mut mesh = grid(8, 0.1, 1);
    let snapshot = mesh.clone();
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Keep; mesh.n_triangle()];
    let mut engine = Coarsen::new(CoarsenOptions::default());
    let report = engine
        .coarsen(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            4,
        )
        .unwrap();
    assert_eq!(report.removed(), 0);
    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].flagged, 0);
    assert_eq!(mesh, snapshot);
}

#[test]
fn vertices_of_kept_triangles_survive() {
    let mut mesh = grid(12, 0.1, 11);
    let requests: Vec<RefineRequest> = (0..mesh.n_triangle())
        .map(|t| {
            let [a, b, c] = mesh.triangle_coordinates(t);
            RefineRequest::from(centroid(a, b, c)[0] > 0.5)
        })
        .collect();
    let kept: Vec<[f64; 2]> = (0..mesh.n_triangle())
        .filter(|&t| requests[t] == RefineRequest::Keep)
        .flat_map(|t| mesh.triangle_coordinates(t))
        .collect();
    let mut state = linear_state(&mesh);

    let mut engine = Coarsen::new(CoarsenOptions::default());
    let removed = engine
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            10,
        )
        .unwrap();

    assert!(removed > 0);
    for p in kept {
        assert!(mesh.vertex_coordinates.contains(&p), "kept vertex {p:?} removed");
    }
    assert_valid(&mesh);
}

#[test]
fn resolution_bound_limits_coarsening() {
    // Flips may merge area across a quad, so only check the collapses.
    let mut mesh = grid(10, 0.0, 0);
    let cell = 1.0 / 81.0;
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let options = CoarsenOptions {
        restore_delaunay: false,
        ..CoarsenOptions::default()
    };
    let removed = Coarsen::new(options)
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests,
            &SpatialResolution(|_: [f64; 2]| 2.0 * cell),
            10,
        )
        .unwrap();

    assert!(removed > 0);
    // 36 hull vertices and triangles no larger than 2 / 81 need interior
    // vertices.
    assert!(mesh.n_vertex() > 36);
    for t in 0..mesh.n_triangle() {
        let [a, b, c] = mesh.triangle_coordinates(t);
        assert!(signed_area(a, b, c) <= 2.0 * cell + 1e-15);
    }
}

#[test]
fn a_zero_bound_removes_nothing() {
    let mut mesh = grid(6, 0.0, 0);
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let report = Coarsen::new(CoarsenOptions::default())
        .coarsen(&mut mesh, &mut state, &requests, &UniformResolution(0.0), 3)
        .unwrap();
    assert_eq!(report.removed(), 0);
    assert_eq!(report.cycles[0].too_large, report.cycles[0].with_target);
}

#[test]
fn boundary_removal_merges_collinear_hull_vertices() {
    let mut mesh = grid(6, 0.0, 0);
    let mut state = linear_state(&mesh);
    let before = conserved_total(&mesh, &state).unwrap();
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let options = CoarsenOptions {
        allow_boundary_removal: true,
        domain: Some(unit_square()),
        ..CoarsenOptions::default()
    };
    Coarsen::new(options)
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            10,
        )
        .unwrap();

    let hull = n_on_hull(&mesh);
    assert!(hull < 20);
    for corner in [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]] {
        assert!(mesh.vertex_coordinates.contains(&corner));
    }
    assert_eq!(mesh.segments.len(), hull);
    let x = &mesh.vertex_coordinates;
    let perimeter: f64 = mesh
        .segments
        .iter()
        .map(|s| ((x[s[0]][0] - x[s[1]][0]).abs() + (x[s[0]][1] - x[s[1]][1]).abs()))
        .sum();
    assert!((perimeter - 4.0).abs() < 1e-12);
    assert_valid(&mesh);

    let after = conserved_total(&mesh, &state).unwrap();
    assert!((before - after).abs() < 1e-10 * before.abs());
}

#[cfg(feature = "rayon")]
#[test]
fn serial_and_parallel_runs_agree() {
    let run = |execution: ExecutionMode| {
        let mut mesh = grid(12, 0.12, 5);
        let mut state = linear_state(&mesh);
        let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
        let options = CoarsenOptions {
            execution,
            rng_seed: 99,
            ..CoarsenOptions::default()
        };
        Coarsen::new(options)
            .remove_vertices(
                &mut mesh,
                &mut state,
                &requests,
                &UniformResolution(f64::INFINITY),
                3,
            )
            .unwrap();
        (mesh, state)
    };
    let (serial_mesh, serial_state) = run(ExecutionMode::Serial);
    let (parallel_mesh, parallel_state) = run(ExecutionMode::Parallel);
    assert_eq!(serial_mesh, parallel_mesh);
    assert_eq!(serial_state, parallel_state);
}

#[test]
fn without_delaunay_restoration_no_flips_are_reported() {
    let mut mesh = grid(8, 0.1, 2);
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let options = CoarsenOptions {
        restore_delaunay: false,
        ..CoarsenOptions::default()
    };
    let report = Coarsen::new(options)
        .coarsen(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            3,
        )
        .unwrap();
    assert!(report.removed() > 0);
    assert!(report.cycles.iter().all(|c| c.flips == 0));
    assert_valid(&mesh);
}

#[test]
fn zero_cycles_is_a_no_op() {
    let mut mesh = grid(5, 0.0, 0);
    let snapshot = mesh.clone();
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let removed = Coarsen::new(CoarsenOptions::default())
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            0,
        )
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(mesh, snapshot);
}

#[test]
fn length_mismatches_are_errors() {
    let mut mesh = grid(4, 0.0, 0);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let mut engine = Coarsen::new(CoarsenOptions::default());

    let mut short_state = vec![0.0; mesh.n_vertex() - 1];
    let err = engine
        .remove_vertices(
            &mut mesh,
            &mut short_state,
            &requests,
            &UniformResolution(1.0),
            1,
        )
        .unwrap_err();
    assert_eq!(
        err,
        MeshError::StateLengthMismatch {
            expected: 16,
            found: 15
        }
    );

    let mut state = vec![0.0; mesh.n_vertex()];
    let err = engine
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests[1..],
            &UniformResolution(1.0),
            1,
        )
        .unwrap_err();
    assert!(matches!(err, MeshError::RequestLengthMismatch { .. }));
}

#[test]
fn corrupted_adjacency_is_detected_before_commit() {
    let mut mesh = grid(5, 0.0, 0);
    mesh.triangle_neighbors[3] = [None, None, None];
    let snapshot = mesh.clone();
    let mut state = linear_state(&mesh);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let err = Coarsen::new(CoarsenOptions::default())
        .remove_vertices(
            &mut mesh,
            &mut state,
            &requests,
            &UniformResolution(f64::INFINITY),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, MeshError::AsymmetricAdjacency { .. }));
    assert_eq!(mesh, snapshot);
}

/// Vertex 0 can only collapse onto vertex 3, which lies inside the diametral
/// circle of segment (1, 2).
fn encroaching_fan(with_segment: bool) -> Connectivity {
    let segments = if with_segment { vec![[1, 2]] } else { vec![] };
    Connectivity::new(
        vec![
            [1.0, 1.2],
            [0.0, 0.0],
            [2.0, 0.0],
            [1.6, 0.6],
            [1.0, 3.0],
            [0.4, 0.6],
        ],
        vec![[1, 2, 0], [2, 3, 0], [3, 4, 0], [4, 5, 0], [5, 1, 0]],
        segments,
    )
    .unwrap()
}

#[test]
fn vertex_whose_removal_encroaches_a_segment_stays() {
    for (with_segment, expected) in [(true, 0), (false, 1)] {
        let mut mesh = encroaching_fan(with_segment);
        let mut state = vec![1.0; mesh.n_vertex()];
        let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
        let report = Coarsen::new(CoarsenOptions::default())
            .coarsen(
                &mut mesh,
                &mut state,
                &requests,
                &UniformResolution(f64::INFINITY),
                5,
            )
            .unwrap();
        assert_eq!(report.removed(), expected);
        assert_eq!(report.cycles[0].flagged, 1);
        assert_eq!(report.cycles[0].encroached, 1 - expected);
        assert_eq!(
            mesh.vertex_coordinates.contains(&[1.0, 1.2]),
            with_segment
        );
        assert!(encroached_segments(&mesh, &ExactPredicates).is_empty());
    }
}

#[test]
fn deletion_set_footprints_are_disjoint_on_a_real_mesh() {
    let mesh = grid(12, 0.12, 21);
    let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
    let options = CoarsenOptions::default();
    let view = CycleView::new(&mesh, &ExactPredicates, &options);
    let flags = flag_vertex_remove(&view, &requests).unwrap();
    let targets = find_allowed_target_triangles(&view, &flags).unwrap();

    let candidates: Vec<usize> = (0..targets.len()).filter(|&v| targets[v].is_some()).collect();
    assert!(candidates.len() > 50);
    let footprints: Vec<Vec<usize>> = candidates
        .iter()
        .map(|&v| {
            let target = targets[v].unwrap();
            let star = mesh.star(v, target.triangle, mesh.n_triangle()).unwrap();
            let fp = footprint(&mesh, &star);
            for &t in &star.triangles {
                assert!(fp.contains(&t));
                for n in mesh.triangle_neighbors[t].iter().flatten() {
                    assert!(fp.contains(n));
                }
            }
            fp
        })
        .collect();

    for seed in 0..8 {
        let mut rng = SmallRng::seed_from_u64(seed);
        for mode in [ExecutionMode::Serial, ExecutionMode::Parallel] {
            let set = find_parallel_deletion_set(mode, mesh.n_triangle(), &footprints, &mut rng, 8);
            assert!(!set.accepted.is_empty());
            for (i, &a) in set.accepted.iter().enumerate() {
                for &b in &set.accepted[i + 1..] {
                    assert!(
                        footprints[a].iter().all(|t| !footprints[b].contains(t)),
                        "vertices {} and {} share a footprint triangle",
                        candidates[a],
                        candidates[b]
                    );
                }
            }
        }
    }
}

#[test]
fn first_cycle_on_a_grid_commits_every_accepted_vertex() {
    for seed in [1, 4, 9] {
        let mut mesh = grid(12, 0.12, seed);
        let mut state = linear_state(&mesh);
        let requests = vec![RefineRequest::Coarsen; mesh.n_triangle()];
        let options = CoarsenOptions {
            rng_seed: seed,
            ..CoarsenOptions::default()
        };
        let report = Coarsen::new(options)
            .coarsen(
                &mut mesh,
                &mut state,
                &requests,
                &UniformResolution(f64::INFINITY),
                1,
            )
            .unwrap();
        let first = &report.cycles[0];
        assert!(first.removed > 0);
        assert_eq!(first.commit_rejected, 0);
        assert_eq!(first.removed, first.independent - first.encroached);
    }
}
