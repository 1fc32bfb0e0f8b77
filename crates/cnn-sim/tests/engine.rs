//! End-to-end simulation scenarios.

use cnn_core::{saturate, BoundaryCondition, CouplingMatrix, GrayscaleImage, Template, Tolerances};
use cnn_sim::{CnnSimulation, GridShape};

fn center_tap_b() -> CouplingMatrix {
    let mut taps = vec![0.0; 9];
    taps[4] = 1.0;
    CouplingMatrix::from_row_major(3, &taps).unwrap()
}

fn checkerboard(width: usize, height: usize) -> Vec<f64> {
    (0..height)
        .flat_map(|r| (0..width).map(move |c| if (r + c) % 2 == 0 { 1.0 } else { -1.0 }))
        .collect()
}

/// With zero feedback and a bare center input tap the dynamics reduce to
/// dx/dt = u - x, so the saturated state relaxes onto the input image.
#[test]
fn state_converges_to_checkerboard_input() {
    let shape = GridShape::new(5, 5).unwrap();
    let template = Template::new(
        CouplingMatrix::zeros(3).unwrap(),
        center_tap_b(),
        0.0,
        BoundaryCondition::ZeroFlux,
        0.0,
    )
    .unwrap();

    let input = checkerboard(5, 5);
    let mut sim = CnnSimulation::new(
        shape,
        vec![1.0; shape.dimension()],
        &input,
        template,
        50.0,
        Tolerances::default(),
    )
    .unwrap();

    let t_final = sim.run();
    assert_eq!(t_final, 50.0);
    assert!(sim.is_finished());

    for (i, (&x, &u)) in sim.state().iter().zip(&input).enumerate() {
        assert!(
            (saturate(x) - u).abs() < 1e-2,
            "cell {i}: y(x) = {} vs u = {u}",
            saturate(x)
        );
    }
}

/// The same relaxation driven through the parsed text template and the
/// image-based constructor.
#[test]
fn parsed_template_drives_relaxation() {
    let text = "\
A 0 0 0 0 0 0 0 0 0
B 0 0 0 0 1 0 0 0 0
Z 0
C ZeroFlux
";
    let template: Template = text.parse().unwrap();

    let input = GrayscaleImage::new(4, 4, checkerboard(4, 4)).unwrap();
    let initial = GrayscaleImage::filled(4, 4, 1.0);
    let mut sim =
        CnnSimulation::from_images(&initial, &input, template, 50.0, Tolerances::default())
            .unwrap();

    sim.run();
    let out = sim.extract_output();
    assert_eq!(out.width(), 4);
    assert_eq!(out.height(), 4);
    for (a, b) in out.buf().iter().zip(input.buf()) {
        assert!((a - b).abs() < 1e-2);
    }
}

/// Under Periodic boundaries every cell sees a full wrapped neighborhood,
/// so with a symmetric template a uniform state must stay uniform.
#[test]
fn periodic_uniform_state_stays_uniform() {
    let shape = GridShape::new(3, 3).unwrap();
    let a = CouplingMatrix::from_row_major(
        3,
        &[0.0, 0.1, 0.0, 0.1, 0.4, 0.1, 0.0, 0.1, 0.0],
    )
    .unwrap();
    let template = Template::new(
        a,
        center_tap_b(),
        0.0,
        BoundaryCondition::Periodic,
        0.0,
    )
    .unwrap();

    let mut sim = CnnSimulation::new(
        shape,
        vec![0.5; 9],
        &[0.0; 9],
        template,
        2.0,
        Tolerances::default(),
    )
    .unwrap();
    sim.run();

    // Toroidal symmetry: every cell evolves identically.
    let first = sim.state()[0];
    for &v in sim.state() {
        assert!((v - first).abs() < 1e-9);
    }
}

#[test]
fn run_with_handler_observes_every_step_until_cancelled() {
    let shape = GridShape::new(4, 4).unwrap();
    let template = Template::new(
        CouplingMatrix::zeros(3).unwrap(),
        center_tap_b(),
        0.0,
        BoundaryCondition::ZeroFlux,
        0.0,
    )
    .unwrap();

    let mut sim = CnnSimulation::new(
        shape,
        vec![1.0; 16],
        &checkerboard(4, 4),
        template,
        1000.0,
        Tolerances::default(),
    )
    .unwrap();

    let mut steps = 0;
    let t_cancel = sim.run_with_handler(|_t| {
        steps += 1;
        steps < 10
    });
    assert_eq!(steps, 10);
    assert!(t_cancel > 0.0);
    assert!(t_cancel < 1000.0);
    assert!(!sim.is_finished());
}
