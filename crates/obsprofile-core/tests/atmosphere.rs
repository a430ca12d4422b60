use obsprofile_core::atmosphere::{pressure_of, temperature_of};
use obsprofile_core::{PressureGrid, ProfileError};

#[test]
fn pressure_decreases_strictly_with_altitude() {
    let mut previous = pressure_of(0.0).expect("sea level is in range");
    for step in 1..=128 {
        let altitude = step as f64 * 250.0;
        let pressure = pressure_of(altitude).expect("altitude within supported range");
        assert!(
            pressure < previous,
            "pressure at {altitude} m ({pressure}) should be below {previous}"
        );
        previous = pressure;
    }
}

#[test]
fn out_of_range_altitudes_have_no_pressure() {
    assert_eq!(pressure_of(-1.0), None);
    assert_eq!(pressure_of(32_000.5), None);
    assert_eq!(pressure_of(f64::NAN), None);
    assert_eq!(temperature_of(f64::INFINITY), None);
}

#[test]
fn tropopause_is_isothermal() {
    let lower = temperature_of(12_000.0).unwrap();
    let upper = temperature_of(19_000.0).unwrap();
    assert!((lower - 216.65).abs() < 1e-9);
    assert!((upper - 216.65).abs() < 1e-9);
}

#[test]
fn grid_levels_are_contiguous_and_decreasing() {
    let grid = PressureGrid::from_altitude_bins(0.0, 500.0, 8).unwrap();
    assert_eq!(grid.len(), 8);
    assert_eq!(PressureGrid::COORDINATE_ORDER, "decreasing");

    for pair in grid.levels().windows(2) {
        assert_eq!(pair[0].lower_bound_pa, pair[1].upper_bound_pa);
        assert!(pair[0].center_pa > pair[1].center_pa);
    }
    for level in grid.levels() {
        assert!(level.lower_bound_pa < level.center_pa);
        assert!(level.center_pa < level.upper_bound_pa);
    }
    assert_eq!(grid.levels()[0].upper_bound_pa, 101_325.0);
}

#[test]
fn boundary_pressure_belongs_to_exactly_one_level() {
    let grid = PressureGrid::from_altitude_bins(0.0, 500.0, 4).unwrap();
    let boundary = pressure_of(500.0).unwrap();

    let containing: Vec<usize> = grid
        .levels()
        .iter()
        .enumerate()
        .filter(|(_, level)| level.contains(boundary))
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(containing, vec![1]);
    assert_eq!(grid.locate_pressure(boundary), Some(1));
    assert_eq!(grid.locate_altitude(500.0), Some(1));
}

#[test]
fn pressures_outside_the_grid_are_not_located() {
    let grid = PressureGrid::from_altitude_bins(1_000.0, 500.0, 2).unwrap();
    assert_eq!(grid.locate_pressure(pressure_of(500.0).unwrap()), None);
    assert_eq!(grid.locate_pressure(pressure_of(2_500.0).unwrap()), None);
    assert_eq!(grid.locate_altitude(999.0), None);
    assert_eq!(grid.locate_altitude(2_000.0), None);
}

#[test]
fn invalid_grids_are_rejected() {
    for (start, width, count) in [
        (0.0, 0.0, 4),
        (0.0, -500.0, 4),
        (0.0, 500.0, 0),
        (-100.0, 500.0, 4),
        (0.0, 1_000.0, 33),
    ] {
        let result = PressureGrid::from_altitude_bins(start, width, count);
        assert!(
            matches!(result, Err(ProfileError::Config(_))),
            "grid ({start}, {width}, {count}) should be rejected"
        );
    }
}
