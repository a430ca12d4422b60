use obsprofile_core::units::UnitFamily;
use obsprofile_core::{ProfileError, UnitNormalizer};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

#[test]
fn declared_aliases_resolve_to_families() {
    for alias in ["ppbv", "PPB", "ppb(v)", " nmol   mol-1 "] {
        assert_eq!(UnitFamily::parse(alias), Some(UnitFamily::Ppb), "{alias}");
    }
    assert_eq!(UnitFamily::parse("ppmv"), Some(UnitFamily::Ppm));
    assert_eq!(UnitFamily::parse("pptv"), Some(UnitFamily::Ppt));
    assert_eq!(UnitFamily::parse("furlongs"), None);
}

#[test]
fn factors_match_family_scales() {
    let normalizer = UnitNormalizer;
    assert!(close(normalizer.factor_for("ppbv", "1e-9").unwrap(), 1.0));
    assert!(close(normalizer.factor_for("ppbv", "mole mole-1").unwrap(), 1e-9));
    assert!(close(normalizer.factor_for("ppmv", "1e-9").unwrap(), 1e3));
    assert!(close(normalizer.factor_for("pptv", "mol/mol").unwrap(), 1e-12));
    assert!(close(normalizer.factor_for("%", "1").unwrap(), 1e-2));
}

#[test]
fn inverse_factor_round_trips_a_value() {
    let normalizer = UnitNormalizer;
    let forward = normalizer.factor_for("ppmv", "mol mol-1").unwrap();
    let inverse = normalizer.inverse_factor_for("ppmv", "mol mol-1").unwrap();
    let value = 412.7;
    assert!(close(value * forward * inverse, value));
}

#[test]
fn unknown_units_are_skippable() {
    let normalizer = UnitNormalizer;

    let err = normalizer.factor_for("furlongs", "1e-9").unwrap_err();
    match &err {
        ProfileError::UnrecognizedUnit { declared, canonical } => {
            assert_eq!(declared, "furlongs");
            assert_eq!(canonical, "1e-9");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_skippable());

    let err = normalizer.factor_for("ppbv", "kg m-3").unwrap_err();
    assert!(matches!(err, ProfileError::UnrecognizedUnit { .. }));
}
