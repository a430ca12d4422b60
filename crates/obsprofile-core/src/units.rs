use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{ProfileError, Result};

/// Families of declared concentration units, each a fixed multiple of mol/mol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    MoleFraction,
    Percent,
    Ppm,
    Ppb,
    Ppt,
}

impl UnitFamily {
    pub const ALL: [UnitFamily; 5] = [
        UnitFamily::MoleFraction,
        UnitFamily::Percent,
        UnitFamily::Ppm,
        UnitFamily::Ppb,
        UnitFamily::Ppt,
    ];

    fn scale(&self) -> f64 {
        match self {
            UnitFamily::MoleFraction => 1.0,
            UnitFamily::Percent => 1e-2,
            UnitFamily::Ppm => 1e-6,
            UnitFamily::Ppb => 1e-9,
            UnitFamily::Ppt => 1e-12,
        }
    }

    pub fn parse(unit: &str) -> Option<Self> {
        ALIASES.get(normalize_key(unit).as_str()).copied()
    }
}

/// Units an output variable may be registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalUnit {
    /// Plain mole fraction, `mol mol-1`.
    MoleFraction,
    /// Mole fraction scaled by 1e-9, written `1e-9`.
    ScaledPpb,
}

impl CanonicalUnit {
    pub const ALL: [CanonicalUnit; 2] = [CanonicalUnit::MoleFraction, CanonicalUnit::ScaledPpb];

    fn scale(&self) -> f64 {
        match self {
            CanonicalUnit::MoleFraction => 1.0,
            CanonicalUnit::ScaledPpb => 1e-9,
        }
    }

    pub fn parse(unit: &str) -> Option<Self> {
        match normalize_key(unit).as_str() {
            "1" | "mol mol-1" | "mole mole-1" | "mol/mol" => Some(CanonicalUnit::MoleFraction),
            "1e-9" | "1e-09" | "1.0e-9" => Some(CanonicalUnit::ScaledPpb),
            _ => None,
        }
    }
}

static ALIASES: Lazy<HashMap<&'static str, UnitFamily>> = Lazy::new(|| {
    use UnitFamily::*;

    let table: [(UnitFamily, &[&str]); 5] = [
        (
            MoleFraction,
            &["1", "mol/mol", "mol mol-1", "mole mole-1", "mol mol^-1", "v/v", "mole fraction"],
        ),
        (Percent, &["%", "percent", "pct"]),
        (
            Ppm,
            &[
                "ppm", "ppmv", "ppm(v)", "ppm-v", "umol/mol", "umol mol-1", "µmol/mol",
                "µmol mol-1", "1e-6",
            ],
        ),
        (
            Ppb,
            &["ppb", "ppbv", "ppb(v)", "ppb-v", "nmol/mol", "nmol mol-1", "1e-9", "1e-09"],
        ),
        (
            Ppt,
            &["ppt", "pptv", "ppt(v)", "ppt-v", "pmol/mol", "pmol mol-1", "1e-12"],
        ),
    ];

    table
        .into_iter()
        .flat_map(|(family, aliases)| aliases.iter().map(move |alias| (*alias, family)))
        .collect()
});

static FACTORS: Lazy<HashMap<(UnitFamily, CanonicalUnit), f64>> = Lazy::new(|| {
    UnitFamily::ALL
        .iter()
        .flat_map(|family| {
            CanonicalUnit::ALL
                .iter()
                .map(move |canonical| ((*family, *canonical), family.scale() / canonical.scale()))
        })
        .collect()
});

fn normalize_key(unit: &str) -> String {
    unit.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Table-driven conversion from declared instrument units to an output
/// variable's canonical unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitNormalizer;

impl UnitNormalizer {
    /// Multiplicative factor taking a value in `declared_unit` to `canonical_unit`.
    pub fn factor_for(&self, declared_unit: &str, canonical_unit: &str) -> Result<f64> {
        let unrecognized = || ProfileError::UnrecognizedUnit {
            declared: declared_unit.to_string(),
            canonical: canonical_unit.to_string(),
        };
        let family = UnitFamily::parse(declared_unit).ok_or_else(unrecognized)?;
        let canonical = CanonicalUnit::parse(canonical_unit).ok_or_else(unrecognized)?;
        FACTORS.get(&(family, canonical)).copied().ok_or_else(unrecognized)
    }

    pub fn inverse_factor_for(&self, declared_unit: &str, canonical_unit: &str) -> Result<f64> {
        self.factor_for(declared_unit, canonical_unit)
            .map(|factor| 1.0 / factor)
    }
}
