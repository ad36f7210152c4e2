//! Unit-aware quantities used throughout the dose evaluation workspace.
//!
//! Quantities are `uom` SI quantities with `f64` storage. Dose grids
//! themselves hold plain `f64`s (see [`todo`]) for speed; the quantities
//! appear at the edges: configuration, user-facing parameters, reports.

#[macro_use]
pub extern crate uom;

pub mod todo;

pub use uom::si::Quantity;
pub use uom::si::f64::{AvailableEnergy, Length, Ratio, Volume};

/// Absorbed dose shares its dimension (J/kg) with `uom`'s available energy
pub type AbsorbedDose = AvailableEnergy;

/// Gray and centigray, which `uom` does not ship
pub mod absorbed_dose {
  unit! {
    system: uom::si;
    quantity: uom::si::available_energy;

    @gray: 1.0; "Gy", "gray", "grays";
    @centigray: 1.0E-2; "cGy", "centigray", "centigrays";
  }
}

mod units {
  pub use uom::si::{length       ::{millimeter, centimeter},
                    volume       ::{cubic_millimeter, cubic_centimeter},
                    ratio        ::{ratio, percent},
  };
  pub use super::absorbed_dose::{gray, centigray};
}

// Making values from float literals is very long-winded, so provide some
// pithily-named convenience constructors.

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f64) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(mm      Length                 millimeter);
wrap!(cm      Length                 centimeter);
wrap!(gray    AbsorbedDose                 gray);
wrap!(cgy     AbsorbedDose            centigray);
wrap!(mm3     Volume           cubic_millimeter);
wrap!(cm3     Volume           cubic_centimeter);
wrap!(ratio   Ratio                       ratio);
wrap!(percent Ratio                     percent);

// Reverse direction of the above.
pub fn mm_   (x: Length      ) -> f64 { x.get::<units::millimeter>      () }
pub fn gray_ (x: AbsorbedDose) -> f64 { x.get::<units::gray>            () }
pub fn mm3_  (x: Volume      ) -> f64 { x.get::<units::cubic_millimeter>() }
pub fn cm3_  (x: Volume      ) -> f64 { x.get::<units::cubic_centimeter>() }
pub fn ratio_(x: Ratio       ) -> f64 { x.get::<units::ratio>           () }

/// Parse a dose such as `"2 Gy"` or `"180 cGy"`.
///
/// Units added with `unit!` are invisible to `uom`'s `FromStr`, so gray and
/// centigray are recognized here; anything else (e.g. `"2 J/kg"`) is handed
/// on to `uom`.
pub fn parse_dose(s: &str) -> Result<AbsorbedDose, String> {
  let s = s.trim();
  let (value, unit) = s.split_once(' ')
    .ok_or_else(|| format!("dose `{s}` has no unit"))?;
  let x = || value.parse::<f64>().map_err(|e| format!("dose `{s}`: {e}"));
  match unit.trim() {
    "Gy"  | "gray"      | "grays"      => Ok(gray(x()?)),
    "cGy" | "centigray" | "centigrays" => Ok(cgy (x()?)),
    _ => s.parse::<AbsorbedDose>().map_err(|e| format!("dose `{s}`: {e}")),
  }
}

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use uom::si::length::millimeter;
  use uom::si::volume::cubic_millimeter;
  use uom::si::available_energy::joule_per_kilogram;
  use absorbed_dose::gray as Gy;

  #[test]
  fn lengths_sum_across_units() {
    let v = vec![mm(1.0), cm(1.0)];
    let total: Length = v.into_iter().sum();
    assert_uom_eq!(millimeter, total, mm(11.0), ulps <= 1);
  }

  #[test]
  fn cubic_centimetre_is_a_thousand_cubic_millimetres() {
    assert_uom_eq!(cubic_millimeter, cm3(1.0), mm3(1000.0), r2nd <= 1e-12);
    assert_eq!(cm3_(mm3(2500.0)), 2.5);
  }

  #[test]
  fn dose_roundtrip_through_centigray() {
    assert!((gray_(cgy(250.0)) - 2.5).abs() < 1e-12);
  }

  #[test]
  fn gray_is_a_joule_per_kilogram() {
    assert_uom_eq!(joule_per_kilogram, gray(1.5), AbsorbedDose::new::<joule_per_kilogram>(1.5), ulps <= 1);
  }

  #[test]
  fn percent_is_a_ratio() {
    assert!((ratio_(percent(3.0)) - 0.03).abs() < 1e-12);
  }

  #[test]
  fn lengths_parse_from_strings() {
    let l: Length = "3 mm".parse().unwrap();
    assert_uom_eq!(millimeter, l, mm(3.0), ulps <= 1);
  }

  #[test]
  fn doses_parse_from_strings() {
    assert_uom_eq!(Gy, parse_dose("2 Gy"     ).unwrap(), gray(2.0), ulps <= 1);
    assert_uom_eq!(Gy, parse_dose("180 cGy"  ).unwrap(), gray(1.8), r2nd <= 1e-12);
    assert_uom_eq!(Gy, parse_dose("3 grays"  ).unwrap(), gray(3.0), ulps <= 1);
    assert_uom_eq!(Gy, parse_dose(" 4 J/kg  ").unwrap(), gray(4.0), ulps <= 1);
    assert!(parse_dose("2").is_err());
    assert!(parse_dose("two Gy").is_err());
    assert!(parse_dose("2 Sv").is_err());
  }
}
