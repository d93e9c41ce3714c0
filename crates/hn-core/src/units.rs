//! SI quantities for pipe hydraulics.

use uom::si::f64::{
    Area as UomArea, Length as UomLength, Velocity as UomVelocity,
    VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Velocity = UomVelocity;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

#[inline]
pub fn m3ps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

/// Circular cross-section area for a given diameter.
#[inline]
pub fn circle_area(diameter: Length) -> Area {
    diameter * diameter * (std::f64::consts::PI / 4.0)
}

/// Mean velocity of a flow through a circular section.
///
/// Returns zero velocity for degenerate (non-positive) diameters.
pub fn mean_velocity(flow: VolumeRate, diameter: Length) -> Velocity {
    use uom::si::velocity::meter_per_second;
    let area = circle_area(diameter);
    if area.value <= 0.0 {
        return Velocity::new::<meter_per_second>(0.0);
    }
    (flow / area).abs()
}

/// Flow units understood by the hydraulic layer, with their factor to m³/s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowUnits {
    /// Liters per second
    Lps,
    /// Liters per minute
    Lpm,
    /// Megaliters per day
    Mld,
    /// Cubic meters per hour
    Cmh,
    /// Cubic meters per day
    Cmd,
}

impl FlowUnits {
    /// Parse an INP `Units` keyword (case-insensitive). US customary units are not supported.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LPS" => Some(Self::Lps),
            "LPM" => Some(Self::Lpm),
            "MLD" => Some(Self::Mld),
            "CMH" => Some(Self::Cmh),
            "CMD" => Some(Self::Cmd),
            _ => None,
        }
    }

    pub fn to_m3ps_factor(self) -> f64 {
        match self {
            Self::Lps => 1e-3,
            Self::Lpm => 1e-3 / 60.0,
            Self::Mld => 1e3 / 86_400.0,
            Self::Cmh => 1.0 / 3_600.0,
            Self::Cmd => 1.0 / 86_400.0,
        }
    }

    pub fn to_si(self, v: f64) -> VolumeRate {
        m3ps(v * self.to_m3ps_factor())
    }

    pub fn from_si(self, q: VolumeRate) -> f64 {
        q.value / self.to_m3ps_factor()
    }
}

pub mod constants {
    pub const G0_MPS2: f64 = 9.806_65;
}
