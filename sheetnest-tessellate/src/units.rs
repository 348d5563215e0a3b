use glam::DVec2;
use serde::{Deserialize, Serialize};
use sheetnest_core::geometry::Point2;

/// 图纸单位，对应头变量 `$INSUNITS` 的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Unitless,
    Inches,
    Feet,
    Miles,
    Millimeters,
    Centimeters,
    Meters,
    Kilometers,
    Microinches,
    Mils,
    Yards,
    Angstroms,
    Nanometers,
    Microns,
    Decimeters,
    Decameters,
    Hectometers,
    Gigameters,
    AstronomicalUnits,
    LightYears,
    Parsecs,
}

impl Units {
    /// 未知代码按无单位处理。
    pub fn from_insunits(code: i32) -> Self {
        match code {
            1 => Units::Inches,
            2 => Units::Feet,
            3 => Units::Miles,
            4 => Units::Millimeters,
            5 => Units::Centimeters,
            6 => Units::Meters,
            7 => Units::Kilometers,
            8 => Units::Microinches,
            9 => Units::Mils,
            10 => Units::Yards,
            11 => Units::Angstroms,
            12 => Units::Nanometers,
            13 => Units::Microns,
            14 => Units::Decimeters,
            15 => Units::Decameters,
            16 => Units::Hectometers,
            17 => Units::Gigameters,
            18 => Units::AstronomicalUnits,
            19 => Units::LightYears,
            20 => Units::Parsecs,
            _ => Units::Unitless,
        }
    }

    pub fn millimeters_per_unit(self) -> f64 {
        match self {
            Units::Unitless | Units::Millimeters => 1.0,
            Units::Inches => 25.4,
            Units::Feet => 304.8,
            Units::Miles => 1_609_344.0,
            Units::Centimeters => 10.0,
            Units::Meters => 1_000.0,
            Units::Kilometers => 1.0e6,
            Units::Microinches => 2.54e-5,
            Units::Mils => 0.0254,
            Units::Yards => 914.4,
            Units::Angstroms => 1.0e-7,
            Units::Nanometers => 1.0e-6,
            Units::Microns => 1.0e-3,
            Units::Decimeters => 100.0,
            Units::Decameters => 1.0e4,
            Units::Hectometers => 1.0e5,
            Units::Gigameters => 1.0e12,
            Units::AstronomicalUnits => 1.495_978_707e14,
            Units::LightYears => 9.460_730_472_580_8e18,
            Units::Parsecs => 3.085_677_581_491_367e19,
        }
    }
}

/// 把图纸坐标换算为目标单位（毫米）：`(p - origin) * factor`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConversion {
    factor: f64,
    origin: DVec2,
}

impl UnitConversion {
    pub fn identity() -> Self {
        Self {
            factor: 1.0,
            origin: DVec2::ZERO,
        }
    }

    pub fn from_units(units: Units) -> Self {
        Self {
            factor: units.millimeters_per_unit(),
            origin: DVec2::ZERO,
        }
    }

    pub fn with_origin(mut self, origin: Point2) -> Self {
        self.origin = origin.as_vec2();
        self
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    #[inline]
    pub fn point(&self, x: f64, y: f64) -> Point2 {
        Point2::from_vec((DVec2::new(x, y) - self.origin) * self.factor)
    }

    #[inline]
    pub fn length(&self, value: f64) -> f64 {
        value * self.factor
    }
}

impl Default for UnitConversion {
    fn default() -> Self {
        Self::identity()
    }
}
