use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnergyClass {
    Clean,
    Fossil,
    Unknown,
}

/// Generation source codes reported by the EIA hourly fuel-type feed.
///
/// The set is closed: a code missing here means the table has fallen out of
/// sync with upstream, and parsing fails rather than guessing a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuelType {
    Coal,
    NaturalGas,
    Oil,
    Nuclear,
    Hydro,
    Wind,
    Solar,
    Biomass,
    Geothermal,
    Other,
}

impl FuelType {
    pub const ALL: [FuelType; 10] = [
        FuelType::Coal,
        FuelType::NaturalGas,
        FuelType::Oil,
        FuelType::Nuclear,
        FuelType::Hydro,
        FuelType::Wind,
        FuelType::Solar,
        FuelType::Biomass,
        FuelType::Geothermal,
        FuelType::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Coal => "COL",
            Self::NaturalGas => "NG",
            Self::Oil => "OIL",
            Self::Nuclear => "NUC",
            Self::Hydro => "WAT",
            Self::Wind => "WND",
            Self::Solar => "SUN",
            Self::Biomass => "BIO",
            Self::Geothermal => "GEO",
            Self::Other => "OTH",
        }
    }

    pub fn class(self) -> EnergyClass {
        match self {
            Self::Coal | Self::NaturalGas | Self::Oil => EnergyClass::Fossil,
            Self::Nuclear | Self::Hydro | Self::Wind | Self::Solar | Self::Biomass | Self::Geothermal => {
                EnergyClass::Clean
            }
            Self::Other => EnergyClass::Unknown,
        }
    }
}

impl FromStr for FuelType {
    type Err = ConfigError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|fuel| fuel.code() == code)
            .ok_or_else(|| ConfigError::UnknownFuelType(code.to_string()))
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
