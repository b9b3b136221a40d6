use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Batch service selected for the lifetime of a daemon process.
///
/// Exactly one service type is chosen at startup. [`ServiceType::NoService`]
/// means the process is not running headless and the command listener must
/// never start.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ServiceType {
    /// Gerber fabrication output.
    Gerber,
    /// gEDA footprint export.
    Geda,
    /// KiCad schematic symbol export.
    KicadSchematic,
    /// KiCad footprint export.
    KicadFootprint,
    /// Example sketch generation.
    Example,
    /// Parts database regeneration.
    Database,
    /// SVG rendering of sketch views.
    Svg,
    /// Remote control over the command port; every command is enabled.
    Port,
    /// Design-rule check.
    Drc,
    /// Every export format in one pass.
    ExportAll,
    /// Interactive mode; no headless service runs.
    #[default]
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    NoService,
}

impl ServiceType {
    /// Returns true when the process runs in headless service mode.
    #[must_use]
    pub const fn is_service_mode(self) -> bool {
        !matches!(self, Self::NoService)
    }

    /// Returns true for services that run as background tasks.
    #[must_use]
    pub const fn is_long_running(self) -> bool {
        matches!(self, Self::Database)
    }

    /// Returns true when `other` may be executed while `self` is active.
    ///
    /// The port service enables every command; any other service only its
    /// own.
    #[must_use]
    pub fn permits(self, other: Self) -> bool {
        match self {
            Self::NoService => false,
            Self::Port => !matches!(other, Self::Port | Self::NoService),
            active => active == other,
        }
    }
}
