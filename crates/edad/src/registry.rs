//! Command-name to service mapping.
//!
//! The table is static: command names are the kebab-case service names
//! (`drc`, `gerber`, `kicad-footprint`, ...). The port service and the
//! disabled marker own no command. Lookup is case-insensitive and a pure
//! function of the name.

use edad_config::ServiceType;

use crate::dispatch::DispatchError;

/// Returns the service answering to `name`, if any.
#[must_use]
pub fn lookup(name: &str) -> Option<ServiceType> {
    name.parse::<ServiceType>()
        .ok()
        .filter(|service| command_name(*service).is_some())
}

/// Returns the command name that invokes `service`.
#[must_use]
pub const fn command_name(service: ServiceType) -> Option<&'static str> {
    match service {
        ServiceType::Gerber => Some("gerber"),
        ServiceType::Geda => Some("geda"),
        ServiceType::KicadSchematic => Some("kicad-schematic"),
        ServiceType::KicadFootprint => Some("kicad-footprint"),
        ServiceType::Example => Some("example"),
        ServiceType::Database => Some("database"),
        ServiceType::Svg => Some("svg"),
        ServiceType::Drc => Some("drc"),
        ServiceType::ExportAll => Some("export-all"),
        ServiceType::Port | ServiceType::NoService => None,
    }
}

/// Registry bound to the process's active service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceRegistry {
    active: ServiceType,
}

impl ServiceRegistry {
    /// Creates a registry for the given active service.
    #[must_use]
    pub const fn new(active: ServiceType) -> Self {
        Self { active }
    }

    /// Service selected for this process.
    #[must_use]
    pub const fn active(&self) -> ServiceType {
        self.active
    }

    /// Resolves a command name against the table and the active service.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownCommand`] for names missing from the
    /// table and [`DispatchError::ServiceDisabled`] for commands the active
    /// service does not enable.
    pub fn resolve(&self, name: &str) -> Result<ServiceType, DispatchError> {
        let service = lookup(name).ok_or_else(|| DispatchError::unknown_command(name))?;
        if self.active.permits(service) {
            Ok(service)
        } else {
            Err(DispatchError::service_disabled(service, self.active))
        }
    }
}
