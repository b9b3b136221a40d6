//! Placeholder collaborators installed until real engines are plugged in.

use camino::{Utf8Path, Utf8PathBuf};
use edad_config::ServiceType;

use super::{DrcEngine, DrcReport, Exporter, SERVICES_TARGET, ServiceError};

/// Design-rule engine that reports the check as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDrcEngine;

impl DrcEngine for UnavailableDrcEngine {
    fn check(&mut self, sketch: &Utf8Path) -> Result<DrcReport, ServiceError> {
        tracing::warn!(
            target: SERVICES_TARGET,
            sketch = %sketch,
            "design-rule check requested but no engine is installed"
        );
        Err(ServiceError::Unavailable {
            service: ServiceType::Drc,
        })
    }
}

/// Exporter that reports every format as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableExporter;

impl Exporter for UnavailableExporter {
    fn export(
        &mut self,
        format: ServiceType,
        _input: &Utf8Path,
        _output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ServiceError> {
        tracing::warn!(
            target: SERVICES_TARGET,
            format = %format,
            "export requested but no exporter is installed"
        );
        Err(ServiceError::Unavailable { service: format })
    }
}
