use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::{DetectorBackend, DetectorOptions};
use super::backends::{CpuBackend, StubBackend};

/// Constructor for a named backend.
pub type BackendFactory = fn(&DetectorOptions) -> Box<dyn DetectorBackend>;

/// Registry of detector backends, selected by name from configuration.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry with the backends shipped in this crate. `cpu` is the default.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("cpu", |options| Box::new(CpuBackend::new(options.clone())));
        registry.register("stub", |_| Box::new(StubBackend::new()));
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register(&mut self, name: &str, factory: BackendFactory) {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), factory);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Instantiate a backend by name.
    pub fn create(&self, name: &str, options: &DetectorOptions) -> Result<Box<dyn DetectorBackend>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        Ok(factory(options))
    }

    /// Instantiate the default backend.
    pub fn create_default(&self, options: &DetectorOptions) -> Result<Box<dyn DetectorBackend>> {
        let name = self
            .default_name
            .as_deref()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.create(name, options)
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_backends_are_available() -> Result<()> {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.list(), vec!["cpu".to_string(), "stub".to_string()]);

        let options = DetectorOptions::default();
        assert_eq!(registry.create("stub", &options)?.name(), "stub");
        assert_eq!(registry.create_default(&options)?.name(), "cpu");
        Ok(())
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut registry = BackendRegistry::with_builtin();
        let err = registry
            .create("mlkit", &DetectorOptions::default())
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("mlkit"));
        assert!(registry.set_default("mlkit").is_err());
    }

    #[test]
    fn default_can_be_changed() -> Result<()> {
        let mut registry = BackendRegistry::with_builtin();
        registry.set_default("stub")?;
        assert_eq!(
            registry.create_default(&DetectorOptions::default())?.name(),
            "stub"
        );
        Ok(())
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = BackendRegistry::new();
        assert!(registry.create_default(&DetectorOptions::default()).is_err());
    }
}
