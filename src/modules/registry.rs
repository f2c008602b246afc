//! Central registry for all execution modules

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::AdapterConfig;
use crate::modules::{
    error::ModuleError,
    executor::CommandRunner,
    interface::{ExecutionModule, ModuleArgs, ModuleResult},
    net::FirewallModule,
    source_control::SvnModule,
    sync::GoodSyncModule,
    system::WindowsServiceModule,
    web::IisModule,
};

/// Central registry for all execution modules
pub struct ModuleRegistry {
    modules: HashMap<String, Box<dyn ExecutionModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with every Windows adapter sharing one runner
    pub fn with_windows_modules(
        config: &AdapterConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ModuleError> {
        let mut registry = Self::new();

        registry.register(Box::new(GoodSyncModule::new(
            runner.clone(),
            config.goodsync.clone(),
        )));
        registry.register(Box::new(IisModule::new(runner.clone(), &config.iis)?));
        registry.register(Box::new(WindowsServiceModule::new(runner.clone())));
        registry.register(Box::new(SvnModule::new(runner.clone(), config.svn.clone())));
        registry.register(Box::new(FirewallModule::new(runner, config.firewall.clone())));

        Ok(registry)
    }

    pub fn register(&mut self, module: Box<dyn ExecutionModule>) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn get_module(&self, name: &str) -> Option<&dyn ExecutionModule> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    /// Registered module names, sorted
    pub fn list_modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub async fn execute_module(
        &self,
        module_name: &str,
        args: &ModuleArgs,
    ) -> Result<ModuleResult, ModuleError> {
        let module = self
            .get_module(module_name)
            .ok_or_else(|| ModuleError::ModuleNotFound(module_name.to_string()))?;

        module.validate_args(args)?;

        debug!("Executing {} {}", module_name, args.action);
        module.execute(args).await
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
