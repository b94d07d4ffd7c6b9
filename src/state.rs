//! Shared application state handed to every API handler.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::CatalogCache;
use crate::client::HttpCommandClient;
use crate::command::CommandService;
use crate::device::{DeviceControl, HttpDeviceControl};
use crate::discovery::DiscoveryCache;
use crate::macros::MacroEngine;
use crate::paths;
use crate::settings::AppSettings;
use crate::supervisor::ProcessSupervisor;

pub struct AppState {
    pub settings: AppSettings,
    pub supervisor: Arc<ProcessSupervisor>,
    pub commands: Arc<CommandService>,
    pub device: Arc<dyn DeviceControl>,
    pub discovery: Arc<DiscoveryCache>,
    pub catalog: Arc<CatalogCache>,
    pub macros: Arc<MacroEngine>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        let bridge_url = settings.bridge_url();

        let supervisor = Arc::new(ProcessSupervisor::new(
            settings.bridge_executable.clone(),
            settings.bridge_port,
        ));
        let device: Arc<dyn DeviceControl> = Arc::new(HttpDeviceControl::new(bridge_url.clone()));
        let discovery = Arc::new(DiscoveryCache::new(device.clone()));
        let commands = Arc::new(CommandService::new(
            supervisor.clone(),
            Arc::new(HttpCommandClient::new(bridge_url)),
            discovery.clone(),
            Duration::from_secs(settings.command_timeout_secs),
        ));
        let catalog = Arc::new(CatalogCache::new(device.clone()));
        let macros = Arc::new(MacroEngine::new(
            paths::macros_path(&settings.data_dir),
            paths::macros_metadata_path(&settings.data_dir),
            commands.clone(),
        ));

        Self {
            settings,
            supervisor,
            commands,
            device,
            discovery,
            catalog,
            macros,
        }
    }
}
