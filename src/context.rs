use std::cell::RefCell;
use std::rc::Rc;

use crate::config::Config;
use crate::settings::Settings;

/// Environment handed to constructors: configuration plus a shared settings
/// store. Cloning shares the same settings.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub settings: Rc<RefCell<Settings>>,
}

impl Context {
    pub fn new(config: Config, settings: Settings) -> Self {
        Self {
            config,
            settings: Rc::new(RefCell::new(settings)),
        }
    }

    /// Default configuration with settings that are never persisted.
    pub fn in_memory() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let settings = Settings::in_memory(&config);
        Self::new(config, settings)
    }
}
