//! Execution context handed to every example routine

use std::io::Write;

use crate::config::DemoConfig;
use crate::facility::Facilities;

/// Output sink, configuration and facility switches for one run
pub struct DemoContext<'a> {
    out: &'a mut dyn Write,
    config: &'a DemoConfig,
    facilities: Facilities,
}

impl<'a> DemoContext<'a> {
    /// Context using the facilities the config leaves enabled
    #[must_use]
    pub fn new(out: &'a mut dyn Write, config: &'a DemoConfig) -> Self {
        Self {
            out,
            config,
            facilities: config.facilities(),
        }
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    #[must_use]
    pub const fn config(&self) -> &'a DemoConfig {
        self.config
    }

    #[must_use]
    pub const fn facilities(&self) -> &Facilities {
        &self.facilities
    }
}
