//! Periodic capture/update coordination.
//!
//! The hosting runtime calls `<prefix>.capture-position` and then
//! `<prefix>.update` once per servo period. Both visit every module in
//! registration order and never allocate.

use crate::context::PruContext;
use crate::error::PruError;
use crate::modules::PruModule;
use crate::region::SharedRegion;
use crate::signals::SignalTable;
use tracing::debug;

/// Ordered set of modules driven by the two periodic functions.
pub struct CycleCoordinator {
    modules: Vec<Box<dyn PruModule>>,
}

impl CycleCoordinator {
    /// Take ownership of `modules` and export the periodic functions.
    ///
    /// # Errors
    /// Duplicate function names.
    pub fn new(
        prefix: &str,
        modules: Vec<Box<dyn PruModule>>,
        signals: &mut SignalTable,
    ) -> Result<Self, PruError> {
        signals.export_function(format!("{prefix}.capture-position"))?;
        signals.export_function(format!("{prefix}.update"))?;
        Ok(Self { modules })
    }

    /// Lay out every module in order, then write all host-owned fields.
    ///
    /// # Errors
    /// The first failing module aborts the sequence.
    pub fn init(&mut self, ctx: &mut PruContext) -> Result<(), PruError> {
        for module in &mut self.modules {
            module.init(ctx)?;
            debug!("Module {} initialised", module.name());
        }
        self.force_write(ctx.region_mut());
        Ok(())
    }

    /// Publish firmware-owned fields.
    pub fn capture(&mut self, region: &SharedRegion) {
        for module in &mut self.modules {
            module.capture(region);
        }
    }

    /// Write changed host-owned fields.
    pub fn update(&mut self, region: &mut SharedRegion) {
        for module in &mut self.modules {
            module.update(region);
        }
    }

    /// Write every host-owned field.
    pub fn force_write(&mut self, region: &mut SharedRegion) {
        for module in &mut self.modules {
            module.force_write(region);
        }
    }

    /// Modules in registration order.
    pub fn modules(&self) -> &[Box<dyn PruModule>] {
        &self.modules
    }
}
