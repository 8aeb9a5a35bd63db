//! Built-in migration steps, one module per schema version bump

mod phase_tracking;
mod promote_lists;
mod relocate_fields;

pub use phase_tracking::IntroducePhaseTracking;
pub use promote_lists::{PromoteWrappedLists, WrappedList, WRAPPED_LISTS};
pub use relocate_fields::{RelocateFields, Relocation, RELOCATIONS};

use crate::step::MigrationStep;

/// Every built-in step in ascending version order
#[must_use]
pub fn builtin_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(PromoteWrappedLists),
        Box::new(RelocateFields),
        Box::new(IntroducePhaseTracking),
    ]
}
