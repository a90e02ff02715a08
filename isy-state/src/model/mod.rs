//! Entity data model

mod change;
mod ids;
mod platform;
mod record;
mod value;

pub use change::{ChangeKind, ChangeNotification, ReconcileMode, ReconcileReport};
pub use ids::{EntityId, EntityKey, HubId, ProgramKey, VariableKey};
pub use platform::{DeviceClass, Platform, SubNodeRole};
pub use record::{
    EntityRecord, EntitySource, ProgramRecord, UnitInfo, VariableRecord,
};
pub use value::{state, AttributeValue, Attributes};
