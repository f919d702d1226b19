mod module_host;
mod traits;

pub use module_host::ModuleHost;
pub use traits::{AsyncModule, ModuleError, ModuleEvent, ModuleId, ModuleMessage};
