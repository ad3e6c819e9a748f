//! Control panel, peripheral device contract, and paper-tape image formats
//! for the Bendix G-15 (§6). Everything here is an external collaborator
//! the core reads or writes through a narrow interface; none of it touches
//! the drum or the processor's state machine directly.

mod device;
mod panel;
mod tape;

pub use device::{Device, DeviceOutcome};
pub use panel::{ComputeSwitch, ControlPanel, EnableSwitch, PanelSwitches, PunchSwitch};
pub use tape::{load_ascii, load_pierce, load_standard, TapeImageError};
