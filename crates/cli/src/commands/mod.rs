pub mod check;
pub mod ensure;
pub mod hosts;
pub mod lifecycle;
pub mod version;
pub mod vms;
