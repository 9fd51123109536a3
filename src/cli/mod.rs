pub(crate) mod command;
pub(crate) mod context;
pub(crate) mod diagnose;
pub(crate) mod fix;
pub(crate) mod inspect;
pub(crate) mod scan;
pub(crate) mod status;
pub(crate) mod ui;

pub use self::command::{
    Args, Command, DeviceArgs, FakeArgs, LogLevel, OutputFormat, ScanArgs, ScanSource,
    SettingsOverrides,
};
