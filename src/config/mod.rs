mod settings;

pub use settings::{Command, Config, DaemonSettings, PathSettings, ReporterSettings, Settings};
