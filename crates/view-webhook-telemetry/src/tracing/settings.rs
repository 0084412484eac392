//! Subscriber settings.

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

/// General settings that apply to any subscriber.
#[derive(Debug, PartialEq)]
pub struct Settings {
    /// The environment variable used to set the [`LevelFilter`].
    ///
    /// When the environment variable is set, it will override what is set by
    /// [`Self::default_level`].
    pub environment_variable: &'static str,

    /// The [`LevelFilter`] to fallback to if [`Self::environment_variable`] has
    /// not been set.
    pub default_level: LevelFilter,
}

/// Indicates whether a subscriber is enabled.
pub trait SettingsToggle {
    fn is_enabled(&self) -> bool;

    fn is_disabled(&self) -> bool {
        !self.is_enabled()
    }
}

#[derive(Debug, Default, PartialEq)]
pub enum ConsoleLogSettings {
    #[default]
    Disabled,

    Enabled { common_settings: Settings },
}

#[derive(Debug, Default, PartialEq)]
pub enum FileLogSettings {
    #[default]
    Disabled,

    Enabled {
        common_settings: Settings,

        file_log_dir: PathBuf,

        rotation_period: Rotation,
    },
}

#[derive(Debug, Default, PartialEq)]
pub enum OtlpTraceSettings {
    #[default]
    Disabled,

    Enabled { common_settings: Settings },
}

impl SettingsToggle for ConsoleLogSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl SettingsToggle for FileLogSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl SettingsToggle for OtlpTraceSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl FileLogSettings {
    pub fn new(
        environment_variable: &'static str,
        default_level: LevelFilter,
        file_log_dir: impl Into<PathBuf>,
        rotation_period: impl Into<Rotation>,
    ) -> Self {
        Self::Enabled {
            common_settings: Settings {
                environment_variable,
                default_level,
            },
            file_log_dir: file_log_dir.into(),
            rotation_period: rotation_period.into(),
        }
    }
}

impl<T> From<Option<T>> for FileLogSettings
where
    T: Into<FileLogSettings>,
{
    fn from(settings: Option<T>) -> Self {
        settings.map_or_else(Self::default, Into::into)
    }
}

// Console and OTLP trace settings share the same shape, so both get the
// (environment variable, default level) and (.., enabled) tuple conversions.
macro_rules! impl_tuple_conversions {
    ($settings:ident) => {
        impl From<(&'static str, LevelFilter)> for $settings {
            fn from((environment_variable, default_level): (&'static str, LevelFilter)) -> Self {
                Self::Enabled {
                    common_settings: Settings {
                        environment_variable,
                        default_level,
                    },
                }
            }
        }

        impl From<(&'static str, LevelFilter, bool)> for $settings {
            fn from(
                (environment_variable, default_level, enabled): (&'static str, LevelFilter, bool),
            ) -> Self {
                if enabled {
                    (environment_variable, default_level).into()
                } else {
                    Self::Disabled
                }
            }
        }
    };
}

impl_tuple_conversions!(ConsoleLogSettings);
impl_tuple_conversions!(OtlpTraceSettings);
