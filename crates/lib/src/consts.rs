pub const APP_NAME: &str = "stepmake";

/// Default project file name, looked up in the project root.
pub const PROJECT_FILE: &str = "Stepfile.toml";

/// Suffix of temporary outputs before they are promoted to their final name.
pub const TMP_SUFFIX: &str = ".stepmake-tmp";

/// Marker that tags template lines with a step index.
pub const DEFAULT_MARKER: &str = "@step";

pub const ENV_CC: &str = "CC";
pub const ENV_SDKROOT: &str = "SDKROOT";
pub const ENV_OPT: &str = "STEPMAKE_OPT";
pub const ENV_DEBUG: &str = "STEPMAKE_DEBUG";
pub const ENV_VERBOSE: &str = "STEPMAKE_VERBOSE";

/// Placeholders expanded in the filter command line.
pub const PH_SELF: &str = "{self}";
pub const PH_STEP: &str = "{step}";
pub const PH_TEMPLATE: &str = "{template}";
pub const PH_MARKER: &str = "{marker}";
