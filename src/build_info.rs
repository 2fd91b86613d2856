mod raw {
    // This is a full list of the constants in built.rs we use. See https://docs.rs/built/latest/built/index.html
    //
    // /// The full version.
    // pub const PKG_VERSION: &str = "0.1.0";
    // /// The features that were enabled during compilation.
    // pub const FEATURES_STR: &str = "BUILTIN_ENV_LOGGER, DEFAULT";
    // /// The target triple that was being compiled for.
    // pub const TARGET: &str = "x86_64-unknown-linux-gnu";
    // /// The build profile.
    // pub const PROFILE: &str = "debug";

    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// gc-control crate version such as 0.1.0
pub const GC_CONTROL_PKG_VERSION: &str = raw::PKG_VERSION;

/// Comma separated features enabled for this build
pub const GC_CONTROL_FEATURES: &str = raw::FEATURES_STR;

/// The target triple this crate was compiled for
pub const GC_CONTROL_TARGET: &str = raw::TARGET;

/// The build profile, `debug` or `release`
pub const GC_CONTROL_PROFILE: &str = raw::PROFILE;
