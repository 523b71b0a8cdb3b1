const fn unwrap_or_cargo_version(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Build version; `APP_VERSION` at compile time overrides the crate version.
pub const VERSION: &str = unwrap_or_cargo_version(option_env!("APP_VERSION"));

/// Line printed for `--version`.
pub fn version_line() -> String {
    format!("serialmint-server {VERSION}")
}
