use log::LevelFilter;

/// Builds the log dispatcher used by binaries: RFC 3339 timestamp, level,
/// target, message, written to stderr so stdout stays free for output.
#[must_use]
pub fn dispatch(level: LevelFilter) -> fern::Dispatch {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
}

/// Initialize logging for the application.
/// Should be called once at the start of `main()`.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    dispatch(level).apply()
}
