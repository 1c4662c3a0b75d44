use crate::error::{Error, Result};

/// Installs a stderr logger. Verbosity counts `-v` flags:
/// 0 is warnings and errors, then info, debug and trace.
pub fn init(verbosity: u8) -> Result<()> {
    let level = match verbosity {
    | 0 => log::LevelFilter::Warn,
    | 1 => log::LevelFilter::Info,
    | 2 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|error| Error::Config(error.to_string()))
}
