use std::io::Write;

use chrono::Local;
use log::LevelFilter;

/// Installs the global logger on stderr.
///
/// `level` is the default; `RUST_LOG` overrides it, e.g. `RUST_LOG=qos_routing_lab=debug`.
/// Calling this more than once is harmless.
pub fn init(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}

/// Maps the number of `-v` flags to a level, starting from `info`.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Info);
        assert_eq!(level_from_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(4), LevelFilter::Trace);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(LevelFilter::Warn);
        init(LevelFilter::Debug);
    }
}
