use alloc::boxed::Box;
use core::fmt::Write;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, set_logger, set_max_level};
use spin::Mutex;

/// Where formatted log lines go.
static CONSOLE: Mutex<Option<Box<dyn Write + Send>>> = Mutex::new(None);

/// Install the console sink, returning the previous one.
pub fn set_console(sink: Box<dyn Write + Send>) -> Option<Box<dyn Write + Send>> {
    CONSOLE.lock().replace(sink)
}

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 20,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        if let Some(console) = CONSOLE.lock().as_mut() {
            let _ = writeln!(
                console,
                "\u{1B}[{}m[{:}] {}\u{1B}[0m",
                color,
                record.level(),
                record.args(),
            );
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    set_logger(&LOGGER)?;
    set_max_level(level);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!(target: $target, $crate::__log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!($crate::__log::Level::Debug, $($arg)+)
        }
    }
}
