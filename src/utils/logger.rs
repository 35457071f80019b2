use colored::Colorize;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// Pipeline and step targets (`troilkatt::pipeline::<name>`, `troilkatt::step::<id>`) are shown
/// by their last segment so records from one step can be told apart.
fn context_label(target: &str) -> Option<&str> {
    let rest = target.strip_prefix(env!("CARGO_PKG_NAME"))?.strip_prefix("::")?;
    let (kind, name) = rest.split_once("::")?;
    matches!(kind, "pipeline" | "step").then_some(name)
}

pub fn setup_logging(verbose: bool) {
    use log::LevelFilter;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let label = context_label(record.target());
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    let path = label.unwrap_or(record.target()).white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                _ => match label {
                    Some(l) => format!("[{} {}] {}", name.cyan(), l.white(), record.args()),
                    None => format!("[{}] {}", name.cyan(), record.args()),
                },
            };
            writeln!(buf, "{}", line)
        })
        .init();
}
