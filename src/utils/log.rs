use super::config::Config;

pub fn setup_logger(config: &Config) -> Result<String, fern::InitError> {
    let log_file_path = config.log_file.as_path();
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(config.log_level)
        // Rocket's own request logging is noisy below info.
        .level_for("rocket", config.log_level.min(log::LevelFilter::Info))
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file_path)?)
        .apply()?;
    Ok(log_file_path.display().to_string())
}
