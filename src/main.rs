use anyhow::Context;
use foamsender::{init_logging, Config, BUILD_DATE, VERSION};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    init_logging()?;
    tracing::info!("FoamSender {} (built {})", VERSION, BUILD_DATE);

    let config_path = Config::config_file_path()?;
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Invalid settings in {}", config_path.display()))?;
    tracing::info!("Using {} backend", config.connection.backend);

    #[cfg(feature = "gtk")]
    if !std::env::args().any(|arg| arg == "--console") {
        // The window owns the process until it is closed.
        let code = foamsender_ui::gtk_app::run(config).value();
        if code != 0 {
            tracing::warn!("Window exited with status {}", code);
        }
        return Ok(ExitCode::from(foamsender::exit_status(code)));
    }

    foamsender::console::run(&config)?;
    Ok(ExitCode::SUCCESS)
}
