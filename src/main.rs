mod app;
mod cli;

use app::PostCreatorApp;
use eframe::egui;
use postcreator::logger;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("PostCreator"),
        ..Default::default()
    };

    eframe::run_native(
        "PostCreator",
        options,
        Box::new(|cc| Box::new(PostCreatorApp::new(cc))),
    )
}
