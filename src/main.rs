use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use xray::configuration::config::Config;
use xray::controller::controller_handler::Controller;

#[derive(Parser)]
#[command(name = "xray-agent")]
#[command(version)]
#[command(about = "Reconciles x-ray diagnostic sessions and harvests their samples")]
struct Args {
    /// Path to the TOML configuration file
    config_file: PathBuf,

    /// Port of the web interface, overriding the configuration file
    #[arg(long, env = "XRAY_WEB_PORT")]
    web_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let mut config = match Config::load(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.web_port {
        config.web.port = port;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
