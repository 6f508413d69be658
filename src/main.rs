use dotenv::dotenv;
use env_logger::Env;
use log::info;

use imgcache::config::{self, AppConfig};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let figment = config::figment();
    let config = figment.extract::<AppConfig>()?;
    info!("Configuration loaded successfully");

    info!(
        "Starting image cache proxy on {}:{}",
        config.address, config.port
    );

    let _ = imgcache::build_rocket(figment, config)?.launch().await?;
    Ok(())
}
