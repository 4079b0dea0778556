use std::path::PathBuf;

pub mod config;
pub mod document;
pub mod template;
pub mod updater;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = PathBuf::from("./config.yaml");
    let config = config::parse(&config_path)?;

    let client = updater::CloudFormation::new(config.region.clone()).await;
    let response = updater::Updater::new(client).run(&config).await?;

    println!("{:#?}", response);

    return Ok(());
}
