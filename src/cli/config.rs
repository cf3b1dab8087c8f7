use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/anomaly-connector/config.yml, fall back to /etc
    let config_path = dirs::home_dir()
        .map(|home| home.join(".config/anomaly-connector/config.yml"))
        .filter(|path| match path.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/anomaly-connector/config.yml");
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from("/etc/anomaly-connector/config.yml"));

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}
