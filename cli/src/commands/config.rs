//! Config command - inspect and edit persisted settings.

use anyhow::Result;
use reallystop_core::{ConfigStore, Settings};

pub async fn show(store: &ConfigStore, json: bool) -> Result<()> {
    let settings = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("Config file: {}", store.path().display());
    print_settings(&settings);
    Ok(())
}

pub async fn set_names(store: &ConfigStore, names: Vec<String>) -> Result<()> {
    store.set_process_names(&names).await?;
    println!("Process list: {}", names.join(", "));
    Ok(())
}

pub async fn set_ports(store: &ConfigStore, ports: Vec<String>) -> Result<()> {
    store.set_port_list(&ports).await?;
    if ports.is_empty() {
        println!("Port list cleared.");
    } else {
        println!("Port list: {}", ports.join(", "));
    }
    Ok(())
}

pub async fn set_flags(
    store: &ConfigStore,
    user: Option<bool>,
    children: Option<bool>,
    ports: Option<bool>,
    force_clean: Option<bool>,
) -> Result<()> {
    let settings = store.set_flags(user, children, ports, force_clean).await?;
    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &Settings) {
    let ports = if settings.port_list.is_empty() {
        "(none)".to_string()
    } else {
        settings.port_list.join(", ")
    };

    println!("Processes:        {}", settings.custom_process_list.join(", "));
    println!("Current user:     {}", on_off(settings.user_process_match));
    println!("Children only:    {} (IDE hosts only)", on_off(settings.child_process_match));
    println!("Port restriction: {} [{}]", on_off(settings.port_process_match), ports);
    println!("Force clean:      {}", on_off(settings.force_clean));
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
