//! Device Simulator - Entry Point
//!
//! Simulates one or more IoT devices connecting to an MQTT broker,
//! responding to commands on their command topics and publishing
//! status, response and telemetry messages.

use std::collections::HashMap;
use std::env;

use device_simulator::app::options::AppOptions;
use device_simulator::app::run::run;
use device_simulator::capability::DeviceType;
use device_simulator::logs::{init_logging, LogLevel, LogOptions};
use device_simulator::mqtt::client::{Credentials, MqttAddress};
use device_simulator::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version_info()).unwrap());
        return;
    }

    // Initialize logging
    let log_level = match cli_args.get("log-level") {
        Some(level) => match level.parse::<LogLevel>() {
            Ok(level) => level,
            Err(e) => {
                println!("{e}");
                return;
            }
        },
        None => LogLevel::Info,
    };
    let log_options = LogOptions {
        log_level,
        json_format: cli_args.contains_key("log-json"),
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Broker address
    let mut broker = MqttAddress::default();
    if let Some(host) = cli_args.get("broker") {
        broker.host = host.clone();
    }
    if let Some(port) = cli_args.get("port") {
        match port.parse::<u16>() {
            Ok(port) => broker.port = port,
            Err(_) => {
                error!("Invalid broker port: {}", port);
                return;
            }
        }
    }
    broker.use_tls = cli_args.contains_key("tls");
    broker.ca_cert_path = cli_args.get("ca-cert").cloned();

    // Optional credentials
    let credentials = match (cli_args.get("username"), cli_args.get("password")) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    // Device count
    let device_count = match cli_args.get("devices") {
        Some(count) => match count.parse::<usize>() {
            Ok(count) => count,
            Err(_) => {
                error!("Invalid device count: {}", count);
                return;
            }
        },
        None => 1,
    };

    // Device types. An unknown type fails fast, before any session opens.
    let types_arg = cli_args
        .get("types")
        .cloned()
        .unwrap_or_else(|| "light,thermostat,switch,sensor".to_string());
    let mut device_types = Vec::new();
    for raw in types_arg.split(',') {
        match raw.parse::<DeviceType>() {
            Ok(device_type) => device_types.push(device_type),
            Err(e) => {
                error!("{}", e);
                return;
            }
        }
    }

    let options = AppOptions {
        broker,
        credentials,
        device_count,
        device_types,
        ..Default::default()
    };

    info!("Running device simulator with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the simulator: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
