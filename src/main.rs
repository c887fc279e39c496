// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ymlink::config::{parse_data_bits, parse_parity, parse_stop_bits};
use ymlink::{Config, DeviceClient, Link, LinkEvent, TransferEvent, TransferOutcome};

#[derive(Parser)]
#[command(name = "ymlink")]
#[command(about = "Upload audio files to and control a multi-channel player over RS-232", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// How long to print device replies after a command
    #[arg(long, default_value = "1000", value_name = "MS")]
    listen: u64,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file using Y-MODEM
    Send {
        /// File to send
        file: PathBuf,

        /// Announce the upload on this channel first
        #[arg(short, long)]
        channel: Option<u8>,
    },
    /// Greet the device
    Hello,
    /// List the files stored for a channel
    Ls { channel: u8 },
    /// Start playback on a channel
    Play { channel: u8, file: String },
    /// Stop playback on a channel
    Stop { channel: u8 },
    /// Print device output until the link closes
    Monitor,
}

fn init_logging(debug: bool) {
    let default = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }
}

fn build_config(cli: &Cli) -> ymlink::Result<Config> {
    let mut config = Config::new(cli.port.clone());
    config.serial.baud = cli.baud;
    config.serial.data_bits = parse_data_bits(cli.data_bits)?;
    config.serial.parity = parse_parity(&cli.parity)?;
    config.serial.stop_bits = parse_stop_bits(cli.stop_bits)?;
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Opening serial port: {}", config.serial.port);
    println!(
        "Settings: {} baud, {:?}, {:?}, {:?}",
        config.serial.baud, config.serial.data_bits, config.serial.parity, config.serial.stop_bits
    );

    let link = match Link::open(&config) {
        Ok(link) => link,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli, &config, &link) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &Config, link: &Link) -> ymlink::Result<()> {
    let client = DeviceClient::new(link);
    let listen = Duration::from_millis(cli.listen);

    match &cli.command {
        Commands::Send { file, channel } => {
            println!("\nSending file: {}", file.display());
            let handle = match channel {
                Some(channel) => client.upload(*channel, file, config.transfer.clone())?,
                None => link.start_transfer(file.clone(), config.transfer.clone())?,
            };

            let outcome = handle.wait_with(|event| match event {
                TransferEvent::Progress(percent) => {
                    print!("\rProgress: {:3}%", percent);
                    let _ = std::io::stdout().flush();
                }
                TransferEvent::Status(status) => debug!("{}", status),
                TransferEvent::Finished(_) => {}
            });
            println!();

            match outcome {
                TransferOutcome::Success { bytes } => println!("\nFile sent successfully! ({} bytes)", bytes),
                TransferOutcome::Failure(e) => return Err(e.into()),
            }
            print_replies(link, listen);
        }
        Commands::Hello => {
            client.hello()?;
            print_replies(link, listen);
        }
        Commands::Ls { channel } => {
            client.list(*channel)?;
            print_replies(link, listen);
        }
        Commands::Play { channel, file } => {
            client.play(*channel, file)?;
            print_replies(link, listen);
        }
        Commands::Stop { channel } => {
            client.stop(*channel)?;
            print_replies(link, listen);
        }
        Commands::Monitor => {
            for event in link.events().iter() {
                print_event(event);
            }
        }
    }

    Ok(())
}

fn print_replies(link: &Link, listen: Duration) {
    let deadline = Instant::now() + listen;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match link.events().recv_timeout(remaining) {
            Ok(event) => print_event(event),
            Err(_) => break,
        }
    }
}

fn print_event(event: LinkEvent) {
    match event {
        LinkEvent::Line(line) => println!("<< {}", line),
        LinkEvent::Fault(e) => eprintln!("Reception error: {}", e),
    }
}
