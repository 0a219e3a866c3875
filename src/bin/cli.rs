//! CoordKV CLI Client
//!
//! Command-line interface for interacting with a CoordKV server.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use clap::{Parser, Subcommand};
use coordkv::protocol::{encode_command, Command, Request};
use coordkv::{CoordError, Result};

/// CoordKV CLI
#[derive(Parser, Debug)]
#[command(name = "coordkv-cli")]
#[command(about = "CLI for the CoordKV coordination-service emulator")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4001")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a key, or list a directory (key ending in '/')
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Seconds until the key expires
        #[arg(long)]
        ttl: Option<u64>,

        /// Require the key to exist (true) or be absent (false)
        #[arg(long)]
        prev_exist: Option<bool>,

        /// Require the key's current modified index
        #[arg(long)]
        prev_index: Option<u64>,
    },

    /// Create an auto-named entry under a directory
    Mk {
        /// The directory
        dir: String,

        /// The value to store
        value: String,

        /// Seconds until the entry expires
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Rm {
        /// The key to delete
        key: String,

        /// Require the key to exist (true) or be absent (false)
        #[arg(long)]
        prev_exist: Option<bool>,

        /// Require the key's current modified index
        #[arg(long)]
        prev_index: Option<u64>,
    },

    /// Stream changes under a prefix until interrupted
    Watch {
        /// The prefix to watch
        prefix: String,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let streaming = matches!(args.command, Commands::Watch { .. });
    let command = build_command(args.command);

    let mut stream = TcpStream::connect(&args.server)
        .map_err(|e| CoordError::Network(format!("failed to connect to {}: {}", args.server, e)))?;
    writeln!(stream, "{}", encode_command(&command))?;
    stream.flush()?;

    let reader = BufReader::new(stream);
    for line in reader.lines() {
        println!("{}", line?);
        if !streaming {
            break;
        }
    }
    Ok(())
}

fn build_command(command: Commands) -> Command {
    match command {
        Commands::Get { key } => Command::Request(Request::get(key)),
        Commands::Set {
            key,
            value,
            ttl,
            prev_exist,
            prev_index,
        } => {
            let mut request = Request::put(key, value);
            if let Some(ttl) = ttl {
                request = request.ttl(ttl);
            }
            if let Some(exists) = prev_exist {
                request = request.prev_exist(exists);
            }
            if let Some(index) = prev_index {
                request = request.prev_index(index);
            }
            Command::Request(request)
        }
        Commands::Mk { dir, value, ttl } => {
            let mut request = Request::post(dir, value);
            if let Some(ttl) = ttl {
                request = request.ttl(ttl);
            }
            Command::Request(request)
        }
        Commands::Rm {
            key,
            prev_exist,
            prev_index,
        } => {
            let mut request = Request::delete(key);
            if let Some(exists) = prev_exist {
                request = request.prev_exist(exists);
            }
            if let Some(index) = prev_index {
                request = request.prev_index(index);
            }
            Command::Request(request)
        }
        Commands::Watch { prefix } => Command::Watch { prefix },
        Commands::Ping => Command::Ping,
    }
}
