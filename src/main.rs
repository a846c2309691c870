use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use gallery_server::auth::{generate_signing_key_pem, hash_secret, Subject};
use gallery_server::config::{generate_config_template, Config};
use gallery_server::gallery::{
    Gallery, ImageDeleteRequest, ImageListRequest, ImageMetadata, ImageUploadRequest, ViewRequest,
};

/// Gallery server operator tool
#[derive(Parser, Debug)]
#[command(name = "gallery-server", version, about = "Tiered image storage operator tool")]
struct Cli {
    /// Path to TOML config file
    #[arg(long, env = "GALLERY_CONFIG", default_value = "./gallery.toml")]
    config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "GALLERY_JSON_LOGS")]
    json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    generate_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a new P-256 signing key as PEM
    GenerateKey,

    /// Print the configured hash for a shared secret
    HashSecret {
        secret: String,
        #[arg(long, default_value = "")]
        salt: String,
    },

    /// Print a fresh admin token
    IssueToken {
        /// Validity in seconds (default: auth.admin_token_validity_secs)
        #[arg(long)]
        validity_secs: Option<i64>,
    },

    /// List images visible from a tier as JSON
    List {
        access_type: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Upload a local file
    Upload {
        access_type: String,
        path: PathBuf,
        /// Stored file name (default: the local file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Write an image's content to a file or stdout
    View {
        access_type: String,
        file_name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete an image and its tag links
    Delete {
        access_type: String,
        file_name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let config = Config::load(&cli.config)?;

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gallery_server=info"));
    if cli.json_logs || config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let Some(command) = cli.command else {
        tracing::info!("No command given, checking configuration");
        let gallery = Gallery::from_config(&config)?;
        tracing::info!("Configuration OK: {:?}", gallery);
        return Ok(());
    };

    match command {
        Command::GenerateKey => print!("{}", generate_signing_key_pem()?),
        Command::HashSecret { secret, salt } => println!("{}", hash_secret(&secret, &salt)),
        Command::IssueToken { validity_secs } => {
            let gallery = Gallery::from_config(&config)?;
            let validity =
                seconds(validity_secs.unwrap_or(config.auth.admin_token_validity_secs))?;
            println!("{}", gallery.tokens().issue(&Subject::Admin, validity)?);
        }
        Command::List {
            access_type,
            page,
            tags,
        } => {
            let gallery = Gallery::from_config(&config)?;
            let token = admin_token(&gallery, &config)?;
            let listing = gallery.list(&ImageListRequest {
                token,
                access_type,
                page,
                tags,
            })?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Upload {
            access_type,
            path,
            name,
            tags,
        } => {
            let gallery = Gallery::from_config(&config)?;
            let file_name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or("upload path has no usable file name")?
                    .to_string(),
            };
            let payload = STANDARD.encode(std::fs::read(&path)?);
            let checksum = hex::encode(Sha256::digest(payload.as_bytes()));
            gallery.upload(&ImageUploadRequest {
                token: admin_token(&gallery, &config)?,
                metadata: ImageMetadata {
                    file_name,
                    tags,
                    ..Default::default()
                },
                payload,
                checksum,
                access_type,
            })?;
        }
        Command::View {
            access_type,
            file_name,
            out,
        } => {
            let gallery = Gallery::from_config(&config)?;
            let image = gallery.view(&ViewRequest {
                token: admin_token(&gallery, &config)?,
                access_type,
                file_name,
            })?;
            match out {
                Some(out) => std::fs::write(out, &image.bytes)?,
                None => std::io::Write::write_all(&mut std::io::stdout(), &image.bytes)?,
            }
        }
        Command::Delete {
            access_type,
            file_name,
        } => {
            let gallery = Gallery::from_config(&config)?;
            gallery.delete(&ImageDeleteRequest {
                token: admin_token(&gallery, &config)?,
                file_name,
                access_type,
            })?;
        }
    }

    Ok(())
}

/// Operator commands act as admin; they hold the signing key already.
fn admin_token(gallery: &Gallery, config: &Config) -> Result<String, Box<dyn std::error::Error>> {
    let validity = seconds(config.auth.admin_token_validity_secs)?;
    Ok(gallery.tokens().issue(&Subject::Admin, validity)?)
}

fn seconds(secs: i64) -> Result<chrono::Duration, Box<dyn std::error::Error>> {
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| format!("validity of {secs}s is out of range").into())
}
