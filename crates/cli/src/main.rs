use clap::{Parser, Subcommand};
use share_core::{config_from_env, GatewayService, NewArea};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sharegw")]
#[command(about = "Remote share gateway operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered areas
    Areas,
    /// Register an area
    AddArea {
        /// Folder on the share; the area id is derived from it
        folder: String,
        /// Display name
        name: String,
        #[arg(long)]
        icon: Option<String>,
        /// Credential user for the area login check
        #[arg(long)]
        user: Option<String>,
        /// Credential secret for the area login check
        #[arg(long)]
        secret: Option<String>,
    },
    /// Print the share address of a path inside an area
    Resolve {
        area: String,
        #[arg(default_value = "")]
        subpath: String,
    },
    /// List a directory inside an area
    Ls {
        area: String,
        #[arg(default_value = "")]
        subpath: String,
    },
    /// Create a folder inside an area
    Mkdir {
        area: String,
        name: String,
        /// Parent directory inside the area
        #[arg(long, default_value = "")]
        path: String,
        /// User recorded in the audit log
        #[arg(long, default_value = "sharegw")]
        user: String,
    },
    /// Show the most recent audit entries
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let gateway = GatewayService::new(Arc::new(config_from_env()?));

    match cli.command {
        Some(Commands::Areas) => {
            for area in gateway.areas().await? {
                println!(
                    "{} {:<16} {:<32} -> {}{}",
                    area.icon,
                    area.id,
                    area.name,
                    area.folder,
                    if area.has_credentials() { " (credentials)" } else { "" }
                );
            }
        }
        Some(Commands::AddArea {
            folder,
            name,
            icon,
            user,
            secret,
        }) => {
            let area = NewArea {
                folder_name: folder,
                display_name: name,
                icon,
                credential_user: user,
                credential_secret: secret,
            };
            match gateway.create_area(area, "sharegw").await {
                Ok((id, share_core::AreaSaveOutcome::Created)) => println!("Created area: {}", id),
                Ok((id, share_core::AreaSaveOutcome::AlreadyExists)) => {
                    println!("Area already exists: {}", id)
                }
                Err(e) => eprintln!("Error creating area: {}", e),
            }
        }
        Some(Commands::Resolve { area, subpath }) => {
            match gateway.resolve_path(&area, &subpath).await {
                Ok(address) => println!("{}", address),
                Err(e) => eprintln!("Error resolving path: {}", e),
            }
        }
        Some(Commands::Ls { area, subpath }) => match gateway.list(&area, &subpath).await {
            Ok(entries) if entries.is_empty() => println!("Empty directory."),
            Ok(entries) => {
                for entry in entries {
                    println!(
                        "{:<7} {:>12} {:<10} {}",
                        entry.kind, entry.size, entry.date, entry.name
                    );
                }
            }
            Err(e) => eprintln!("Error listing directory: {}", e),
        },
        Some(Commands::Mkdir {
            area,
            name,
            path,
            user,
        }) => match gateway.create_folder(&area, &path, &name, &user).await {
            Ok(()) => println!("Created folder: {}", name),
            Err(e) => eprintln!("Error creating folder: {}", e),
        },
        Some(Commands::Audit { limit }) => {
            let entries = gateway.audit_log().read_all().await?;
            if entries.is_empty() {
                println!("No audit entries.");
            }
            for entry in entries.into_iter().take(limit) {
                println!(
                    "{} {:<14} {:<16} {:<12} {}",
                    entry.time.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.area,
                    entry.user,
                    entry.detail
                );
            }
        }
        None => {
            println!("Use 'sharegw --help' for commands");
        }
    }

    Ok(())
}
