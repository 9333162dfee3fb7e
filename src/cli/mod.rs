use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::llm::TextGenerator;
use crate::core::llm::openai::OpenAiGenerator;
use crate::core::scheduler::AgentScheduler;
use crate::core::social::SocialClient;
use crate::core::social::x::XApiClient;
use crate::core::store::AgentStore;
use crate::interfaces::web::ApiServer;

const DEFAULT_API_PORT: u16 = 4000;

fn print_help() {
    println!("{}", style("roost - multi-agent social posting daemon").bold());
    println!();
    println!(" {}", style("Commands").bold());
    println!("   {}   Run the scheduler and operator API (default)", style("serve").green());
    println!("   {}  List agents and their eligibility", style("agents").green());
    println!("   {}    Show this help", style("help").green());
    println!();
    println!(" {}", style("Flags").bold());
    println!("   --api-port <N>     Operator API port (default {})", DEFAULT_API_PORT);
    println!("   --data-dir <PATH>  Where agents.db lives");
    println!();
    println!(
        " {} {} <command> [flags]",
        style("Usage:").bold(),
        style("roost").green()
    );
}

struct Flags {
    api_port: u16,
    data_dir: Option<PathBuf>,
}

fn parse_flags(args: &[String], start: usize) -> Flags {
    let mut flags = Flags {
        api_port: DEFAULT_API_PORT,
        data_dir: None,
    };
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    flags.api_port = args[i + 1].parse().unwrap_or(DEFAULT_API_PORT);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--data-dir" => {
                if i + 1 < args.len() {
                    flags.data_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    flags
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roost")
    })
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("help") | Some("--help") | Some("-h") => {
            print_help();
            Ok(())
        }
        Some("agents") => list_agents(parse_flags(&args, 2)).await,
        Some("serve") => serve(parse_flags(&args, 2)).await,
        None => serve(parse_flags(&args, 1)).await,
        Some(other) if other.starts_with("--") => serve(parse_flags(&args, 1)).await,
        Some(other) => {
            println!("Unknown command: {}", style(other).red());
            print_help();
            Ok(())
        }
    }
}

async fn open_store(flags: &Flags) -> Result<Arc<AgentStore>> {
    let dir = resolve_data_dir(flags.data_dir.clone());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating data dir {}", dir.display()))?;
    Ok(Arc::new(AgentStore::open(dir.join("agents.db"))?))
}

async fn serve(flags: Flags) -> Result<()> {
    crate::logging::init();

    let store = open_store(&flags).await?;
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new());
    let x_client = Arc::new(XApiClient::new());
    let social: Arc<dyn SocialClient> = x_client.clone();

    let scheduler = AgentScheduler::new(store.clone(), generator, social);
    scheduler.reschedule_all().await?;

    ApiServer::new(store, scheduler, x_client, flags.api_port)
        .serve("127.0.0.1")
        .await
}

async fn list_agents(flags: Flags) -> Result<()> {
    let store = open_store(&flags).await?;
    let agents = store.list_agents().await?;
    if agents.is_empty() {
        println!("No agents yet. Create one via POST /api/agents.");
        return Ok(());
    }

    for agent in agents {
        let status = if agent.paused {
            style("paused").yellow()
        } else if agent.is_eligible() {
            style("active").green()
        } else {
            style("incomplete").red()
        };
        let handle = agent.account_handle.as_deref().unwrap_or("-");
        println!(
            "{}  {}  @{}  {}  [{}]",
            style(&agent.id).dim(),
            if agent.name.is_empty() {
                "(unnamed)"
            } else {
                agent.name.as_str()
            },
            handle,
            agent.schedule_mode.as_str(),
            status
        );
    }
    Ok(())
}
