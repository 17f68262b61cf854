//! CLI client for the `wikiforged` HTTP surface (§6), in the same
//! `wikiforged`/`wikiforge` daemon-and-client split the teacher's
//! `neurosiphon`/`neurosiphon mcp` subcommand split followed, but as two
//! separate binaries rather than one binary with a subcommand.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "wikiforge")]
#[command(version)]
#[command(about = "CLI client for the wikiforged repository-analysis service")]
struct Cli {
    /// Base URL of a running wikiforged instance.
    #[arg(long, env = "WIKIFORGE_API", default_value = "http://127.0.0.1:8080")]
    api: String,

    /// Caller identity forwarded as `x-caller-id` (see AccessControl).
    #[arg(long, env = "WIKIFORGE_CALLER", default_value = "anonymous")]
    caller: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a repository for analysis (`POST /repository`).
    Register {
        organization: String,
        name: String,
        address: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
    },
    /// List registered repositories (`GET /repository`).
    List {
        #[arg(long, default_value_t = 0)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        page_size: i64,
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Show one repository's current status (`GET /repository/{id}`).
    Show { id: Uuid },
    /// Re-queue a repository from PENDING (`POST /repository/{id}/reset`).
    Reset { id: Uuid },
    /// Delete a repository and its generated content (`DELETE /repository/{id}`).
    Delete { id: Uuid },
    /// Download the generated markdown as a zip (`GET /export/{id}`).
    Export {
        id: Uuid,
        #[arg(long, default_value = "export.zip")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.cmd {
        Command::Register { organization, name, address, branch, username, token, prompt } => {
            let body = json!({
                "organization": organization,
                "name": name,
                "address": address,
                "branch": branch,
                "username": username,
                "token": token,
                "prompt": prompt,
            });
            let resp = client
                .post(format!("{}/repository", cli.api))
                .header("x-caller-id", &cli.caller)
                .json(&body)
                .send()
                .await?;
            print_response(resp).await
        }
        Command::List { page, page_size, keyword } => {
            let mut req = client
                .get(format!("{}/repository", cli.api))
                .header("x-caller-id", &cli.caller)
                .query(&[("page", page.to_string()), ("page_size", page_size.to_string())]);
            if let Some(k) = keyword {
                req = req.query(&[("keyword", k)]);
            }
            print_response(req.send().await?).await
        }
        Command::Show { id } => {
            let resp = client
                .get(format!("{}/repository/{id}", cli.api))
                .header("x-caller-id", &cli.caller)
                .send()
                .await?;
            print_response(resp).await
        }
        Command::Reset { id } => {
            let resp = client
                .post(format!("{}/repository/{id}/reset", cli.api))
                .header("x-caller-id", &cli.caller)
                .send()
                .await?;
            print_response(resp).await
        }
        Command::Delete { id } => {
            let resp = client
                .delete(format!("{}/repository/{id}", cli.api))
                .header("x-caller-id", &cli.caller)
                .send()
                .await?;
            print_response(resp).await
        }
        Command::Export { id, output } => {
            let resp = client
                .get(format!("{}/export/{id}", cli.api))
                .header("x-caller-id", &cli.caller)
                .send()
                .await?
                .error_for_status()?;
            let bytes = resp.bytes().await?;
            std::fs::write(&output, &bytes)?;
            println!("wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn print_response(resp: reqwest::Response) -> anyhow::Result<()> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        println!("{text}");
    } else {
        eprintln!("{status}: {text}");
        std::process::exit(1);
    }
    Ok(())
}
