use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use newsverify_rs::server::{self, Engine};
use newsverify_rs::{Pipeline, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "newsverify", version, about = "Fact-check news articles against web evidence")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
    /// TOML settings file; environment variables override it
    #[arg(long, global = true, env = "NEWSVERIFY_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Verify one article and print the verdict as JSON
    Verify(VerifyArgs),
    /// Serve POST /verify and GET /health
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("input").required(true).args(["text", "file", "url"])))]
struct VerifyArgs {
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    url: Option<String>,
    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let pipeline = Pipeline::from_settings(settings).context("building pipeline")?;

    match cli.cmd {
        Cmd::Verify(args) => {
            let input = match (args.text, args.file, args.url) {
                (Some(text), _, _) => text,
                (_, Some(path), _) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (_, _, Some(url)) => url,
                _ => bail!("one of --text, --file or --url is required"),
            };
            let verdict = pipeline.verify_article(&input).await?;
            let out = if args.pretty { serde_json::to_string_pretty(&verdict)? } else { serde_json::to_string(&verdict)? };
            println!("{out}");
        }
        Cmd::Serve { addr } => server::run_server(Engine::new(pipeline), &addr).await?,
    }
    Ok(())
}
