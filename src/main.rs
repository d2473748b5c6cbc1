use clap::Parser;
use tracing_subscriber::EnvFilter;

use relnotes::config::parse_chapters;
use relnotes::{Config, GenerationConfig, GitHubClient, ReleaseNotesGenerator};

#[derive(Parser, Debug)]
#[command(name = "relnotes")]
#[command(version = "0.1.0")]
#[command(about = "Generate release notes from issues, pull requests, and commits")]
struct Args {
    /// Repository to generate notes for, as owner/name
    #[arg(short, long)]
    repository: String,

    /// Tag name of the release being published
    #[arg(short, long)]
    tag: String,

    /// Path to a JSON file with custom chapter definitions
    #[arg(short, long)]
    chapters: Option<String>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relnotes=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();
    let (owner, repo) = args
        .repository
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("repository must be given as owner/name"))?;

    // Load configuration
    let config = Config::from_env()?;
    let mut generation = GenerationConfig::from(&config);
    if let Some(ref path) = args.chapters {
        let json = std::fs::read_to_string(path)?;
        generation.chapters = parse_chapters(&json)?;
    }

    // Initialize client and run the pipeline
    let client = GitHubClient::new(&config.github_token)?;
    let generator = ReleaseNotesGenerator::new(&client, generation);

    tracing::info!("Generating release notes for {} {}", args.repository, args.tag);
    let notes = generator.generate(owner, repo, &args.tag).await?;

    // Output results; nothing is written unless generation succeeded.
    if let Some(ref path) = args.output {
        std::fs::write(path, &notes)?;
        tracing::info!("Release notes written to: {}", path);
    } else {
        println!("{}", notes);
    }

    Ok(())
}
