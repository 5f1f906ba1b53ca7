use chrono::Utc;
use clap::{Parser, Subcommand};
use photo_search_core::{
    display_keyword, BuildOutcome, IndexConfig, IndexStore, LlmClient, LlmEndpointConfig,
    QueryResolver, RebuildRequest, Resolution, ResolverConfig, SearchConfig, SearchEngine,
    SynonymStore, UserId, DEFAULT_LLM_ENDPOINT, DEFAULT_LLM_MODEL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "photo-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the photo share to index.
    #[arg(long, env = "SHARE_PATH")]
    share_path: String,

    /// Where the keyword index is persisted.
    #[arg(long, env = "INDEX_FILE", default_value = "index.json")]
    index_file: String,

    /// Where learned synonyms are persisted.
    #[arg(long, env = "SYNONYMS_FILE", default_value = "synonyms.json")]
    synonyms_file: String,

    /// Language used to render clarification prompts.
    #[arg(long, env = "DISPLAY_LANGUAGE", default_value = "uk")]
    language: String,

    /// API key for the keyword extraction and synonym service.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_LLM_MODEL)]
    gemini_model: String,

    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_LLM_ENDPOINT)]
    gemini_endpoint: String,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the keyword index from the share.
    Index,
    /// Show the persisted index size.
    Status,
    /// Resolve a single query against the persisted index.
    Search {
        #[arg(long)]
        query: String,
        /// Skip the clarification prompt for multi-term queries.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Learn synonyms for the given terms and print their expansions.
    Synonyms {
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Interactive session with periodic index refresh.
    Chat {
        #[arg(long, default_value = "0")]
        user_id: UserId,
        #[arg(long, env = "INDEX_REFRESH_MINUTES", default_value = "10")]
        refresh_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let llm_config = cli.gemini_api_key.clone().map(|api_key| LlmEndpointConfig {
        endpoint: cli.gemini_endpoint.clone(),
        model: cli.gemini_model.clone(),
        api_key,
    });
    if llm_config.is_none() {
        warn!("GEMINI_API_KEY is not set, using local keyword matching only");
    }

    let store = Arc::new(IndexStore::new(IndexConfig::new(
        &cli.share_path,
        &cli.index_file,
    )));
    let synonyms = Arc::new(SynonymStore::new(&cli.synonyms_file));
    let resolver = QueryResolver::new(
        Arc::clone(&store),
        SearchEngine::new(Arc::clone(&synonyms), SearchConfig::default()),
        LlmClient::new(llm_config),
        ResolverConfig {
            display_language: cli.language.clone(),
            ..ResolverConfig::default()
        },
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        share = %store.config().root.display(),
        "photo-search boot"
    );

    match cli.command {
        Command::Index => match store.build().await? {
            BuildOutcome::Completed { keywords, images } => {
                println!("{keywords} keywords from {images} images");
            }
            BuildOutcome::AlreadyRunning => println!("index build already running"),
        },
        Command::Status => {
            store.load().await;
            println!("{}", resolver.index_status());
        }
        Command::Search { query, yes } => {
            store.load().await;
            synonyms.load().await;

            let mut resolution = resolver.resolve(&query, 0).await;
            if yes && matches!(&resolution, Resolution::Clarify(prompt) if !prompt.is_rephrase()) {
                resolution = resolver.resolve("yes", 0).await;
            }
            println!("{}", render(&resolution));
        }
        Command::Synonyms { terms } => {
            synonyms.load().await;
            let added = synonyms.ensure(&terms, resolver.extractor()).await?;
            info!(added, "synonym groups learned");

            for term in &terms {
                let forms = synonyms.expand(term).into_iter().collect::<Vec<_>>();
                println!(
                    "{} ({}): {}",
                    term,
                    display_keyword(term, &cli.language),
                    forms.join(", ")
                );
            }
        }
        Command::Chat {
            user_id,
            refresh_minutes,
        } => {
            store.load().await;
            synonyms.load().await;

            if synonyms.is_empty() && !store.snapshot().is_empty() {
                let tokens: Vec<String> = store.snapshot().tokens().map(str::to_string).collect();
                match synonyms.ensure(&tokens, resolver.extractor()).await {
                    Ok(added) => info!(added, "bootstrapped synonyms from index"),
                    Err(error) => error!(error = %error, "synonym bootstrap failed"),
                }
            }

            let refresh = spawn_refresh(
                Arc::clone(&store),
                Duration::from_secs(refresh_minutes.max(1) * 60),
            );
            run_session(&resolver, user_id).await?;
            refresh.abort();
        }
    }

    Ok(())
}

/// Rebuilds the index right away and then on every tick.
fn spawn_refresh(store: Arc<IndexStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match store.build().await {
                Ok(BuildOutcome::Completed { keywords, images }) => {
                    info!(keywords, images, "scheduled index refresh finished");
                }
                Ok(BuildOutcome::AlreadyRunning) => {}
                Err(error) => warn!(error = %error, "scheduled index refresh skipped"),
            }
        }
    })
}

async fn run_session(resolver: &QueryResolver<LlmClient>, user_id: UserId) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Describe what you are looking for. /indexstatus, /forceindex, /quit");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let message = line.trim();
        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/indexstatus" => println!("{}", resolver.index_status()),
            "/forceindex" => println!("{}", render_rebuild(&resolver.request_rebuild(user_id).await)),
            _ => println!("{}", render(&resolver.resolve(message, user_id).await)),
        }
    }

    Ok(())
}

fn render(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Found(report) => {
            let mut lines = Vec::new();
            for hit in &report.hits {
                lines.push(format!("[{}]", hit.keyword));
                lines.extend(hit.paths.iter().map(|path| format!("  {path}")));
            }
            if !report.too_broad.is_empty() {
                lines.push(format!(
                    "too many matches for: {}; please narrow the request",
                    report.too_broad.join(", ")
                ));
            }
            lines.join("\n")
        }
        Resolution::Clarify(prompt) => prompt.to_string(),
        Resolution::TooBroad { keywords } => format!(
            "Too many photos match {}. Please add a species, product or size.",
            keywords.join(", ")
        ),
        Resolution::NoResults {
            keywords,
            suggestions,
        } => {
            let mut message = format!("Nothing found for {}.", keywords.join(", "));
            if !suggestions.is_empty() {
                message.push_str(&format!(" Try: {}", suggestions.join(", ")));
            }
            message
        }
        Resolution::Declined => "Cancelled.".to_string(),
    }
}

fn render_rebuild(request: &RebuildRequest) -> String {
    match request {
        RebuildRequest::Started { keywords, images } => {
            format!("Index rebuilt: {keywords} keywords from {images} images.")
        }
        RebuildRequest::AlreadyRunning => "Indexing is already running.".to_string(),
        RebuildRequest::CoolingDown { remaining } => {
            format!("Please wait {} s before forcing another rebuild.", remaining.as_secs().max(1))
        }
        RebuildRequest::Failed(reason) => format!("Index rebuild failed: {reason}"),
    }
}
