use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use markov4::config::DEFAULT_PROGRESS_INTERVAL;
use markov4::{
    archive, Corpus, GeneratorConfig, ImportConfig, IngestOutcome, Message,
    RetrainConfig, StoreConfig,
};
use rustc_hash::FxHashSet;
use serde_json::json;

const DEFAULT_DB: &str = "markov4.sqlite3";

#[derive(Parser, Debug)]
#[command(author, version, about = "Fourth-order Markov chain toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    /// Corpus database file
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_DB)]
    db: PathBuf,

    /// Use rollback journaling instead of write-ahead logging
    #[arg(long, global = true)]
    no_wal: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Archive one message and train on it
    Ingest(IngestArgs),
    /// Remove a message and its corpus entries
    Forget(ForgetArgs),
    /// Generate a sentence
    Generate(GenerateArgs),
    /// Archive messages from JSON-lines exports
    Import(ImportArgs),
    /// Rebuild the corpus from the message archive
    Retrain(RetrainArgs),
    /// Show archive and corpus sizes
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Message id
    #[arg(long)]
    id: String,

    /// Author id
    #[arg(long)]
    author: String,

    /// Mark the author as an automated account (archived, not trained)
    #[arg(long)]
    bot: bool,

    /// Message text
    text: String,
}

#[derive(Args, Debug)]
struct ForgetArgs {
    /// Message id
    id: String,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Text to start the sentence with
    #[arg(default_value = "")]
    prompt: String,

    /// Imitate a single author
    #[arg(long, value_name = "ID")]
    author: Option<String>,

    /// Seed the sampler for reproducible output
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Token cap before generation is aborted as runaway
    #[arg(long, value_name = "COUNT")]
    max_tokens: Option<usize>,

    /// Emit a JSON object instead of plain text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Files or directories containing JSON-lines message exports
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,

    /// Rebuild the corpus after importing, excluding bot authors
    #[arg(long)]
    retrain: bool,
}

#[derive(Args, Debug)]
struct RetrainArgs {
    /// Author ids to leave out of the rebuilt corpus (repeat flag)
    #[arg(long = "exclude", value_name = "ID")]
    exclude: Vec<String>,

    /// Also exclude every author with archived messages flagged as bot
    #[arg(long)]
    exclude_bots: bool,

    /// Skip VACUUM after the rebuild
    #[arg(long)]
    no_vacuum: bool,

    /// Messages between progress updates
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: usize,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let store_cfg = StoreConfig::builder().wal(!cli.no_wal).build();
    let mut corpus = Corpus::open(&cli.db, store_cfg)
        .with_context(|| format!("failed to open corpus {}", cli.db.display()))?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(&mut corpus, args),
        Commands::Forget(args) => run_forget(&mut corpus, args),
        Commands::Generate(args) => run_generate(&corpus, args),
        Commands::Import(args) => run_import(&mut corpus, args),
        Commands::Retrain(args) => run_retrain(&corpus, args),
        Commands::Stats(args) => run_stats(&corpus, args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_ingest(corpus: &mut Corpus, args: IngestArgs) -> Result<()> {
    let mut message = Message::new(args.id, args.author, args.text);
    if args.bot {
        message = message.sent_by_bot();
    }
    match corpus.train_on_message(&message)? {
        IngestOutcome::Trained { entries } => {
            println!("trained on message {} ({entries} entries)", message.id);
        }
        IngestOutcome::ArchivedOnly => {
            println!("archived bot message {} without training", message.id);
        }
        IngestOutcome::Duplicate => println!("message {} was already archived", message.id),
    }
    Ok(())
}

fn run_forget(corpus: &mut Corpus, args: ForgetArgs) -> Result<()> {
    let removed = corpus.forget_message(&args.id)?;
    println!("forgot message {} ({removed} entries removed)", args.id);
    Ok(())
}

fn run_generate(corpus: &Corpus, args: GenerateArgs) -> Result<()> {
    let mut cfg = GeneratorConfig::builder().seed(args.seed);
    if let Some(max_tokens) = args.max_tokens {
        cfg = cfg.max_tokens(max_tokens);
    }
    let cfg = cfg.build()?;

    let sentence = match corpus.generate_with_config(&args.prompt, args.author.as_deref(), &cfg)
    {
        Ok(sentence) => sentence,
        Err(err) if err.is_generation_failure() => bail!("unable to generate: {err}"),
        Err(err) => return Err(anyhow::Error::new(err).context("generation failed")),
    };

    if args.json {
        let record = json!({
            "prompt": args.prompt,
            "author": args.author,
            "text": sentence,
        });
        println!("{}", serde_json::to_string(&record)?);
    } else if sentence.is_empty() {
        warn!("unable to generate a sentence for the requested author");
    } else {
        println!("{sentence}");
    }
    Ok(())
}

fn run_import(corpus: &mut Corpus, args: ImportArgs) -> Result<()> {
    let cfg = ImportConfig {
        recursive: !args.no_recursive,
        follow_symlinks: args.follow_symlinks,
    };
    let messages = archive::load_archive(&args.inputs, &cfg)
        .with_context(|| "failed to load message archive")?;
    let summary = corpus.import(&messages)?;
    drop(messages);
    println!(
        "imported {} new messages ({} seen)",
        summary.inserted, summary.seen
    );

    if args.retrain {
        let excluded = corpus.bot_author_ids()?;
        let report = corpus
            .retrain(excluded, RetrainConfig::default())?
            .wait(|_| {})
            .context("retraining after import failed")?;
        println!(
            "retrained on {} messages ({} entries)",
            report.messages_trained, report.entries_written
        );
    }
    Ok(())
}

fn run_retrain(corpus: &Corpus, args: RetrainArgs) -> Result<()> {
    let cfg = RetrainConfig::builder()
        .progress_interval(args.progress_interval)
        .vacuum(!args.no_vacuum)
        .build()?;

    let mut excluded: FxHashSet<String> = args.exclude.into_iter().collect();
    if args.exclude_bots {
        excluded.extend(corpus.bot_author_ids()?);
    }

    info!("dispatching retrain worker");
    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.set_message("retraining...");
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let handle = corpus.retrain(excluded, cfg)?;
    let report = handle.wait(|count| {
        if let Some(pb) = &spinner {
            pb.set_message(format!("processed {count} messages..."));
        }
    });
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = report.context("retraining failed; previous corpus left intact")?;

    info!("retrain worker exited after {:.2?}", start.elapsed());
    println!(
        "✅ model retrained; processed {} messages ({} excluded), wrote {} entries",
        report.messages_trained, report.messages_excluded, report.entries_written
    );
    Ok(())
}

fn run_stats(corpus: &Corpus, args: StatsArgs) -> Result<()> {
    let stats = corpus.stats()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        let location = corpus
            .path()
            .map_or_else(|| "(memory)".to_string(), |path| path.display().to_string());
        println!("Database : {location}");
        println!("Messages : {}", stats.messages);
        println!("Entries  : {}", stats.entries);
    }
    Ok(())
}
