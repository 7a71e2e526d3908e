//! CLI binary for edgequake-postcard.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `VerificationConfig` and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_postcard::{
    verify_file, PageLoaderKind, PostcardReport, PreprocessOptions, ProgressCallback, Stage,
    VerificationConfig, VerificationProgressCallback, Verdict,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner naming the running stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Verifying");
        bar.set_message("loading screenshot…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl VerificationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar.println(format!(
            "  {} {:<16} {}",
            green("✓"),
            stage.label(),
            dim(detail)
        ));
    }

    fn on_stage_degraded(&self, stage: Stage, error: &str) {
        // Keep long provider errors on one line.
        let msg = match error.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {:<16} {}", yellow("⚠"), stage.label(), yellow(&msg)));
    }

    fn on_run_complete(&self, _total_score: f64) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Verify a screenshot (Markdown report on stdout)
  postcard tweet.png

  # Write the report to a file
  postcard tweet.png -o report.md

  # Structured JSON report
  postcard --json tweet.png > report.json

  # Screenshot from a URL, static page loading (no Chromium)
  postcard https://i.imgur.com/abc123.png --page-loader http

  # Stronger contrast for washed-out phone captures
  postcard --contrast 1.5 --brightness 1.1 photo-of-screen.jpg

  # Use a specific model
  postcard --provider anthropic --model claude-sonnet-4-20250514 post.png

SCORING:
  total = 0.4 × origin + 0.3 × temporal + 0.3 × visual

  origin    1 if the candidate URL loads, else 0 (and the other checks are skipped)
  temporal  1 if the screenshot's timestamp appears on the live page,
            0.5 if it does not, 0 if the screenshot shows no timestamp
  visual    0.9 if the live page names the screenshot's platform, else 0.4

  ≥ 0.80 CORROBORATED    ≥ 0.50 PLAUSIBLE    otherwise UNVERIFIED

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  TAVILY_API_KEY          Web search API key (required)

SETUP:
  1. Set API keys:    export OPENAI_API_KEY=sk-... TAVILY_API_KEY=tvly-...
  2. Verify:          postcard screenshot.png

  The default page loader drives a local Chromium/Chrome install. Use
  --page-loader http where no browser is available.
"#;

/// Verify social-media screenshots against the live web.
#[derive(Parser, Debug)]
#[command(
    name = "postcard",
    version,
    about = "Verify social-media screenshots against the live web",
    long_about = "Extract the text and metadata of a social-media screenshot with a Vision LLM, \
search the web for the original post, and score how well the live page corroborates the \
screenshot. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    input: String,

    /// Write the report to this file instead of stdout.
    #[arg(short, long, env = "POSTCARD_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Contrast factor around mid-grey (1.0 = unchanged).
    #[arg(long, env = "POSTCARD_CONTRAST", default_value_t = 1.2)]
    contrast: f32,

    /// Brightness factor (1.0 = unchanged).
    #[arg(long, env = "POSTCARD_BRIGHTNESS")]
    brightness: Option<f32>,

    /// Skip the unsharp mask.
    #[arg(long, env = "POSTCARD_NO_SHARPEN")]
    no_sharpen: bool,

    /// Number of search queries to generate (1–10).
    #[arg(long, env = "POSTCARD_QUERIES", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(1..=10))]
    queries: u8,

    /// How candidate pages are loaded.
    #[arg(long, env = "POSTCARD_PAGE_LOADER", value_enum, default_value = "browser")]
    page_loader: PageLoaderArg,

    /// Web search API key.
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    search_api_key: Option<String>,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "POSTCARD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "POSTCARD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "POSTCARD_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Output the structured JSON report instead of Markdown.
    #[arg(long, env = "POSTCARD_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "POSTCARD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "POSTCARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "POSTCARD_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "POSTCARD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-LLM-call timeout in seconds.
    #[arg(long, env = "POSTCARD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-search-call timeout in seconds.
    #[arg(long, env = "POSTCARD_SEARCH_TIMEOUT", default_value_t = 30)]
    search_timeout: u64,

    /// Page load timeout in seconds.
    #[arg(long, env = "POSTCARD_PAGE_TIMEOUT", default_value_t = 45)]
    page_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageLoaderArg {
    Browser,
    Http,
}

impl From<PageLoaderArg> for PageLoaderKind {
    fn from(v: PageLoaderArg) -> Self {
        match v {
            PageLoaderArg::Browser => PageLoaderKind::Browser,
            PageLoaderArg::Http => PageLoaderKind::Http,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters while it runs, so
    // INFO-level library logs are suppressed unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn VerificationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run verification ─────────────────────────────────────────────────
    let report = verify_file(&cli.input, &config)
        .await
        .context("Verification failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&report).context("Failed to serialise report")?
    } else {
        report.to_markdown()
    };

    match cli.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, rendered.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        print_summary(&report, cli.output.as_ref());
    }

    Ok(())
}

/// One-line verdict on stderr.
fn print_summary(report: &PostcardReport, output: Option<&PathBuf>) {
    let audit = &report.audit;
    let verdict = audit.verdict().to_string();
    let verdict = match audit.verdict() {
        Verdict::Corroborated => green(&verdict),
        Verdict::Plausible => yellow(&verdict),
        Verdict::Unverified => red(&verdict),
    };
    let target = output
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {}  {}{}",
        verdict,
        bold(&format!("{:.2}", audit.total_score())),
        dim(&format!("{}ms", report.stats.total_ms)),
        target
    );
}

/// Map CLI args to `VerificationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<VerificationConfig> {
    let system_prompt = match cli.system_prompt {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        ),
        None => None,
    };

    let preprocess = PreprocessOptions {
        contrast: Some(cli.contrast).filter(|c| (*c - 1.0).abs() > f32::EPSILON),
        brightness: cli.brightness,
        sharpen: !cli.no_sharpen,
    };

    let mut builder = VerificationConfig::builder()
        .preprocess(preprocess)
        .query_count(usize::from(cli.queries))
        .page_loader_kind(cli.page_loader.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .search_timeout_secs(cli.search_timeout)
        .page_timeout_secs(cli.page_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.search_api_key {
        builder = builder.search_api_key(key);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
