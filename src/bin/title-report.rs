//! CLI binary for title-report.
//!
//! A thin shim over the library crate that maps CLI flags to `ReportConfig`,
//! runs the pipeline, prints the report and renders the Word document.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use title_report::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MODEL_ID, DEFAULT_WATSONX_URL};
use title_report::{
    generate_report, inspect, read_outline, ProgressCallback, ReportConfig, ReportProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn truncate(msg: &str, max_chars: usize) -> String {
    match msg.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &msg[..idx]),
        None => msg.to_string(),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the pages, then the same bar reused for the chunks.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page or chunk currently in flight; the pipeline is
    /// sequential, so there is never more than one.
    started: Mutex<Option<Instant>>,
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            page_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, prefix: &'static str, unit: &str, total: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn mark_start(&self) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar("Transcribing", "pages", total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.mark_start();
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>6} chars")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&truncate(error, 80)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        if chunk_num == 1 {
            self.activate_bar("Drafting", "chunks", total_chunks);
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Drafting report in {total_chunks} chunk(s)…"))
            ));
        }
        self.mark_start();
        self.bar.set_message(format!("chunk {chunk_num}"));
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>2}/{:<2}  {:<8}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{text_len:>6} chars")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_num: usize, total: usize, error: &str) {
        self.bar.println(format!(
            "  {} Chunk {:>2}/{:<2}  {}  {}",
            red("✗"),
            chunk_num,
            total,
            red(&truncate(error, 80)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, failed_pages: usize, total_chunks: usize) {
        self.bar.finish_and_clear();
        let ok = total_pages - failed_pages;
        if failed_pages == 0 {
            eprintln!(
                "{} {} pages transcribed, {} chunk(s) drafted",
                green("✔"),
                bold(&ok.to_string()),
                total_chunks
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed ({} replaced by placeholders), {} chunk(s) drafted",
                cyan("⚠"),
                bold(&ok.to_string()),
                total_pages,
                red(&failed_pages.to_string()),
                total_chunks
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Draft a report; writes "deed AI Summary.docx" to the current directory
  title-report deed.pdf

  # Smaller chunks, output into a reports/ directory
  title-report --chunk-size 30 -o reports/ deed.pdf

  # Keep the Markdown body too, skip the Word document
  title-report --no-render --markdown-out deed.md deed.pdf

  # Draft with another provider through edgequake-llm
  title-report --provider openai --model gpt-4.1 deed.pdf

  # Page count and PDF version only (no services contacted)
  title-report --inspect-only deed.pdf

ENVIRONMENT VARIABLES:
  WATSONX_API_KEY      watsonx API key (exchanged for an IAM token)
  WATSONX_PROJECT_ID   watsonx project
  WATSONX_URL          watsonx regional endpoint
  WATSONX_MODEL_ID     model identifier
  OCR_ENDPOINT         recognition service URL (multipart upload, field "file")
  RUST_LOG             log filter, e.g. title_report=debug
"#;

/// Draft a Report on Title from scanned land-record PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "title-report",
    version,
    about = "Draft a Report on Title from scanned land-record PDFs",
    long_about = "Split a scanned land-record PDF into pages, transcribe every page with an \
OCR service, translate it to English, draft a legal Report on Title chunk by chunk with a \
hosted LLM and render it as a Word document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory the Word document is written to.
    #[arg(short, long, env = "TITLE_REPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Pages per drafting request.
    #[arg(long, env = "TITLE_REPORT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE,
          value_parser = clap::value_parser!(usize))]
    chunk_size: usize,

    /// Recognition service URL.
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// watsonx API key.
    #[arg(long, env = "WATSONX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// watsonx project identifier.
    #[arg(long, env = "WATSONX_PROJECT_ID")]
    project_id: Option<String>,

    /// watsonx regional endpoint.
    #[arg(long, env = "WATSONX_URL", default_value = DEFAULT_WATSONX_URL)]
    watsonx_url: String,

    /// Model identifier (watsonx model id, or the provider's model name).
    #[arg(long, env = "WATSONX_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Draft with an edgequake-llm provider instead of watsonx
    /// (openai, anthropic, gemini, ollama, …).
    #[arg(long, env = "TITLE_REPORT_PROVIDER")]
    provider: Option<String>,

    /// Max tokens generated per chunk.
    #[arg(long, env = "TITLE_REPORT_MAX_NEW_TOKENS", default_value_t = 8100)]
    max_new_tokens: u32,

    /// Language of the scanned records.
    #[arg(long, default_value = "kn")]
    source_lang: String,

    /// Language the pages are translated into.
    #[arg(long, default_value = "en")]
    target_lang: String,

    /// Text file replacing the built-in drafting instructions.
    #[arg(long, env = "TITLE_REPORT_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// Per-request timeout for service calls, in seconds.
    #[arg(long, env = "TITLE_REPORT_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "TITLE_REPORT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Do not render the Word document.
    #[arg(long)]
    no_render: bool,

    /// Also write the Markdown report body to this file.
    #[arg(long)]
    markdown_out: Option<PathBuf>,

    /// Output structured JSON (ReportOutput) instead of the report body.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TITLE_REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and PDF version only.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TITLE_REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TITLE_REPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback channel while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", info.file_name);
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
            println!("Size:         {} bytes", info.size_bytes);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    let mut output = generate_report(&cli.input, &config)
        .await
        .context("Report generation failed")?;

    if let Some(ref path) = cli.markdown_out {
        tokio::fs::write(path, &output.report)
            .await
            .with_context(|| format!("Failed to write Markdown to {}", path.display()))?;
    }

    if !cli.no_render {
        let path = output
            .render_once(&config.output_dir)
            .context("Failed to render the Word document")?;
        if !cli.quiet {
            let outline = read_outline(&path).context("Failed to read back the Word document")?;
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&path.display().to_string()),
                dim(&format!(
                    "{} headings, {} tables",
                    outline.headings.len(),
                    outline.tables.len()
                )),
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.report.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.report.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !show_progress {
        let s = &output.stats;
        eprintln!(
            "Transcribed {}/{} pages, drafted {} chunk(s) in {}ms",
            s.transcribed_pages, s.total_pages, s.total_chunks, s.total_duration_ms
        );
        if s.failed_pages > 0 || s.failed_chunks > 0 {
            eprintln!(
                "  {} pages and {} chunks replaced by placeholders",
                s.failed_pages, s.failed_chunks
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ReportConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .chunk_size(cli.chunk_size)
        .source_language(&cli.source_lang)
        .target_language(&cli.target_lang)
        .watsonx_url(&cli.watsonx_url)
        .model_id(&cli.model)
        .max_new_tokens(cli.max_new_tokens)
        .output_dir(&cli.output_dir)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref endpoint) = cli.ocr_endpoint {
        builder = builder.ocr_endpoint(endpoint);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref project) = cli.project_id {
        builder = builder.project_id(project);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(secs) = cli.request_timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.instruction_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
