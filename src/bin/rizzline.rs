//! Server binary for rizzline.
//!
//! A thin shim over the library crate that maps CLI flags (each backed by
//! an environment variable) to `ServerConfig` and serves until shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use rizzline::{serve, CropHeightMode, RizzPipeline, ServerConfig};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  POST /rizzing   multipart form, file field "image"  → {"line": "..."}
  POST /reply     JSON {"text": "..."}                 → {"reply": "..."}
  GET  /health    → OK

  Callers may send their own provider key in the x-api-key header;
  otherwise DEEPSEEK_API_KEY is used.

EXAMPLES:
  # Serve on the default port with a server-side key
  DEEPSEEK_API_KEY=sk-... rizzline

  # Custom port and origins
  rizzline --port 8080 --allowed-origins https://app.example.com,http://localhost:5173

  # Try it
  curl -F image=@profile.png http://localhost:3000/rizzing
  curl -H 'content-type: application/json' -d '{"text":"hey you up?"}' http://localhost:3000/reply

ENVIRONMENT VARIABLES:
  A .env file in the working directory is loaded first, if present.
  RUST_LOG                Overrides the log filter (e.g. rizzline=debug,tower_http=debug)
"#;

#[derive(Parser, Debug)]
#[command(
    name = "rizzline",
    version,
    about = "Opening lines from dating-profile screenshots, via OCR and an LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listening port.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Listening address.
    #[arg(long, env = "RIZZ_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Fallback provider API key for requests without an x-api-key header.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Comma-separated browser origins allowed to call the API.
    #[arg(long, env = "RIZZ_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Option<Vec<String>>,

    /// Base URL of the OpenAI-compatible provider.
    #[arg(long, env = "RIZZ_LLM_BASE_URL", default_value = "https://api.deepseek.com")]
    llm_base_url: String,

    /// Chat model identifier.
    #[arg(long, env = "RIZZ_MODEL", default_value = "deepseek-chat")]
    model: String,

    /// Per-completion timeout in seconds.
    #[arg(long, env = "RIZZ_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// OCR timeout in seconds.
    #[arg(long, env = "RIZZ_OCR_TIMEOUT", default_value_t = 30)]
    ocr_timeout: u64,

    /// Tesseract language code.
    #[arg(long, env = "RIZZ_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: String,

    /// Directory for per-request temporary files.
    #[arg(long, env = "RIZZ_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "RIZZ_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Height of the extracted crop region.
    #[arg(long, env = "RIZZ_CROP_HEIGHT", value_enum, default_value = "independent")]
    crop_height: CropHeightArg,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RIZZ_VERBOSE")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, env = "RIZZ_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CropHeightArg {
    /// Use the independently computed crop height.
    Independent,
    /// Legacy square crop: height equals the crop width.
    MirrorWidth,
}

impl From<CropHeightArg> for CropHeightMode {
    fn from(v: CropHeightArg) -> Self {
        match v {
            CropHeightArg::Independent => CropHeightMode::Independent,
            CropHeightArg::MirrorWidth => CropHeightMode::MirrorWidth,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder()
            .port(self.port)
            .bind_addr(self.bind)
            .llm_base_url(self.llm_base_url)
            .model(self.model)
            .api_timeout_secs(self.api_timeout)
            .ocr_timeout_secs(self.ocr_timeout)
            .ocr_language(self.ocr_lang)
            .tesseract_cmd(self.tesseract_cmd)
            .upload_dir(self.upload_dir)
            .max_upload_bytes(self.max_upload_bytes)
            .crop_height_mode(self.crop_height.into());
        if let Some(key) = self.api_key {
            builder = builder.default_api_key(key);
        }
        if let Some(origins) = self.allowed_origins {
            builder = builder.allowed_origins(origins);
        }
        builder.build().context("Invalid server configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before parsing so env-backed flags see it.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let config = cli.into_config()?;
    if config.default_api_key.is_none() {
        info!("No DEEPSEEK_API_KEY configured; every request must send x-api-key");
    }
    info!("Starting with {:?}", config);

    let pipeline = RizzPipeline::from_config(config).context("Failed to initialise pipeline")?;
    serve(pipeline).await.context("Server error")?;
    Ok(())
}
