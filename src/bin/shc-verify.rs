use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shc_verifier::jws::decode_header;
use shc_verifier::{
    decode, Barcode, HealthCard, HttpKeySetFetcher, KeySet, KeyStore, ScanReport, Scanner,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shc-verify")]
#[command(about = "Decode and verify SMART Health Card QR payloads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a scanned shc:/ string into its JWS without verifying it
    Decode {
        /// The scanned text, starting with shc:/
        scan: String,
    },
    /// Verify a single scanned shc:/ string
    Verify {
        /// The scanned text, starting with shc:/
        scan: String,

        #[command(flatten)]
        keys: KeyOptions,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Verify scans read line by line from stdin, refreshing keys in the background
    Watch {
        #[command(flatten)]
        keys: KeyOptions,

        /// Output results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct KeyOptions {
    /// Remote JWKS endpoint used to refresh issuer keys
    #[arg(long, env = "SHC_JWKS_URL")]
    jwks_url: Option<String>,

    /// Local JWKS file that replaces the bundled fallback keys
    #[arg(long, env = "SHC_JWKS_FILE")]
    jwks_file: Option<PathBuf>,

    /// Timeout for the JWKS fetch, in seconds
    #[arg(long, env = "SHC_JWKS_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Barcode type label carried into the report
    #[arg(long, default_value = "qr")]
    format: String,
}

impl KeyOptions {
    fn key_store(&self) -> Result<KeyStore> {
        match &self.jwks_file {
            Some(path) => Ok(KeyStore::with_fallback(load_jwks_file(path)?)),
            None => KeyStore::embedded().context("Bundled key set is invalid"),
        }
    }

    fn fetcher(&self) -> Result<Option<HttpKeySetFetcher>> {
        self.jwks_url
            .as_ref()
            .map(|url| {
                HttpKeySetFetcher::new(url.as_str(), Duration::from_secs(self.timeout_secs))
                    .context("Failed to build HTTP client")
            })
            .transpose()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { scan } => decode_command(&scan),
        Commands::Verify { scan, keys, json } => verify_command(&scan, &keys, json),
        Commands::Watch { keys, json } => watch_command(&keys, json),
    }
}

fn load_jwks_file(path: &Path) -> Result<KeySet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JWKS file {}", path.display()))?;
    KeySet::from_json(&contents)
        .with_context(|| format!("Failed to parse JWKS file {}", path.display()))
}

fn decode_command(scan: &str) -> Result<()> {
    let token = decode(scan).context("Failed to decode scan")?;

    match decode_header(&token) {
        Ok(header) => {
            eprintln!("[OK] Header decoded");
            eprintln!("  Algorithm: {}", header.alg);
            eprintln!("  Key ID:    {}", header.kid.as_deref().unwrap_or("N/A"));
            eprintln!("  Zip:       {}", header.zip.as_deref().unwrap_or("N/A"));
        }
        Err(e) => eprintln!("[FAILED] Header: {}", e),
    }

    println!("{}", token);
    Ok(())
}

fn verify_command(scan: &str, options: &KeyOptions, json_output: bool) -> Result<()> {
    let store = Arc::new(options.key_store()?);

    // A one-shot verification waits for the refresh; failure falls back to current keys.
    if let Some(fetcher) = options.fetcher()? {
        if let Err(e) = store.refresh(&fetcher) {
            eprintln!("[WARN] Key refresh failed, using current keys: {}", e);
        }
    }

    let scanner = Scanner::new(store);
    let barcode = Barcode {
        format: options.format.clone(),
        data: scan.to_string(),
    };
    let report = scanner
        .handle(&barcode)
        .context("Scan was superseded")?;

    print_report(&report, json_output)?;

    if report.outcome.is_verified() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Verification failed"))
    }
}

fn watch_command(options: &KeyOptions, json_output: bool) -> Result<()> {
    let store = Arc::new(options.key_store()?);

    if let Some(fetcher) = options.fetcher()? {
        store.spawn_refresh(Arc::new(fetcher));
    }

    let scanner = Scanner::new(store);
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let data = line.trim();
        if data.is_empty() {
            continue;
        }

        let barcode = Barcode {
            format: options.format.clone(),
            data: data.to_string(),
        };
        if let Some(report) = scanner.handle(&barcode) {
            print_report(&report, json_output)?;
        }
    }

    Ok(())
}

fn print_report(report: &ScanReport, json_output: bool) -> Result<()> {
    if json_output {
        let json = serde_json::to_string(report).context("Failed to serialize result")?;
        println!("{}", json);
        return Ok(());
    }

    match report.outcome.payload_text() {
        Some(text) => {
            println!("[OK] {} ({})", report.outcome.user_message(), report.format);
            match HealthCard::from_payload(text) {
                Ok(card) => {
                    println!("  Issuer:       {}", card.issuer);
                    if let Some(nbf) = card.not_before {
                        println!("  Not Before:   {}", nbf);
                    }
                    println!("  Types:        {}", card.types.join(", "));
                    if !card.is_health_card() {
                        println!("  [WARN] Payload is not typed as a SMART Health Card");
                    }
                    if let Some(version) = &card.fhir_version {
                        println!("  FHIR Version: {}", version);
                    }
                    println!("  Entries:      {}", card.entry_count);
                }
                Err(_) => println!("  Payload:      {}", text),
            }
        }
        None => {
            println!("[FAILED] {} ({})", report.outcome.user_message(), report.format);
            if let shc_verifier::VerificationOutcome::Failed { message, .. } = &report.outcome {
                println!("  {}", message);
            }
        }
    }

    Ok(())
}
