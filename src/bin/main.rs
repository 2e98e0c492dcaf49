use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use player_gate::{GateConfig, TrustAnchor, create_app, resolve_certificate_pem};

#[derive(Parser)]
#[command(name = "player-gate")]
#[command(about = "Player service with signed-token admission gate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the issuer certificate comes from.
#[derive(clap::Args)]
struct CertificateArgs {
    /// PEM text of the issuer certificate (`\n` escapes allowed)
    #[arg(long, env = "JWT_PUBLIC_CERT")]
    jwt_public_cert: Option<String>,
    /// Path to a PEM file holding the issuer certificate
    #[arg(long, env = "JWT_PUBLIC_CERT_FILE")]
    jwt_public_cert_file: Option<PathBuf>,
}

impl CertificateArgs {
    fn resolve(&self) -> Result<String> {
        resolve_certificate_pem(
            self.jwt_public_cert.as_deref(),
            self.jwt_public_cert_file.as_deref(),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the player HTTP server behind the admission gate
    Serve {
        /// Bind address, e.g. 0.0.0.0:9080
        #[arg(long, default_value = "0.0.0.0:9080")]
        bind: String,
        #[command(flatten)]
        certificate: CertificateArgs,
        /// Identity allowed to create any player record
        #[arg(long, env = "SYSTEM_ID")]
        system_id: Option<String>,
        /// Path fragment marking protected routes
        #[arg(long, default_value = "account")]
        protected_marker: String,
        /// Claim copied onto the request identity (repeatable; replaces the defaults)
        #[arg(long = "pass-through-claim")]
        pass_through_claims: Vec<String>,
    },
    /// Parse the configured certificate and print what the gate would trust
    CheckCert {
        #[command(flatten)]
        certificate: CertificateArgs,
    },
}

/// Directives used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "player_gate=info,tower_http=info";

/// Log filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`].
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            certificate,
            system_id,
            protected_marker,
            pass_through_claims,
        } => {
            let pem = certificate.resolve()?;

            let mut config = GateConfig {
                system_id,
                protected_marker,
                ..Default::default()
            };
            if !pass_through_claims.is_empty() {
                config.pass_through_claims = pass_through_claims;
            }
            info!(
                protected_marker = %config.protected_marker,
                pass_through = ?config.pass_through_claims,
                system_id_set = config.system_id.is_some(),
                "Gate configuration"
            );

            let (state, app) = create_app(config, pem);

            // A certificate that cannot be used is fatal at startup.
            if let Err(e) = state.gate.anchors().ensure_loaded() {
                error!("Trust anchor could not be loaded: {}", e);
                return Err(e).context("invalid JWT_PUBLIC_CERT");
            }

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {}", bind))?;
            info!("Player service listening on http://{}", bind);

            axum::serve(listener, app).await?;
        }
        Commands::CheckCert { certificate } => {
            let pem = certificate.resolve()?;
            let anchor = TrustAnchor::from_pem(&pem)?;

            println!("Subject:     {}", anchor.subject());
            println!("Fingerprint: {}", anchor.fingerprint());
            println!(
                "Algorithms:  {}",
                anchor
                    .algorithms()
                    .iter()
                    .map(|a| format!("{:?}", a))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    Ok(())
}
