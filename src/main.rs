use aad_app_exporter::config::{Config, ServerConfig};
use aad_app_exporter::{server, Exporter};
use clap::{CommandFactory, Parser};
use log::{error, info};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

/// Exit status for configuration and usage errors.
const USAGE_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "aad-app-exporter",
    version,
    about = "Azure AD Application Credential Monitor",
    long_about = "Exposes the days remaining before Azure AD application credentials expire as Prometheus metrics."
)]
struct Cli {
    /// Azure AD tenant ID
    #[arg(short = 't', long = "tenant", env = "AZURE_TENANT_ID")]
    tenant: Option<String>,

    /// Client ID for authentication
    #[arg(short = 'c', long = "client", env = "AZURE_CLIENT_ID")]
    client: Option<String>,

    /// Client secret for authentication
    #[arg(
        short = 's',
        long = "secret",
        env = "AZURE_CLIENT_SECRET",
        hide_env_values = true
    )]
    secret: Option<String>,

    /// Port to run Prometheus HTTP server [default: 5001]
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(short = 'l', long = "listen")]
    listen: Option<String>,

    /// HTTP request timeout in seconds [default: 10]
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Log one line per application with its days remaining; these lines
    /// are emitted even when RUST_LOG is stricter than info
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Path to a TOML (or .json) configuration file
    #[arg(short = 'f', long = "config")]
    config: Option<PathBuf>,

    /// Follow @odata.nextLink when the application list is paginated
    #[arg(long = "follow-next-link")]
    follow_next_link: bool,

    /// Print an example configuration file and exit
    #[arg(long = "example-config")]
    example_config: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            tenant_id: self.tenant.clone(),
            client_id: self.client.clone(),
            client_secret: self.secret.clone(),
            timeout: self.timeout,
            verbose: self.verbose.then_some(true),
            follow_next_link: self.follow_next_link.then_some(true),
            server: Some(ServerConfig {
                listen: self.listen.clone(),
                port: self.port,
            }),
            endpoints: None,
        }
    }
}

/// Lets the per-application lines through whatever `RUST_LOG` says.
fn apply_verbose(builder: &mut env_logger::Builder, verbose: bool) {
    if verbose {
        builder.filter_module(server::VERBOSE_TARGET, log::LevelFilter::Info);
    }
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}\n", message);
    eprintln!("{}", Cli::command().render_help());
    exit(USAGE_EXIT_CODE);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.example_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let mut config = Config::defaults();
    if let Some(path) = &cli.config {
        match Config::from_file(path) {
            Ok(file_config) => config = config.merge_with(file_config),
            Err(e) => usage_error(&e.to_string()),
        }
    }
    config = config.merge_with(cli.to_config());

    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => usage_error(&e.to_string()),
    };

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    apply_verbose(&mut logger, settings.verbose);
    logger.init();

    let exporter = match Exporter::new(settings) {
        Ok(exporter) => Arc::new(exporter),
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
    };

    if let Err(e) = server::serve(exporter, shutdown).await {
        error!("Server error: {}", e);
        exit(1);
    }
}
