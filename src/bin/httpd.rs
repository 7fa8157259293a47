use {
    clap::Parser,
    std::path::PathBuf,
    stoichiometric_core::{
        config::{AppConfig, Environment},
        decoder::ProcessDecoder,
        httpd::{context::Context, error::Error, server::run_server},
    },
    tracing_subscriber::EnvFilter,
};

#[derive(Parser)]
#[command(about = "Serves /decode_loan on top of the loan decoder binary")]
pub struct Cli {
    /// Config file layered over the environment preset
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Environment::Development)]
    env: Environment,

    #[arg(long)]
    ip: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Overrides the decoder binary path
    #[arg(long)]
    decoder: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = AppConfig::load(cli.env, cli.config.as_deref())?;
    if let Some(ip) = cli.ip {
        config.server.ip = ip;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(decoder) = cli.decoder {
        config.decoder.binary = decoder;
    }
    config.validate()?;

    tracing::info!(binary = %config.decoder.binary.display(), "using loan decoder");

    let decoder = ProcessDecoder::new(config.decoder.binary.clone(), config.decoder.timeout());
    run_server(&config.server, Context::new(decoder)).await?;

    Ok(())
}
