use rocket_oidc_rp::{OIDCConfig, setup};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "oidc-rp", about = "Keycloak OpenID Connect relying party")]
pub struct Args {
    /// dotenv file to load before reading the configuration
    #[structopt(long, parse(from_os_str), default_value = ".env")]
    env_file: PathBuf,
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::from_args();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rocket_oidc_rp=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // variables already set in the environment take precedence
    match dotenvy::from_path(&args.env_file) {
        Ok(()) => tracing::debug!(path = %args.env_file.display(), "loaded env file"),
        Err(err) => tracing::warn!(
            path = %args.env_file.display(),
            error = %err,
            "env file not loaded, using the process environment only"
        ),
    }

    let config = OIDCConfig::from_env()?;
    let rocket = setup(rocket::build(), config)?;

    if let Err(err) = rocket.launch().await {
        tracing::error!(error = %err, "server stopped with an error");
        return Err(err.to_string().into());
    }
    Ok(())
}
