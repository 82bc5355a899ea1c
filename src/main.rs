use torneira::application_port::*;
use torneira::domain_model::SignInInput;
use torneira::logger::*;
use torneira::runtime::*;
use torneira::settings::*;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(
        backend = %project_settings.identity.backend,
        session = ?project_settings.session,
        "settings loaded"
    );
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let runtime = Runtime::try_new(&project_settings)?;
    let sessions = runtime.session_service.clone();

    if let (Some(email), Some(password)) = (cli.email, cli.password) {
        match sessions.sign_in(SignInInput { email, password }).await {
            Ok(snapshot) => info!(user_id = %snapshot.identity.id, "signed in"),
            Err(SessionError::InvalidCredentials) => warn!("sign-in rejected: invalid credentials"),
            Err(e) => error!("sign-in failed: {}", e),
        }
    }

    match sessions.initialize().await {
        Ok(Some(snapshot)) => info!(
            user_id = %snapshot.identity.id,
            email = ?snapshot.identity.email,
            "session active"
        ),
        Ok(None) => info!("no active session"),
        Err(e) => error!("session lookup failed: {}", e),
    }

    signal::ctrl_c().await?;

    if let Err(e) = sessions.sign_out().await {
        warn!("sign-out failed: {}", e);
    }

    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, runtime.shutdown()).await {
        Ok(_) => info!("runtime shutdown successfully"),
        Err(_) => error!("runtime shutdown timed out"),
    }

    Ok(())
}
