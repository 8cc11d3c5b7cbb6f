use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use ivrflow::{
    config::{Cli, Command, Config},
    flow::flow_config::FlowFile,
    handler::{CallHandler, CallTurn},
    store::InMemorySessionStore,
    version, IvrEngine,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn print_turn(turn: &CallTurn) {
    println!("[{}]", turn.state);
    for prompt in &turn.prompts {
        println!("  < {}", prompt);
    }
    if !turn.is_final() {
        let keys: Vec<&str> = turn.accepted_keys.keys().map(|k| k.as_str()).collect();
        println!("  keys: {}", keys.join(" "));
    }
}

async fn simulate(config: &Config, flow: FlowFile, call: Option<String>, digits: Vec<String>) -> Result<()> {
    let definition = flow.definition()?;
    config.check_flow(&definition)?;
    let engine = IvrEngine::<Value>::new(Arc::new(definition), Arc::new(flow.callbacks()))
        .with_step_limit(config.step_limit);
    let mut handler = CallHandler::new(engine, Arc::new(InMemorySessionStore::new()));
    if let Some(fallback) = &config.fallback_state {
        handler = handler.with_fallback_state(fallback.clone())?;
    }

    let call_guid = call.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(call = %call_guid, flow = %flow.flow.name, "simulating call");

    let mut turn = handler.handle(&call_guid, None).await?;
    print_turn(&turn);
    for pressed in digits {
        if turn.is_final() {
            break;
        }
        println!("  > {}", pressed);
        turn = handler.handle(&call_guid, Some(&pressed)).await?;
        print_turn(&turn);
    }
    handler.hangup(&call_guid).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.conf.as_deref() {
        Some(path) if std::path::Path::new(path).exists() => Config::load(path)?,
        _ => Config::default(),
    };
    config.validate()?;

    let mut env_filter = EnvFilter::from_default_env();
    if let Some(Ok(level)) = config
        .log_level
        .as_ref()
        .map(|level| level.parse::<LevelFilter>())
    {
        env_filter = env_filter.add_directive(level.into());
    }

    let mut file_layer = None;
    let mut fmt_layer = None;
    let mut _guard = None;
    if let Some(ref log_file) = config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| anyhow::anyhow!("{}: {}", e, log_file))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        _guard = Some(guard);
        file_layer = Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        );
    } else {
        fmt_layer = Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    }
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(fmt_layer)
        .try_init()
        .ok();

    info!(version = %version::get_short_version(), flow = %config.flow, "ivrflow starting");
    let flow = FlowFile::from_file(&config.flow)?;

    match cli.command {
        Some(Command::CheckConfig) | None => {
            let definition = flow.definition()?;
            config.check_flow(&definition)?;
            println!("{}", version::get_version_info());
            println!(
                "Flow '{}' is valid: {} states, starting at '{}'",
                definition.name(),
                definition.states().count(),
                definition.initial_state().name
            );
            Ok(())
        }
        Some(Command::Simulate { call, digits }) => simulate(&config, flow, call, digits).await,
    }
}
