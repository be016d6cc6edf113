use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn, Level};

use queue_provisioner::broker::Broker;
use queue_provisioner::config::Settings;
use queue_provisioner::logging;
use queue_provisioner::reconcile::reconcile;
use queue_provisioner::report::RunSummary;

/// Ensure a RabbitMQ broker carries the queues described by a YAML file.
#[derive(Parser, Debug)]
struct Opts {
    /// Path to the queue topology file
    #[clap(env = "PROVISION_CONFIG")]
    config: PathBuf,

    /// Log level for the AMQP client library (trace, debug, info, warn, error)
    amqp_log_level: Option<String>,
}

async fn inner_main() -> anyhow::Result<RunSummary> {
    let opts = Opts::parse();

    let (amqp_level, unrecognized) = match opts.amqp_log_level.as_deref() {
        None => (Level::ERROR, None),
        Some(arg) => match logging::client_level(arg) {
            Some(level) => (level, None),
            None => (Level::ERROR, Some(arg.to_owned())),
        },
    };
    logging::init(amqp_level)?;
    match &unrecognized {
        Some(arg) => warn!("Unrecognized AMQP log level {arg:?}. AMQP logging level set to ERROR"),
        None => info!("AMQP logging level set to {amqp_level}"),
    }

    let settings = Settings::from_file(&opts.config)?;
    let mut broker = Broker::open(&settings.conn).await?;

    match reconcile(&mut broker, &settings.queues).await {
        Ok(summary) => {
            summary.emit();
            Ok(summary)
        }
        Err(halted) => {
            halted.partial.emit();
            error!("Never attempted: {}", halted.unattempted.join(", "));
            Err(halted.into())
        }
    }
}

#[tokio::main]
async fn main() {
    match inner_main().await {
        Ok(summary) if summary.clean() => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}
