use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use flow_message::LogLevel;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin, stdin};
use tracing::{error, info};
use uuid::Uuid;

use super::CliContext;
use screenflow::config::FlowConfig;
use screenflow::context::Platform;
use screenflow::demo;
use screenflow::gateway::{ChatInbound, ChatJsonGateway, NaloGateway, NaloRequest};
use screenflow::logger::{LogConfig, init_tracing};
use screenflow::processor::ProcessorBuilder;
use screenflow::session::{InMemorySessionStore, SessionStore};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Channel to simulate (ussd or chat)
    #[arg(long, default_value = "ussd")]
    pub channel: Platform,

    /// Phone number of the simulated user
    #[arg(long, default_value = "+233200000001")]
    pub msisdn: String,

    /// Code dialled to open a USSD session
    #[arg(long, default_value = "*123#")]
    pub service_code: String,

    /// Optional log level override (e.g. error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,

    /// Log directory, relative to the root unless absolute
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// OpenTelemetry endpoint (e.g. http://localhost:4318)
    #[arg(long)]
    pub otel_endpoint: Option<String>,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            channel: Platform::Ussd,
            msisdn: "+233200000001".into(),
            service_code: "*123#".into(),
            log_level: LogLevel::Info,
            log_dir: PathBuf::from("logs"),
            otel_endpoint: None,
        }
    }
}

pub async fn execute(args: SimulateArgs, context: &CliContext) -> anyhow::Result<()> {
    let log_config = LogConfig::new(
        args.log_level,
        Some(context.root.join(&args.log_dir)),
        args.otel_endpoint.clone(),
    );
    let _guard = init_tracing(&log_config)?;

    let config = FlowConfig::from_manager(&context.config_manager).await?;
    let store: SessionStore = InMemorySessionStore::new();
    info!(channel = %args.channel, msisdn = %args.msisdn, "starting simulator");

    let mut lines = BufReader::new(stdin()).lines();
    match args.channel {
        Platform::Ussd => simulate_ussd(&args, config, store, &mut lines).await,
        Platform::Chat => simulate_chat(&args, config, store, &mut lines).await,
    }
}

async fn simulate_ussd(
    args: &SimulateArgs,
    config: FlowConfig,
    store: SessionStore,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<()> {
    let processor = ProcessorBuilder::ussd(config)
        .use_gateway(NaloGateway::new())
        .use_session_store(store)
        .run(demo::flow(), demo::ACTION)?;

    loop {
        let mut request = NaloRequest {
            userid: "simulator".into(),
            msisdn: args.msisdn.clone(),
            userdata: args.service_code.clone(),
            msgtype: true,
            sessionid: Uuid::new_v4().to_string(),
            network: None,
        };
        println!("-- dialled {} --", args.service_code);

        loop {
            let reply = match processor.handle(request.clone()).await {
                Ok(reply) => reply,
                Err(err) => {
                    error!(error = %err, "request failed");
                    eprintln!("error: {err}");
                    break;
                }
            };
            println!("{}\n", reply.msg);
            if !reply.msgtype {
                break;
            }
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            request.msgtype = false;
            request.userdata = line.trim().to_string();
        }

        println!("-- session ended, press enter to dial again --");
        if lines.next_line().await?.is_none() {
            return Ok(());
        }
    }
}

async fn simulate_chat(
    args: &SimulateArgs,
    config: FlowConfig,
    store: SessionStore,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<()> {
    let processor = ProcessorBuilder::chat(config)
        .use_gateway(ChatJsonGateway::default())
        .use_session_store(store)
        .run(demo::flow(), demo::ACTION)?;

    println!("-- say anything to start --");
    while let Some(line) = lines.next_line().await? {
        let message = ChatInbound {
            message_id: Uuid::new_v4().to_string(),
            from: args.msisdn.clone(),
            contact_name: None,
            text: Some(line),
            timestamp: Some(Utc::now()),
            location: None,
            media: None,
        };
        match processor.handle(message).await {
            Ok(reply) => println!("{}\n", serde_json::to_string_pretty(&reply.payload)?),
            Err(err) => {
                error!(error = %err, "request failed");
                eprintln!("error: {err}");
            }
        }
    }
    Ok(())
}
