use anas_cli::cli::{CallArgs, Cli, Commands};
use anas_cli::config::{EnvConfig, FileConfig, resolve};
use anas_cli::console::run_call;
use anas_live::desktop::DesktopAudio;
use anas_live::gemini::GeminiLiveTransport;
use anas_live::{CallStatus, LiveCallClient, VoiceProfile};
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let telemetry = if cli.json_logs {
        anas_telemetry::init_json_telemetry("anas-cli")
    } else {
        anas_telemetry::init_telemetry("anas-cli")
    };
    if let Err(e) = telemetry {
        eprintln!("Logging disabled: {e}");
    }

    match cli.command {
        Commands::Call(args) => call(args).await,
        Commands::Voices => {
            list_voices();
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn call(args: CallArgs) -> Result<ExitCode> {
    // A missing .env is fine; the real environment still applies.
    let _ = dotenvy::dotenv();

    let file = FileConfig::load(args.config.as_deref())?;
    let settings = resolve(file, EnvConfig::from_env(), &args)?;

    let transport = Arc::new(GeminiLiveTransport::from_config(&settings.config));
    let client = LiveCallClient::new(settings.config, transport, Arc::new(DesktopAudio::new()));

    match run_call(&client, settings.voice, settings.start_muted).await? {
        CallStatus::Error => Ok(ExitCode::FAILURE),
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn list_voices() {
    for voice in VoiceProfile::ALL {
        let alias = match voice {
            VoiceProfile::Female => "  (female, default)",
            VoiceProfile::Male => "  (male)",
            _ => "",
        };
        println!("{voice}{alias}");
    }
}
