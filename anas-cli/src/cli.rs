use anas_live::{Locale, VoiceProfile};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "anas")]
#[command(about = "Live voice calls with the Anas assistant", long_about = None)]
pub struct Cli {
    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Place a live voice call
    Call(CallArgs),

    /// List the voices a call can use
    Voices,
}

#[derive(Args, Debug, Default, Clone)]
pub struct CallArgs {
    /// Assistant voice: female, male or a voice name such as Puck
    #[arg(short, long)]
    pub voice: Option<VoiceProfile>,

    /// Language of status labels: en or ckb
    #[arg(short, long)]
    pub locale: Option<Locale>,

    /// Live model to talk to
    #[arg(short, long)]
    pub model: Option<String>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start the call with the microphone muted
    #[arg(long)]
    pub muted: bool,
}
