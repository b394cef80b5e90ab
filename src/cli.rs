use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "easy-install")]
#[command(author = "Compass Installer Team")]
#[command(version)]
#[command(about = "Prepare a Linux host and install the Compass stack", long_about = None)]
pub struct Cli {
    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Message language
    #[arg(short, long, value_enum, default_value_t = Lang::Ru, env = "EASY_INSTALL_LANG")]
    pub lang: Lang,

    /// Public domain name of the installation
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Issue a Let's Encrypt certificate for --domain
    #[arg(long)]
    pub le: bool,

    /// Root directory for persistent data
    #[arg(long, default_value = "/opt/compass_data")]
    pub root_mount: String,

    /// Administrator e-mail written to team.yaml
    #[arg(long)]
    pub admin_email: Option<String>,

    /// Administrator password written to team.yaml (generated if omitted)
    #[arg(long)]
    pub admin_password: Option<String>,

    /// Host IPv4 address (detected if omitted)
    #[arg(long)]
    pub host_ip: Option<String>,

    /// Skip capacity and AppArmor checks
    #[arg(long)]
    pub skip_checks: bool,

    /// Skip the disk benchmark
    #[arg(long)]
    pub skip_bench: bool,

    /// Runtime of each benchmark pass, in seconds
    #[arg(long, default_value_t = 20)]
    pub bench_runtime: u64,

    /// Prepare everything but do not run the final installer
    #[arg(long)]
    pub skip_install: bool,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<String>,

    /// Report what would be done without changing the host
    #[arg(long)]
    pub dry_run: bool,

    /// Show debug messages on the console
    #[arg(short, long)]
    pub verbose: bool,

    /// Installation root holding script/, configs/ and packages/
    #[arg(long, env = crate::paths::ENV_ROOT)]
    pub project_root: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    Ru,
    En,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}
