use clap::{Parser, Subcommand};

/// Death2Data: token-gated private search gateway
#[derive(Parser)]
#[command(name = "d2d", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (defaults to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Inspect the login audit trail
    Logins {
        #[command(subcommand)]
        command: LoginCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Generate a new token. The plaintext is printed once and never stored.
    Generate {
        /// Validity in days (defaults to $D2D_TOKEN_TTL_DAYS, then 28)
        #[arg(long)]
        ttl_days: Option<i64>,
    },
    /// Revoke a token by its digest or a unique digest prefix
    Revoke { digest: String },
    /// List issued tokens (digests only)
    List,
}

#[derive(Subcommand)]
pub enum LoginCommands {
    /// Show recent login records (who, not what)
    Show {
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Delete login records older than the retention window
    Prune,
}
