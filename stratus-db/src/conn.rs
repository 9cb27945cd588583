use std::str::FromStr;

use clap::Args;
use tokio_postgres::{Client, Config, NoTls};

use crate::error;

/// connection arguments shared by every command that talks to postgres
#[derive(Debug, Args)]
pub struct DbArgs {
    /// connection string for postgres, replaces every other connection
    /// argument
    #[arg(short, long, conflicts_with_all = ["user", "password", "req_password", "host", "port", "dbname"])]
    connect: Option<String>,

    /// user for postgres connection
    #[arg(short, long, default_value = "postgres")]
    user: String,

    /// password for postgres connection
    #[arg(short = 'P', long, conflicts_with = "req_password")]
    password: Option<String>,

    /// requests password via input before connection
    #[arg(long)]
    req_password: bool,

    /// host for postgres connection
    #[arg(long, default_value = "localhost")]
    host: String,

    /// port for postgres connection
    #[arg(short, long, default_value_t = 5432)]
    port: u16,

    /// dbname for postgres connection
    #[arg(long, default_value = "stratus")]
    dbname: String,
}

impl DbArgs {
    fn config(&self) -> error::Result<Config> {
        if let Some(connect) = &self.connect {
            return Ok(Config::from_str(connect)?);
        }

        let mut config = Config::new();
        config.user(&self.user);
        config.host(&self.host);
        config.port(self.port);
        config.dbname(&self.dbname);

        if self.req_password {
            let input = rpassword::prompt_password(format!("{} password: ", self.user))?;

            config.password(input.trim_end_matches('\n'));
        } else if let Some(pass) = &self.password {
            config.password(pass);
        }

        Ok(config)
    }

    pub async fn connect(&self) -> error::Result<Client> {
        let (client, conn) = self.config()?
            .connect(NoTls)
            .await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::error!("postgres connection error: {e}");
            }
        });

        Ok(client)
    }
}
