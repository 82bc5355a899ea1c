use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Sign in with these credentials right after startup.
    #[arg(long, requires = "password")]
    pub email: Option<String>,
    #[arg(long, requires = "email")]
    pub password: Option<String>,
}
