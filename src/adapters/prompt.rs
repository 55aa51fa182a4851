use crate::domain::ports::VerificationCodeSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks the operator for the one-time code on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinCodePrompt;

#[async_trait]
impl VerificationCodeSource for StdinCodePrompt {
    async fn read_code(&self) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"Enter Code: ").await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}
