//! Fallback unit that echoes every job payload back.
//!
//! Modes:
//!
//! - default: acknowledge, then echo each payload as a `result` envelope
//! - `--raw`: acknowledge, then answer each job with plain text
//! - `--silent`: never acknowledge

use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use worker_pool::protocol::Envelope;
use worker_pool::{Result, program_fn, serve_stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Echo,
    Raw,
    Silent,
}

impl Mode {
    fn from_args() -> Option<Self> {
        match std::env::args().nth(1).as_deref() {
            None => Some(Self::Echo),
            Some("--raw") => Some(Self::Raw),
            Some("--silent") => Some(Self::Silent),
            Some(_) => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let Some(mode) = Mode::from_args() else {
        eprintln!("usage: echo-unit [--raw | --silent]");
        return ExitCode::from(2);
    };

    let outcome = match mode {
        Mode::Echo => serve_stdio(program_fn(|payload| payload)).await,
        Mode::Raw => serve_raw(true).await,
        Mode::Silent => serve_raw(false).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("echo-unit: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Answers job lines with text that is not an envelope.
async fn serve_raw(acknowledge: bool) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    if acknowledge {
        let mut ack = Envelope::Ack.encode()?;
        ack.push('\n');
        stdout.write_all(ack.as_bytes()).await?;
        stdout.flush().await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !acknowledge {
            continue;
        }
        if let Ok(Envelope::Job { data }) = Envelope::decode(&line) {
            stdout.write_all(format!("raw:{data}\n").as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
