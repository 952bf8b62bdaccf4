//! Spawns a child process, pipes its stdout through [`vt_stream::Adapter`],
//! and prints each reconstructed line prefixed with the child's name — the
//! smallest useful host integration, proving the tokenizer, CSI
//! classifier, SGR composer, cell model, and emission strategy work end to
//! end against a real process.

use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::process::Command as ChildCommand;

use vt_emit::Strategy;
use vt_stream::Adapter;

/// Reconstruct a child process's ANSI output into plain finalized lines.
#[derive(Parser)]
#[command(name = "vt-linecat", about = "Pipe a command's output through the streaming ANSI terminal")]
struct Args {
    /// How long a stable (plain-text) line waits before flushing without a
    /// trailing newline, in milliseconds.
    #[arg(long, default_value_t = vt_emit::DEFAULT_STABLE_MS)]
    timeout_ms: u64,

    /// The command to run, and its arguments.
    #[arg(required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let Some((program, rest)) = args.command.split_first() else {
        eprintln!("vt-linecat: no command given");
        return std::process::ExitCode::FAILURE;
    };

    let mut child = match ChildCommand::new(program)
        .args(rest)
        .stdout(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            eprintln!("vt-linecat: failed to spawn {program}: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let Some(mut stdout) = child.stdout.take() else {
        eprintln!("vt-linecat: child has no stdout pipe");
        return std::process::ExitCode::FAILURE;
    };

    let name = program.clone();
    let mut adapter = Adapter::with_strategy(Strategy::StatefulTimeout {
        volatile_ms: vt_emit::DEFAULT_VOLATILE_MS,
        stable_ms: args.timeout_ms,
    });
    adapter.on_line(move |line| println!("[{name}] {line}"));

    let (chunk_tx, chunk_rx) = tokio::sync::mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if chunk_tx.send(text).is_err() {
                        break;
                    }
                }
            }
        }
    });

    if let Err(e) = adapter.run(chunk_rx).await {
        tracing::warn!(error = %e, "adapter reported an error while draining child output");
    }

    let _ = reader.await;
    match child.wait().await {
        Ok(status) if status.success() => std::process::ExitCode::SUCCESS,
        Ok(_) => std::process::ExitCode::FAILURE,
        Err(e) => {
            eprintln!("vt-linecat: failed to wait on child: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
