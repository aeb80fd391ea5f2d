use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use umkm_assistant::{
    agent::SessionOrchestrator, config::AssistantConfig, session::SessionFactory,
};

const BANNER: &str = "UMKM Assistant\n\
    Tanyakan data penjualan atau minta saran bisnis.\n\
    Perintah: /reset  /memory  /exit\n";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so answers stay readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = AssistantConfig::from_env()?;
    let mut session = SessionFactory::from_config(&config)?.build();

    info!(model = %config.gemini_model, "Terminal session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(BANNER.as_bytes()).await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                stdout.write_all("Percakapan direset.\n".as_bytes()).await?;
            }
            "/memory" => {
                stdout.write_all(describe_memory(&session).as_bytes()).await?;
            }
            message => {
                if let Some(dispatch) = session.dispatch_detailed(message).await {
                    let reply = format!("[{}]\n{}\n", dispatch.classification, dispatch.answer);
                    stdout.write_all(reply.as_bytes()).await?;
                }
            }
        }
    }

    stdout.write_all("Sampai jumpa!\n".as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

fn describe_memory(session: &SessionOrchestrator) -> String {
    let snapshot = session.snapshot();
    let section = |label: &str, memory: &umkm_assistant::memory::MemorySnapshot| {
        format!(
            "{}: {} exchanges, {} turns kept, {} compactions, ~{} tokens\n  summary: {}\n",
            label,
            memory.exchange_count,
            memory.turns.len(),
            memory.compactions,
            memory.token_estimate,
            if memory.summary.is_empty() {
                umkm_assistant::memory::EMPTY_SUMMARY_PLACEHOLDER
            } else {
                memory.summary.as_str()
            }
        )
    };

    format!(
        "{}{}",
        section("Data", &snapshot.data),
        section("Advice", &snapshot.advice)
    )
}
