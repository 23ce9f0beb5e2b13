//! CLI classify runner — reads one channel + message and prints the result.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::ClassificationResult;

/// Prompt on stderr, read from stdin, print to stdout.
pub async fn run_stdio(classifier: &Classifier) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    run_session(classifier, stdin, &mut stdout, true).await
}

/// Read a channel line and a message line, classify, write the report.
pub async fn run_session<R, W>(
    classifier: &Classifier,
    reader: R,
    out: &mut W,
    interactive: bool,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    if interactive {
        eprintln!("Support relay classifier");
        eprint!("Channel (WhatsApp / Instagram / Email): ");
    }
    let channel = lines.next_line().await?.unwrap_or_default();

    if interactive {
        eprint!("Customer message: ");
    }
    let message = lines.next_line().await?.unwrap_or_default();

    let channel = channel.trim();
    let message = message.trim();
    if message.is_empty() {
        anyhow::bail!("no customer message given");
    }

    let result = classifier.classify_result(channel, message).await;
    out.write_all(render_result(&result).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

fn render_result(result: &ClassificationResult) -> String {
    format!(
        "\n=== RESULT ===\nUrgency: {}\nIntent: {}\n\nSummary: {}\n\nReply:\n{}\n",
        result.urgency, result.intent, result.summary, result.reply
    )
}
