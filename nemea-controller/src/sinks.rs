use nemea_config::OutputSink;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Receiver;

/// Drains an output channel (reporter or evidence) to its configured sink,
/// one newline-delimited JSON value per message, for the lifetime of the
/// channel.
pub async fn run_output_writer<T: Serialize>(
    mut rx: Receiver<T>,
    sink: OutputSink,
    name: &str,
) {
    match sink {
        OutputSink::Stdout => {
            let mut stdout = tokio::io::stdout();
            while let Some(value) = rx.recv().await {
                if let Err(error) = write_line(&mut stdout, &value).await {
                    tracing::error!(output = name, %error, "failed writing to stdout");
                }
            }
        }
        OutputSink::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(error) = tokio::fs::create_dir_all(parent).await {
                        tracing::error!(output = name, %error, "failed creating output directory");
                    }
                }
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(error) => {
                    tracing::error!(output = name, path = %path.display(), %error, "failed opening output file");
                    return;
                }
            };
            while let Some(value) = rx.recv().await {
                if let Err(error) = write_line(&mut file, &value).await {
                    tracing::error!(output = name, %error, "failed writing to output file");
                }
            }
        }
    }
    tracing::info!(output = name, "output channel closed, writer exiting");
}

async fn write_line<W: AsyncWriteExt + Unpin, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
