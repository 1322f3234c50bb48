use crate::{
    http::{ByteStream, Client, HttpRequest},
    AnonymizersQuery, ClientError, RequestOptions, Result,
};
use std::path::Path;

use futures::StreamExt;
use tokio::{
    fs::OpenOptions,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, info, instrument, warn};

impl Client {
    /// Opens the anonymizers feed as a byte stream.
    ///
    /// The stream carries the raw payload in the format named by
    /// `query.format` (e.g. CSV). Feeds can be large, so consume it
    /// incrementally. The caller owns the stream; dropping it closes the
    /// connection.
    #[instrument(skip_all, fields(format = %query.format, full = query.full))]
    pub async fn stream_anonymizers_feed(
        &self,
        query: &AnonymizersQuery,
        options: Option<&RequestOptions>,
    ) -> Result<ByteStream> {
        let url = format!(
            "{}/feeds/anonymizers?{}",
            self.feeds_base(),
            query.to_query_string()
        );
        let request = HttpRequest::get(&url)?;
        self.request(request, 200, options).await
    }

    /// Downloads the anonymizers feed into a new file at `path` and returns
    /// the number of bytes written.
    ///
    /// `path` must not exist yet. If it does, [`ClientError::FileExists`] is
    /// returned before any request is made. The file is synced to disk
    /// before returning; a partially written file is removed on failure.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn download_anonymizers_feed<P: AsRef<Path>>(
        &self,
        query: &AnonymizersQuery,
        path: P,
        options: Option<&RequestOptions>,
    ) -> Result<u64> {
        let path = path.as_ref();
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            return Err(ClientError::FileExists {
                path: path.to_path_buf(),
            });
        }

        let body = self.stream_anonymizers_feed(query, options).await?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    ClientError::FileExists {
                        path: path.to_path_buf(),
                    }
                } else {
                    ClientError::Io {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;
        debug!(path = %path.display(), "created output file");

        let bytes_written = match stream_to_file(body, file, path).await {
            Ok(bytes_written) => bytes_written,
            Err(err) => {
                remove_partial_file(path).await;
                return Err(err);
            }
        };
        info!(path = %path.display(), bytes = bytes_written, "feed download complete");
        Ok(bytes_written)
    }
}

async fn remove_partial_file(path: &Path) {
    debug!(path = %path.display(), "removing partial file after error");
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to remove partial file");
    }
}

/// Copies `body` into `file` chunk by chunk, then flushes and syncs it.
async fn stream_to_file(mut body: ByteStream, file: tokio::fs::File, path: &Path) -> Result<u64> {
    let io_err = |source: std::io::Error| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await.map_err(io_err)?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(io_err)?;
    writer.get_ref().sync_all().await.map_err(io_err)?;
    Ok(bytes_written)
}
