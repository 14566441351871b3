//! Multi-part blob uploads.

use object_store::WriteMultipart;

use crate::error::Result;

/// An in-progress multi-part write of one content blob.
///
/// Parts are cut at the configured part size and uploaded in the background.
/// [`BlobUpload::write`] waits while too many parts are in flight, which is how
/// backpressure reaches whoever is feeding bytes in.
///
/// Dropping an upload that was neither finished nor aborted schedules an
/// abort on the current runtime, so a cancelled request never leaves a
/// dangling multi-part upload behind.
pub struct BlobUpload {
    blob_id: String,
    writer: Option<WriteMultipart>,
}

impl BlobUpload {
    pub(crate) fn new(blob_id: String, writer: WriteMultipart) -> Self {
        Self {
            blob_id,
            writer: Some(writer),
        }
    }

    pub fn blob_id(&self) -> &str {
        &self.blob_id
    }

    /// Buffer `data`, first waiting until fewer than `max_in_flight` parts
    /// are still uploading.
    pub async fn write(&mut self, data: &[u8], max_in_flight: usize) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.wait_for_capacity(max_in_flight.max(1)).await?;
            writer.write(data);
        }
        Ok(())
    }

    /// Flush the final (possibly short) part and complete the upload.
    pub async fn finish(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish().await?;
        }
        Ok(())
    }

    /// Abort the upload, discarding every part sent so far.
    pub async fn abort(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.abort().await?;
        }
        Ok(())
    }
}

impl Drop for BlobUpload {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let blob_id = std::mem::take(&mut self.blob_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = writer.abort().await {
                        tracing::warn!(blob_id = %blob_id, "failed to abort dropped upload: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(blob_id = %blob_id, "upload dropped outside a runtime, not aborted");
            }
        }
    }
}

impl std::fmt::Debug for BlobUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobUpload")
            .field("blob_id", &self.blob_id)
            .field("active", &self.writer.is_some())
            .finish()
    }
}
