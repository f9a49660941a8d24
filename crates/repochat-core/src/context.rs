//! Full-text context loading.

use crate::error::ChatError;
use crate::models::RetrievedChunk;
use crate::store::FullTextStore;

/// Separator placed between file contents in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Resolve each chunk to its backing file and join the contents.
///
/// Lookups run one at a time in chunk order. A chunk whose record is gone
/// contributes nothing; a store that cannot be reached fails the call.
pub async fn load_full_text(
    store: &dyn FullTextStore,
    chunks: &[RetrievedChunk],
) -> Result<String, ChatError> {
    let mut contents: Vec<String> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match store
            .get_by_id(&chunk.file_id)
            .await
            .map_err(|e| ChatError::external("full-text store", e))?
        {
            Some(record) => contents.push(record.content),
            None => {
                tracing::debug!(file_id = %chunk.file_id, source = %chunk.source, "full-text record missing, skipped");
            }
        }
    }

    Ok(contents.join(CONTEXT_SEPARATOR))
}
