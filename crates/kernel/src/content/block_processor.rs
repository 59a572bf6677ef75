//! Block validation and normalization.
//!
//! Turns raw client block input into normalized [`Block`]s: type checking,
//! required-field checks, file reference resolution with metadata
//! denormalization, and position stamping. Processing is all-or-nothing:
//! the first invalid block fails the whole list, and nothing downstream
//! ever sees a partially normalized batch.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::error::{KernelError, KernelResult};
use crate::file::FileLookup;
use crate::models::{Block, BlockInput, BlockKind};

/// Validates and normalizes ordered block lists.
#[derive(Clone)]
pub struct BlockProcessor {
    files: Arc<dyn FileLookup>,
}

impl BlockProcessor {
    pub fn new(files: Arc<dyn FileLookup>) -> Self {
        Self { files }
    }

    /// Normalize an ordered block list.
    ///
    /// Fails on the first invalid block with its index; on success every
    /// block's `metadata.position` equals its index in the input order.
    /// No writes happen here; the only side effect is file lookups.
    pub async fn process_blocks(
        &self,
        inputs: Vec<BlockInput>,
        actor: Uuid,
    ) -> KernelResult<Vec<Block>> {
        let mut blocks = Vec::with_capacity(inputs.len());

        for (index, input) in inputs.into_iter().enumerate() {
            blocks.push(self.process_block(index, input).await?);
        }

        debug!(actor = %actor, count = blocks.len(), "block list normalized");
        Ok(blocks)
    }

    async fn process_block(&self, index: usize, input: BlockInput) -> KernelResult<Block> {
        let kind = match input.block_type.as_str() {
            "text" => BlockKind::Text,
            "image" => BlockKind::Image,
            "video" => BlockKind::Video,
            other => {
                return Err(KernelError::validation(
                    index,
                    format!("unknown block type '{other}'"),
                ));
            }
        };

        let mut block = match kind {
            BlockKind::Text => self.process_text_block(index, input)?,
            BlockKind::Image | BlockKind::Video => {
                self.process_media_block(index, kind, input).await?
            }
        };

        block
            .metadata
            .insert("position".to_string(), json!(index));

        Ok(block)
    }

    fn process_text_block(&self, index: usize, input: BlockInput) -> KernelResult<Block> {
        let text = input
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                KernelError::validation(index, "text block requires non-empty text")
            })?;

        let mut metadata = input.metadata;
        metadata
            .entry("text_type".to_string())
            .or_insert_with(|| json!("paragraph"));

        Ok(Block {
            kind: BlockKind::Text,
            text: Some(text),
            url: None,
            file_id: None,
            metadata,
        })
    }

    async fn process_media_block(
        &self,
        index: usize,
        kind: BlockKind,
        input: BlockInput,
    ) -> KernelResult<Block> {
        let mut metadata = input.metadata;

        if kind == BlockKind::Video {
            if let Some(duration) = input.duration {
                metadata.insert("duration".to_string(), json!(duration));
            }
            if let Some(thumbnail) = &input.thumbnail {
                metadata.insert("thumbnail".to_string(), json!(thumbnail));
            }
        }

        // A direct url wins; a file_id is resolved and denormalized.
        let (url, file_id) = if let Some(url) = input.url {
            (Some(url), input.file_id)
        } else if let Some(file_id) = input.file_id {
            let reference = self
                .files
                .fetch_by_id(file_id)
                .await
                .map_err(|error| {
                    KernelError::validation(
                        index,
                        format!("file {file_id} could not be resolved: {error}"),
                    )
                })?
                .ok_or_else(|| {
                    KernelError::validation(index, format!("file {file_id} not found"))
                })?;

            denormalize_reference(&mut metadata, &reference);
            (None, Some(file_id))
        } else {
            return Err(KernelError::validation(
                index,
                format!("{kind} block requires a url or file_id"),
            ));
        };

        Ok(Block {
            kind,
            text: None,
            url,
            file_id,
            metadata,
        })
    }
}

fn denormalize_reference(metadata: &mut Map<String, Value>, reference: &crate::file::FileReference) {
    metadata.insert("url".to_string(), json!(reference.url));
    metadata.insert("content_type".to_string(), json!(reference.content_type));
    metadata.insert("size".to_string(), json!(reference.size));
    metadata.insert("filename".to_string(), json!(reference.filename));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file::{FileReference, StaticFileLookup};

    fn text_block(text: &str) -> BlockInput {
        BlockInput {
            block_type: "text".to_string(),
            text: Some(text.to_string()),
            ..BlockInput::default()
        }
    }

    fn processor_with(references: Vec<FileReference>) -> BlockProcessor {
        let mut lookup = StaticFileLookup::new();
        for reference in references {
            lookup.insert(reference);
        }
        BlockProcessor::new(Arc::new(lookup))
    }

    fn sample_reference(id: Uuid) -> FileReference {
        FileReference {
            id,
            url: "https://cdn.example/media/launch.png".to_string(),
            content_type: "image/png".to_string(),
            size: 2048,
            filename: "launch.png".to_string(),
        }
    }

    #[tokio::test]
    async fn positions_follow_input_order() {
        let processor = processor_with(vec![]);
        let inputs = vec![text_block("one"), text_block("two"), text_block("three")];

        let blocks = processor
            .process_blocks(inputs, Uuid::now_v7())
            .await
            .unwrap();

        assert_eq!(blocks.len(), 3);
        for (index, block) in blocks.iter().enumerate() {
            assert_eq!(block.metadata["position"], json!(index));
        }
    }

    #[tokio::test]
    async fn unknown_type_names_index_and_type() {
        let processor = processor_with(vec![]);
        let inputs = vec![
            text_block("fine"),
            BlockInput {
                block_type: "carousel".to_string(),
                ..BlockInput::default()
            },
        ];

        let err = processor
            .process_blocks(inputs, Uuid::now_v7())
            .await
            .unwrap_err();

        match err {
            KernelError::Validation { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("carousel"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_block_requires_non_empty_text() {
        let processor = processor_with(vec![]);

        let err = processor
            .process_blocks(vec![text_block("   ")], Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Validation { index: 0, .. }));

        let err = processor
            .process_blocks(
                vec![BlockInput {
                    block_type: "text".to_string(),
                    ..BlockInput::default()
                }],
                Uuid::now_v7(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::Validation { index: 0, .. }));
    }

    #[tokio::test]
    async fn text_type_defaults_but_is_not_overwritten() {
        let processor = processor_with(vec![]);

        let mut styled = text_block("heading");
        styled
            .metadata
            .insert("text_type".to_string(), json!("heading1"));

        let blocks = processor
            .process_blocks(vec![text_block("plain"), styled], Uuid::now_v7())
            .await
            .unwrap();

        assert_eq!(blocks[0].metadata["text_type"], json!("paragraph"));
        assert_eq!(blocks[1].metadata["text_type"], json!("heading1"));
    }

    #[tokio::test]
    async fn media_block_requires_url_or_file_id() {
        let processor = processor_with(vec![]);

        let err = processor
            .process_blocks(
                vec![BlockInput {
                    block_type: "image".to_string(),
                    ..BlockInput::default()
                }],
                Uuid::now_v7(),
            )
            .await
            .unwrap_err();

        match err {
            KernelError::Validation { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("url or file_id"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_url_is_used_as_is() {
        let processor = processor_with(vec![]);

        let blocks = processor
            .process_blocks(
                vec![BlockInput {
                    block_type: "image".to_string(),
                    url: Some("https://cdn.example/direct.jpg".to_string()),
                    ..BlockInput::default()
                }],
                Uuid::now_v7(),
            )
            .await
            .unwrap();

        assert_eq!(blocks[0].url.as_deref(), Some("https://cdn.example/direct.jpg"));
        // no lookup happened, so nothing was denormalized
        assert!(blocks[0].metadata.get("content_type").is_none());
    }

    #[tokio::test]
    async fn file_reference_is_denormalized_into_metadata() {
        let file_id = Uuid::now_v7();
        let processor = processor_with(vec![sample_reference(file_id)]);

        let blocks = processor
            .process_blocks(
                vec![BlockInput {
                    block_type: "image".to_string(),
                    file_id: Some(file_id),
                    ..BlockInput::default()
                }],
                Uuid::now_v7(),
            )
            .await
            .unwrap();

        let metadata = &blocks[0].metadata;
        assert_eq!(metadata["url"], json!("https://cdn.example/media/launch.png"));
        assert_eq!(metadata["content_type"], json!("image/png"));
        assert_eq!(metadata["size"], json!(2048));
        assert_eq!(metadata["filename"], json!("launch.png"));
        assert_eq!(blocks[0].file_id, Some(file_id));
        assert_eq!(blocks[0].url, None);
    }

    #[tokio::test]
    async fn video_metadata_passes_through() {
        let file_id = Uuid::now_v7();
        let processor = processor_with(vec![sample_reference(file_id)]);

        let blocks = processor
            .process_blocks(
                vec![BlockInput {
                    block_type: "video".to_string(),
                    file_id: Some(file_id),
                    duration: Some(12.5),
                    thumbnail: Some("https://cdn.example/thumb.jpg".to_string()),
                    ..BlockInput::default()
                }],
                Uuid::now_v7(),
            )
            .await
            .unwrap();

        assert_eq!(blocks[0].metadata["duration"], json!(12.5));
        assert_eq!(
            blocks[0].metadata["thumbnail"],
            json!("https://cdn.example/thumb.jpg")
        );
    }

    #[tokio::test]
    async fn missing_file_fails_the_whole_batch() {
        let processor = processor_with(vec![]);
        let missing = Uuid::now_v7();

        let err = processor
            .process_blocks(
                vec![
                    text_block("intro"),
                    BlockInput {
                        block_type: "image".to_string(),
                        file_id: Some(missing),
                        ..BlockInput::default()
                    },
                ],
                Uuid::now_v7(),
            )
            .await
            .unwrap_err();

        match err {
            KernelError::Validation { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains(&missing.to_string()));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
