use std::path::PathBuf;

use crate::reader;
use crate::timing::{extract_game_stim, segment_blocks};
use crate::types::*;
use crate::writer::{Channel, OnsetEmitter};

/// Everything one extraction needs, passed explicitly to [`run`].
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Tab-delimited behavioral log
    pub input: PathBuf,
    /// Prepended verbatim to every output file name
    pub output_prefix: String,
    pub fields: FieldNames,
    pub policies: ChannelPolicies,
}

impl ExtractionConfig {
    /// Configuration with the default field names and channel policies
    pub fn new<P: Into<PathBuf>, S: Into<String>>(input: P, output_prefix: S) -> Self {
        ExtractionConfig {
            input: input.into(),
            output_prefix: output_prefix.into(),
            fields: FieldNames::default(),
            policies: ChannelPolicies::default(),
        }
    }
}

/// What an extraction produced, in processing order.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub game_stims: Vec<GameStimEvent>,
    pub blocks: Vec<ConditionBlock>,
    /// Output files in write order; append channels appear once per write
    pub written: Vec<PathBuf>,
}

impl ExtractionSummary {
    /// Number of blocks found for one run and condition
    pub fn block_count(&self, run: Run, condition: Condition) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.run == run && b.condition == condition)
            .count()
    }
}

/// Loads the configured input and writes all onset files.
pub fn run(config: &ExtractionConfig) -> Result<ExtractionSummary, EmoError> {
    let table = reader::load_file(&config.input)?;
    extract_all(&table, config)
}

/// Writes all onset files for an already loaded table.
///
/// Runs are processed in order; within a run the game stimulus comes first,
/// then the conditions in [`Condition::ALL`] order. The first error stops
/// the extraction. Required fields are checked before anything is written.
pub fn extract_all(
    table: &RecordTable,
    config: &ExtractionConfig,
) -> Result<ExtractionSummary, EmoError> {
    let fields = &config.fields;
    table.require_fields(&fields.required())?;

    let emitter = OnsetEmitter::new(config.output_prefix.clone(), config.policies.clone());
    let mut summary = ExtractionSummary::default();

    for run in Run::ALL {
        let event = extract_game_stim(table, fields, run)?;
        let path = emitter.emit(Channel::GameStim(run), &[OnsetRow::from(&event)])?;
        summary.written.push(path);
        summary.game_stims.push(event);

        for condition in Condition::ALL {
            let blocks = segment_blocks(table, fields, run, condition)?;
            let rows: Vec<OnsetRow> = blocks.iter().map(OnsetRow::from).collect();
            let path = emitter.emit(Channel::Condition(run, condition), &rows)?;
            summary.written.push(path);
            summary.blocks.extend(blocks);
        }
    }

    tracing::info!(
        files = summary.written.len(),
        blocks = summary.blocks.len(),
        "Extraction complete"
    );

    Ok(summary)
}
