use ndarray::Array1;

use crate::types::*;

// Presentation software timestamps are in milliseconds
const MILLISECONDS_PER_SECOND: f64 = 1000.0;

/// Sub-trial index marking the first trial of a block
pub const BLOCK_START_SUB_TRIAL: f64 = 1.0;
/// Sub-trial index marking the last trial of a block
pub const BLOCK_END_SUB_TRIAL: f64 = 36.0;

/// Converts absolute millisecond timestamps to seconds after the trigger.
///
/// Computes `(raw - trigger) / 1000` for every row selected by `mask`,
/// keeping row order. All three arrays must have the same length, which
/// holds for any fields and masks taken from one [`RecordTable`].
pub fn normalize(raw: &Array1<f64>, trigger: &Array1<f64>, mask: &Array1<bool>) -> Array1<f64> {
    raw.iter()
        .zip(trigger.iter())
        .zip(mask.iter())
        .filter(|(_, &selected)| selected)
        .map(|((&time, &trigger_time), _)| (time - trigger_time) / MILLISECONDS_PER_SECOND)
        .collect()
}

/// Converts millisecond intervals to seconds for the rows selected by `mask`
pub fn to_seconds(raw: &Array1<f64>, mask: &Array1<bool>) -> Array1<f64> {
    raw.iter()
        .zip(mask.iter())
        .filter(|(_, &selected)| selected)
        .map(|(&time, _)| time / MILLISECONDS_PER_SECOND)
        .collect()
}

/// Row indices selected by `mask`, in table order
fn selected_rows(mask: &Array1<bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &selected)| selected)
        .map(|(row, _)| row)
        .collect()
}

/// Locates the continuous stimulus event of `run`.
///
/// The event is the first row whose onset field is positive; rows after it
/// are ignored. Its onset is relative to the trigger, its duration is the
/// onset-to-onset interval of the same row.
pub fn extract_game_stim(
    table: &RecordTable,
    fields: &FieldNames,
    run: Run,
) -> Result<GameStimEvent, EmoError> {
    let onset_field = fields.game_stim_onset(run);
    let onset_time = table.numeric(&onset_field)?;
    let onset_to_onset = table.numeric(&fields.game_stim_onset_to_onset(run))?;
    let trigger = table.numeric(&fields.trigger_wait_time)?;

    // Rows carrying the event hold a positive onset, all others a sentinel
    let mask = table.numeric_positive(&onset_field)?;
    let rows = selected_rows(&mask);
    let onsets = normalize(onset_time, trigger, &mask);
    let durations = to_seconds(onset_to_onset, &mask);

    let (Some(&row), Some(&onset), Some(&duration)) =
        (rows.first(), onsets.get(0), durations.get(0))
    else {
        return Err(EmoError::EmptySelection {
            context: format!("{}: no row with a positive {}", run, onset_field),
        });
    };

    if rows.len() > 1 {
        tracing::warn!(
            run = run.number(),
            field = %onset_field,
            matches = rows.len(),
            "More than one game stimulus row; using the first"
        );
    }

    tracing::info!(run = run.number(), onset, duration, "Game stimulus");

    Ok(GameStimEvent {
        run,
        row,
        onset,
        duration,
    })
}

/// Splits the rows of one condition within one run into blocks.
///
/// Rows with sub-trial 1 start a block and rows with sub-trial 36 end one.
/// Starts and ends are numbered in table order and the k-th start is paired
/// with the k-th end. Onsets and offsets are taken from the inter-trial
/// interval onset, relative to the trigger time on the same row.
///
/// # Errors
///
/// * `EmptySelection` when the condition has no block in this run
/// * `MalformedBlock` when start and end counts differ
pub fn segment_blocks(
    table: &RecordTable,
    fields: &FieldNames,
    run: Run,
    condition: Condition,
) -> Result<Vec<ConditionBlock>, EmoError> {
    let iti_onset = table.numeric(&fields.iti_onset_time)?;
    let trigger = table.numeric(&fields.trigger_wait_time)?;

    // Rows of this run and condition
    let in_run = table.text_equals(&fields.procedure_block, &fields.reactivity_label(run))?;
    let in_condition = table.text_equals(&fields.running_sub_trial, condition.label())?;
    let block_mask = mask_and(&in_run, &in_condition);

    // First and last sub-trials
    let start_mask = mask_and(
        &block_mask,
        &table.numeric_equals(&fields.sub_trial_index, BLOCK_START_SUB_TRIAL)?,
    );
    let end_mask = mask_and(
        &block_mask,
        &table.numeric_equals(&fields.sub_trial_index, BLOCK_END_SUB_TRIAL)?,
    );

    let start_rows = selected_rows(&start_mask);
    let end_rows = selected_rows(&end_mask);

    if start_rows.is_empty() && end_rows.is_empty() {
        return Err(EmoError::EmptySelection {
            context: format!("{} {}: no blocks", run, condition),
        });
    }
    if start_rows.len() != end_rows.len() {
        return Err(EmoError::MalformedBlock {
            run,
            condition,
            starts: start_rows.len(),
            ends: end_rows.len(),
        });
    }

    let onsets = normalize(iti_onset, trigger, &start_mask);
    let offsets = normalize(iti_onset, trigger, &end_mask);

    let blocks: Vec<ConditionBlock> = start_rows
        .iter()
        .zip(end_rows.iter())
        .zip(onsets.iter().zip(offsets.iter()))
        .enumerate()
        .map(
            |(index, ((&start_row, &end_row), (&onset, &offset)))| ConditionBlock {
                run,
                condition,
                index,
                start_row,
                end_row,
                onset,
                duration: offset - onset,
            },
        )
        .collect();

    check_block_alignment(&blocks);

    tracing::info!(
        run = run.number(),
        condition = condition.label(),
        onsets = ?blocks.iter().map(|b| b.onset).collect::<Vec<_>>(),
        durations = ?blocks.iter().map(|b| b.duration).collect::<Vec<_>>(),
        "Condition blocks"
    );

    Ok(blocks)
}

/// Warns about blocks that can only come from misaligned starts and ends.
///
/// Such blocks are still written unchanged.
fn check_block_alignment(blocks: &[ConditionBlock]) {
    for block in blocks {
        if block.end_row < block.start_row || block.duration < 0.0 {
            tracing::warn!(
                run = block.run.number(),
                condition = block.condition.label(),
                block = block.index,
                start_row = block.start_row,
                end_row = block.end_row,
                duration = block.duration,
                "Block end precedes its start; blocks may be misaligned"
            );
        }
    }
}
