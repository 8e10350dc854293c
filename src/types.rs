use ndarray::{Array1, Zip};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;

/// One of the two repetitions of the reactivity task.
///
/// Each run has its own trigger time, its own procedure-block label and its
/// own set of output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Run {
    One,
    Two,
}

impl Run {
    /// Runs in processing order
    pub const ALL: [Run; 2] = [Run::One, Run::Two];

    /// Run number as it appears in field names and file names
    pub fn number(self) -> u8 {
        match self {
            Run::One => 1,
            Run::Two => 2,
        }
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "run {}", self.number())
    }
}

/// Condition label carried by the `RunningSubTrial` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Calm,
    Happy,
    Fear,
    ScrambledOne,
    ScrambledTwo,
}

impl Condition {
    /// Conditions in processing order
    pub const ALL: [Condition; 5] = [
        Condition::Calm,
        Condition::Happy,
        Condition::Fear,
        Condition::ScrambledOne,
        Condition::ScrambledTwo,
    ];

    /// Label as written by the presentation software
    pub fn label(self) -> &'static str {
        match self {
            Condition::Calm => "CalmList",
            Condition::Happy => "HappyList",
            Condition::Fear => "FearList",
            Condition::ScrambledOne => "ScrambledListOne",
            Condition::ScrambledTwo => "ScrambledListTwo",
        }
    }

    /// Condition code: the first character of the label.
    ///
    /// Both scrambled lists share the code `S`.
    pub fn code(self) -> char {
        match self {
            Condition::Calm => 'C',
            Condition::Happy => 'H',
            Condition::Fear => 'F',
            Condition::ScrambledOne | Condition::ScrambledTwo => 'S',
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an output channel treats existing content when it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// Truncate the file, so it holds only the latest write
    Overwrite,
    /// Add rows after whatever the file already holds
    Append,
}

/// Explicit `{condition -> policy}` mapping used by the onset emitter.
///
/// The default appends both scrambled lists to their shared channel and
/// replaces every other condition's channel on each write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPolicies {
    by_condition: HashMap<Condition, ChannelPolicy>,
}

impl ChannelPolicies {
    /// Every condition uses the same policy
    pub fn uniform(policy: ChannelPolicy) -> Self {
        ChannelPolicies {
            by_condition: Condition::ALL.iter().map(|&c| (c, policy)).collect(),
        }
    }

    /// Replaces the policy of one condition
    pub fn with(mut self, condition: Condition, policy: ChannelPolicy) -> Self {
        self.by_condition.insert(condition, policy);
        self
    }

    pub fn policy_for(&self, condition: Condition) -> ChannelPolicy {
        self.by_condition
            .get(&condition)
            .copied()
            .unwrap_or(ChannelPolicy::Overwrite)
    }
}

impl Default for ChannelPolicies {
    fn default() -> Self {
        ChannelPolicies {
            by_condition: HashMap::from([
                (Condition::Calm, ChannelPolicy::Overwrite),
                (Condition::Happy, ChannelPolicy::Overwrite),
                (Condition::Fear, ChannelPolicy::Overwrite),
                (Condition::ScrambledOne, ChannelPolicy::Append),
                (Condition::ScrambledTwo, ChannelPolicy::Append),
            ]),
        }
    }
}

/// Names of the input fields read by the extraction.
///
/// Field names are compared after header sanitization, so E-Prime style
/// headers such as `Procedure[Block]` are matched as `ProcedureBlock`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNames {
    /// Prefix of the per-run continuous stimulus fields (`GameStim1_OnsetTime`)
    pub game_stim_prefix: String,
    /// Suffix of the continuous stimulus onset field
    pub onset_time_suffix: String,
    /// Suffix of the continuous stimulus onset-to-onset field
    pub onset_to_onset_suffix: String,
    /// Absolute time of the run's synchronization trigger (ms)
    pub trigger_wait_time: String,
    /// Field naming the procedure the row belongs to
    pub procedure_block: String,
    /// Prefix of the per-run procedure label (`ThreatReactivity1`)
    pub reactivity_label_prefix: String,
    /// Condition label field
    pub running_sub_trial: String,
    /// Position of the sub-trial within its block (1..=36)
    pub sub_trial_index: String,
    /// Absolute time of the inter-trial interval onset (ms)
    pub iti_onset_time: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            game_stim_prefix: "GameStim".to_string(),
            onset_time_suffix: "_OnsetTime".to_string(),
            onset_to_onset_suffix: "_OnsetToOnsetTime".to_string(),
            trigger_wait_time: "TriggerWAIT_RTTime".to_string(),
            procedure_block: "ProcedureBlock".to_string(),
            reactivity_label_prefix: "ThreatReactivity".to_string(),
            running_sub_trial: "RunningSubTrial".to_string(),
            sub_trial_index: "SubTrial".to_string(),
            iti_onset_time: "ReactivityITI_OnsetTime".to_string(),
        }
    }
}

impl FieldNames {
    pub fn game_stim_onset(&self, run: Run) -> String {
        format!(
            "{}{}{}",
            self.game_stim_prefix,
            run.number(),
            self.onset_time_suffix
        )
    }

    pub fn game_stim_onset_to_onset(&self, run: Run) -> String {
        format!(
            "{}{}{}",
            self.game_stim_prefix,
            run.number(),
            self.onset_to_onset_suffix
        )
    }

    /// Value of the procedure-block field for rows of `run`
    pub fn reactivity_label(&self, run: Run) -> String {
        format!("{}{}", self.reactivity_label_prefix, run.number())
    }

    /// Every field the extraction reads, in a stable order
    pub fn required(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for run in Run::ALL {
            fields.push(self.game_stim_onset(run));
            fields.push(self.game_stim_onset_to_onset(run));
        }
        fields.extend([
            self.trigger_wait_time.clone(),
            self.procedure_block.clone(),
            self.running_sub_trial.clone(),
            self.sub_trial_index.clone(),
            self.iti_onset_time.clone(),
        ]);
        fields
    }
}

/// A single column of the record table.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values; empty cells are stored as NaN
    Numeric(Array1<f64>),
    /// Text values, trimmed
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable, column-oriented view of the behavioral log.
///
/// Created once at load time. All columns have the same length, so masks
/// built from any two fields can be combined element-wise.
#[derive(Debug, Clone)]
pub struct RecordTable {
    field_names: Vec<String>,
    columns: HashMap<String, Column>,
    num_rows: usize,
}

impl RecordTable {
    /// Builds a table from named columns, checking that lengths agree.
    ///
    /// Later columns with an already used name replace the earlier one.
    pub fn from_columns<I>(columns: I) -> Result<Self, EmoError>
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut field_names = Vec::new();
        let mut by_name = HashMap::new();
        let mut num_rows = None;

        for (name, column) in columns {
            let expected = *num_rows.get_or_insert(column.len());
            if column.len() != expected {
                return Err(EmoError::RaggedTable {
                    field: name,
                    expected,
                    found: column.len(),
                });
            }
            if by_name.insert(name.clone(), column).is_none() {
                field_names.push(name);
            }
        }

        Ok(RecordTable {
            field_names,
            columns: by_name,
            num_rows: num_rows.unwrap_or(0),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Field names in input order
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Fails with the first field in `names` that the table lacks
    pub fn require_fields<S: AsRef<str>>(&self, names: &[S]) -> Result<(), EmoError> {
        match names.iter().find(|name| !self.has_field(name.as_ref())) {
            Some(missing) => Err(EmoError::MissingField(missing.as_ref().to_string())),
            None => Ok(()),
        }
    }

    pub fn column(&self, name: &str) -> Result<&Column, EmoError> {
        self.columns
            .get(name)
            .ok_or_else(|| EmoError::MissingField(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&Array1<f64>, EmoError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Text(_) => Err(EmoError::FieldType {
                field: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<&[String], EmoError> {
        match self.column(name)? {
            Column::Text(values) => Ok(values),
            Column::Numeric(_) => Err(EmoError::FieldType {
                field: name.to_string(),
                expected: "text",
            }),
        }
    }

    /// Mask of rows whose numeric field equals `value`
    pub fn numeric_equals(&self, name: &str, value: f64) -> Result<Array1<bool>, EmoError> {
        Ok(self.numeric(name)?.mapv(|x| x == value))
    }

    /// Mask of rows whose numeric field is strictly positive.
    ///
    /// NaN (an empty cell) is never positive.
    pub fn numeric_positive(&self, name: &str) -> Result<Array1<bool>, EmoError> {
        Ok(self.numeric(name)?.mapv(|x| x > 0.0))
    }

    /// Mask of rows whose text field equals `value`
    pub fn text_equals(&self, name: &str, value: &str) -> Result<Array1<bool>, EmoError> {
        Ok(self.text(name)?.iter().map(|s| s == value).collect())
    }
}

/// Element-wise AND of two masks of equal length
pub fn mask_and(a: &Array1<bool>, b: &Array1<bool>) -> Array1<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x && y)
}

/// One line of an onset file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetRow {
    /// Seconds since the run's trigger
    pub onset: f64,
    /// Seconds
    pub duration: f64,
    /// Always 1 for this task
    pub weight: u32,
}

impl OnsetRow {
    pub fn new(onset: f64, duration: f64) -> Self {
        OnsetRow {
            onset,
            duration,
            weight: 1,
        }
    }
}

/// The continuous stimulus presented once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct GameStimEvent {
    pub run: Run,
    /// Row of the record table the event was taken from
    pub row: usize,
    pub onset: f64,
    pub duration: f64,
}

impl From<&GameStimEvent> for OnsetRow {
    fn from(event: &GameStimEvent) -> Self {
        OnsetRow::new(event.onset, event.duration)
    }
}

/// One detected block of a condition within a run.
///
/// `index` is assigned in table order; the k-th block start and the k-th
/// block end share index k.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionBlock {
    pub run: Run,
    pub condition: Condition,
    pub index: usize,
    /// Row holding sub-trial 1 of the block
    pub start_row: usize,
    /// Row holding sub-trial 36 of the block
    pub end_row: usize,
    pub onset: f64,
    pub duration: f64,
}

impl From<&ConditionBlock> for OnsetRow {
    fn from(block: &ConditionBlock) -> Self {
        OnsetRow::new(block.onset, block.duration)
    }
}

/// Custom error types for the onset extraction.
#[derive(Debug)]
pub enum EmoError {
    /// The input table lacks a required field
    MissingField(String),
    /// A field holds text where numbers are needed, or the reverse
    FieldType {
        field: String,
        expected: &'static str,
    },
    /// A column's length differs from the rest of the table
    RaggedTable {
        field: String,
        expected: usize,
        found: usize,
    },
    /// A selection that must contain at least one row is empty
    EmptySelection { context: String },
    /// Block start and block end counts disagree
    MalformedBlock {
        run: Run,
        condition: Condition,
        starts: usize,
        ends: usize,
    },
    /// Writing an output channel failed
    ChannelWrite { channel: String, source: io::Error },
    /// The input file could not be parsed as tab-delimited text
    Csv(csv::Error),
    /// An I/O error occurred while reading the input
    IoError(io::Error),
}

impl fmt::Display for EmoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmoError::MissingField(name) => write!(f, "Missing field: {}", name),
            EmoError::FieldType { field, expected } => {
                write!(f, "Field {} is not {}", field, expected)
            }
            EmoError::RaggedTable {
                field,
                expected,
                found,
            } => write!(
                f,
                "Field {} has {} rows, expected {}",
                field, found, expected
            ),
            EmoError::EmptySelection { context } => write!(f, "Empty selection: {}", context),
            EmoError::MalformedBlock {
                run,
                condition,
                starts,
                ends,
            } => write!(
                f,
                "Malformed blocks for {} {}: {} block starts but {} block ends",
                run, condition, starts, ends
            ),
            EmoError::ChannelWrite { channel, source } => {
                write!(f, "Unable to write {}: {}", channel, source)
            }
            EmoError::Csv(e) => write!(f, "Input parse error: {}", e),
            EmoError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl Error for EmoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EmoError::ChannelWrite { source, .. } => Some(source),
            EmoError::Csv(e) => Some(e),
            EmoError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EmoError {
    fn from(error: io::Error) -> Self {
        EmoError::IoError(error)
    }
}

impl From<csv::Error> for EmoError {
    fn from(error: csv::Error) -> Self {
        EmoError::Csv(error)
    }
}
