use emo_onsets::{run, Condition, EmoError, ExtractionConfig, Run};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const HEADER: &str = "Subject\tProcedure[Block]\tRunningSubTrial\tSubTrial\tTriggerWAIT_RTTime\tReactivityITI_OnsetTime\tGameStim1_OnsetTime\tGameStim1_OnsetToOnsetTime\tGameStim2_OnsetTime\tGameStim2_OnsetToOnsetTime";

struct RunLog {
    number: u8,
    trigger_ms: f64,
    /// Game stimulus onset and onset-to-onset interval, in ms
    game_stim: Option<(f64, f64)>,
    /// Condition label, block start and block end in seconds after the trigger
    blocks: Vec<(&'static str, f64, f64)>,
}

fn run_one() -> RunLog {
    RunLog {
        number: 1,
        trigger_ms: 52_000.0,
        game_stim: Some((5_500.0, 300_000.0)),
        blocks: vec![
            ("CalmList", 10.0, 40.0),
            ("FearList", 90.0, 120.0),
            ("HappyList", 50.0, 80.0),
            ("ScrambledListOne", 130.0, 160.0),
            ("ScrambledListTwo", 170.0, 195.0),
            ("FearList", 200.0, 230.5),
        ],
    }
}

fn run_two() -> RunLog {
    RunLog {
        number: 2,
        trigger_ms: 610_250.0,
        game_stim: Some((4_000.0, 280_000.0)),
        blocks: vec![
            ("ScrambledListTwo", 12.0, 42.0),
            ("HappyList", 45.0, 75.0),
            ("FearList", 80.0, 111.0),
            ("CalmList", 115.0, 145.0),
            ("ScrambledListOne", 150.0, 180.0),
            ("ScrambledListOne", 185.0, 214.0),
        ],
    }
}

/// Renders runs as an exported log: one game stimulus row per run followed
/// by 36 sub-trial rows per block
fn render_log(runs: &[RunLog]) -> String {
    let mut lines = vec![HEADER.to_string()];
    for run in runs {
        let procedure = format!("ThreatReactivity{}", run.number);
        let mut stim = [(0.0, 0.0), (0.0, 0.0)];

        if let Some((onset, interval)) = run.game_stim {
            stim[usize::from(run.number - 1)] = (run.trigger_ms + onset, interval);
            lines.push(format!(
                "7\tGameStimProc{}\t\t\t{}\t0\t{}\t{}\t{}\t{}",
                run.number, run.trigger_ms, stim[0].0, stim[0].1, stim[1].0, stim[1].1
            ));
        }

        for &(condition, start, end) in &run.blocks {
            for sub_trial in 1..=36u32 {
                let seconds = if sub_trial == 36 {
                    end
                } else {
                    start + f64::from(sub_trial - 1) * (end - start) / 36.0
                };
                lines.push(format!(
                    "7\t{}\t{}\t{}\t{}\t{}\t0\t0\t0\t0",
                    procedure,
                    condition,
                    sub_trial,
                    run.trigger_ms,
                    run.trigger_ms + seconds * 1000.0
                ));
            }
        }
    }
    lines.join("\n") + "\n"
}

struct Fixture {
    dir: TempDir,
    config: ExtractionConfig,
}

impl Fixture {
    fn new(runs: &[RunLog]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sub07_emo.txt");
        fs::write(&input, render_log(runs)).unwrap();
        let prefix = format!("{}/sub07_", dir.path().display());
        Fixture {
            config: ExtractionConfig::new(input, prefix),
            dir,
        }
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("sub07_{}", name))
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.output(name)).unwrap()
    }
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn writes_game_stim_and_condition_files() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    run(&fixture.config).unwrap();

    assert_eq!("5.5 300.0 1\n", fixture.read("Emo1_GameStim.txt"));
    assert_eq!("4.0 280.0 1\n", fixture.read("Emo2_GameStim.txt"));
    assert_eq!("10.0 30.0 1\n", fixture.read("Emo1_C.txt"));
    assert_eq!("50.0 30.0 1\n", fixture.read("Emo1_H.txt"));
    assert_eq!("90.0 30.0 1\n200.0 30.5 1\n", fixture.read("Emo1_F.txt"));
    assert_eq!("115.0 30.0 1\n", fixture.read("Emo2_C.txt"));
}

#[test]
fn scrambled_lists_share_one_file_per_run() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    let summary = run(&fixture.config).unwrap();

    // ScrambledListOne rows come first, then ScrambledListTwo
    assert_eq!("130.0 30.0 1\n170.0 25.0 1\n", fixture.read("Emo1_S.txt"));
    assert_eq!(
        "150.0 30.0 1\n185.0 29.0 1\n12.0 30.0 1\n",
        fixture.read("Emo2_S.txt")
    );

    for r in Run::ALL {
        let expected = summary.block_count(r, Condition::ScrambledOne)
            + summary.block_count(r, Condition::ScrambledTwo);
        let path = fixture.output(&format!("Emo{}_S.txt", r.number()));
        assert_eq!(expected, line_count(&path));
    }
}

#[test]
fn fear_file_of_run_two_holds_only_run_two_blocks() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    run(&fixture.config).unwrap();

    assert_eq!("80.0 31.0 1\n", fixture.read("Emo2_F.txt"));
}

#[test]
fn rerun_leaves_overwrite_channels_identical() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    let overwritten = [
        "Emo1_GameStim.txt",
        "Emo1_C.txt",
        "Emo1_H.txt",
        "Emo1_F.txt",
        "Emo2_GameStim.txt",
        "Emo2_C.txt",
        "Emo2_H.txt",
        "Emo2_F.txt",
    ];

    run(&fixture.config).unwrap();
    let first: Vec<Vec<u8>> = overwritten
        .iter()
        .map(|name| fs::read(fixture.output(name)).unwrap())
        .collect();
    let scrambled = line_count(&fixture.output("Emo1_S.txt"));

    run(&fixture.config).unwrap();
    let second: Vec<Vec<u8>> = overwritten
        .iter()
        .map(|name| fs::read(fixture.output(name)).unwrap())
        .collect();

    assert_eq!(first, second);
    // Append channels keep accumulating across invocations
    assert_eq!(2 * scrambled, line_count(&fixture.output("Emo1_S.txt")));
}

#[test]
fn summary_lists_blocks_in_processing_order() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    let summary = run(&fixture.config).unwrap();

    assert_eq!(2, summary.game_stims.len());
    assert_eq!(12, summary.written.len());
    assert_eq!(12, summary.blocks.len());
    assert_eq!(2, summary.block_count(Run::One, Condition::Fear));

    let first = &summary.blocks[0];
    assert_eq!((Run::One, Condition::Calm, 0), (first.run, first.condition, first.index));
    let last = summary.blocks.last().unwrap();
    assert_eq!(
        (Run::Two, Condition::ScrambledTwo, 0),
        (last.run, last.condition, last.index)
    );
}

#[test]
fn run_without_game_stimulus_fails_before_its_file() {
    let mut second = run_two();
    second.game_stim = None;
    let fixture = Fixture::new(&[run_one(), second]);

    let result = run(&fixture.config);

    match result {
        Err(EmoError::EmptySelection { context }) => assert!(context.contains("run 2")),
        other => panic!("expected an empty selection, got {:?}", other),
    }
    assert!(fixture.output("Emo1_GameStim.txt").exists());
    assert!(!fixture.output("Emo2_GameStim.txt").exists());
}

#[test]
fn missing_block_end_is_malformed() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    let log = fs::read_to_string(&fixture.config.input).unwrap();
    // Drop the last sub-trial of run 1's calm block
    let trimmed: Vec<&str> = log
        .lines()
        .filter(|line| !line.contains("ThreatReactivity1\tCalmList\t36\t"))
        .collect();
    fs::write(&fixture.config.input, trimmed.join("\n")).unwrap();

    let result = run(&fixture.config);

    assert!(matches!(
        result,
        Err(EmoError::MalformedBlock {
            run: Run::One,
            condition: Condition::Calm,
            starts: 1,
            ends: 0,
        })
    ));
}

#[test]
fn command_line_exit_status() {
    let fixture = Fixture::new(&[run_one(), run_two()]);
    let binary = env!("CARGO_BIN_EXE_emo_onsets");

    let status = Command::new(binary)
        .arg("--input")
        .arg(&fixture.config.input)
        .arg("-o")
        .arg(&fixture.config.output_prefix)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!("5.5 300.0 1\n", fixture.read("Emo1_GameStim.txt"));

    let status = Command::new(binary)
        .arg("-i")
        .arg(fixture.dir.path().join("missing.txt"))
        .arg("-o")
        .arg(&fixture.config.output_prefix)
        .status()
        .unwrap();
    assert!(!status.success());
}
