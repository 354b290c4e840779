use std::path::PathBuf;
use std::process::Command;

use dem_crosscheck::{
    build_repetition_dem, compare, run, sample_syndromes, Bitstring, CrosscheckError, Decoder, DecoderConfig,
    FaultVector, GraphOracleDecoder, OutputFormat, ProcessDecoder, ProcessDecoderConfig, Result, RunConfig, Verdict,
};

fn oracle_program() -> ProcessDecoderConfig {
    ProcessDecoderConfig::new(env!("CARGO_BIN_EXE_oracle_decode"), OutputFormat::Sparse)
}

/// Process decoder whose every answer loses fault index 0
struct DropsFaultZero(ProcessDecoder);

impl Decoder for DropsFaultZero {
    fn decode_batch(&mut self, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>> {
        let faults = self.0.decode_batch(dem_text, syndromes)?;
        Ok(faults.into_iter().map(|f| FaultVector::Sparse(f.normalized().into_iter().filter(|&i| i != 0).collect())).collect())
    }

    fn name(&self) -> String {
        format!("{} minus L0", self.0.name())
    }
}

#[test]
fn rep_code_d5_full_agreement() {
    let config = RunConfig { candidate: DecoderConfig::ExternalProcess(oracle_program()), ..RunConfig::default() };
    let verdict = run(&config).unwrap();
    assert_eq!(verdict, Verdict::Pass { total: 1000 });
    assert_eq!(verdict.exit_code(), 0);
    assert_eq!(verdict.summary(), "PASS: all 1000 syndromes match!");
}

#[test]
fn induced_mismatch_reports_first_position() {
    let dem = build_repetition_dem(5, 0.1).unwrap();
    let syndromes = sample_syndromes(1000, 4, 42);
    let reference = GraphOracleDecoder.decode_batch(&dem, &syndromes).unwrap();
    let expected_first = reference.iter().position(|f| f.normalized().contains(&0)).unwrap();
    let expected_count = reference.iter().filter(|f| f.normalized().contains(&0)).count();

    let mut candidate = DropsFaultZero(ProcessDecoder::new(oracle_program()));
    let verdict = compare(&dem, &syndromes, &mut candidate, &mut GraphOracleDecoder).unwrap();
    assert_eq!(verdict.exit_code(), 1);
    match verdict {
        Verdict::ComparisonMismatch(report) => {
            assert_eq!(report.total, 1000);
            assert_eq!(report.mismatches, expected_count);
            assert_eq!(report.first.index, expected_first);
            assert_eq!(report.first.syndrome, syndromes[expected_first]);
            assert_eq!(report.first.candidate, FaultVector::Sparse(vec![]));
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn artifact_removed_after_success() {
    let mut decoder = ProcessDecoder::new(oracle_program());
    let dem = build_repetition_dem(7, 0.05).unwrap();
    let out = decoder.decode_batch(&dem, &sample_syndromes(20, 6, 1)).unwrap();
    assert_eq!(out.len(), 20);
    let artifact = decoder.last_artifact().map(PathBuf::from).unwrap();
    assert!(!artifact.exists());
}

#[test]
fn artifact_removed_after_decoder_failure() {
    let mut decoder = ProcessDecoder::new(oracle_program());
    let dem = build_repetition_dem(3, 0.1).unwrap();
    // Wider than the DEM's detector space, so the decoder program bails out
    let err = decoder.decode_batch(&dem, &[vec![true; 10]]).unwrap_err();
    match err {
        CrosscheckError::DecoderProcess { diagnostics, .. } => assert!(diagnostics.contains("syndrome has 10 bits")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!decoder.last_artifact().unwrap().exists());
}

#[test]
fn malformed_dem_is_surfaced_as_process_error() {
    let mut decoder = ProcessDecoder::new(oracle_program());
    let err = decoder.decode_batch("error(0.1) D0 D1 D2\n", &[vec![false; 3]]).unwrap_err();
    assert!(matches!(err, CrosscheckError::DecoderProcess { .. }));
    assert!(!decoder.last_artifact().unwrap().exists());
}

#[cfg(unix)]
#[test]
fn artifact_removed_after_decoder_is_killed() {
    let mut decoder = ProcessDecoder::new(ProcessDecoderConfig {
        program: PathBuf::from("sh"),
        leading_args: vec!["-c".to_string(), "kill -9 $$".to_string(), "sh".to_string()],
        output_format: OutputFormat::Sparse,
    });
    let err = decoder.decode_batch("error(0.1) D0\n", &[vec![true]]).unwrap_err();
    assert!(matches!(err, CrosscheckError::DecoderProcess { .. }));
    assert!(!decoder.last_artifact().unwrap().exists());
}

#[test]
fn all_zero_batch_decodes_to_nothing_through_the_protocol() {
    // D0 D1 both sit next to a boundary, L0 joins them
    let dem = "error(0.001) D0 D1 L0\nerror(0.3) D0 L1\nerror(0.3) D1 L2\n";
    let syndromes = vec![vec![false, false]; 25];
    let mut candidate = ProcessDecoder::new(oracle_program());
    let faults = candidate.decode_batch(dem, &syndromes).unwrap();
    assert_eq!(faults, vec![FaultVector::Sparse(vec![]); 25]);

    let verdict = compare(dem, &syndromes, &mut candidate, &mut GraphOracleDecoder).unwrap();
    assert_eq!(verdict, Verdict::Pass { total: 25 });
}

#[test]
fn likely_faults_agree_through_the_protocol() {
    // Every weight negative, so all-zero syndromes decode to L0
    let dem = build_repetition_dem(5, 0.7).unwrap();
    let syndromes = sample_syndromes(200, 4, 7);
    let mut candidate = ProcessDecoder::new(oracle_program());
    let faults = candidate.decode_batch(&dem, &[vec![false; 4]]).unwrap();
    assert_eq!(faults, vec![FaultVector::Sparse(vec![0])]);

    let verdict = compare(&dem, &syndromes, &mut candidate, &mut GraphOracleDecoder).unwrap();
    assert_eq!(verdict, Verdict::Pass { total: 200 });
}

#[test]
fn zero_width_syndromes_each_get_a_line() {
    let mut decoder = ProcessDecoder::new(oracle_program());
    let syndromes : Vec<Bitstring> = vec![vec![]; 3];
    let faults = decoder.decode_batch("error(0.1) D0 L0\n", &syndromes).unwrap();
    assert_eq!(faults, vec![FaultVector::Sparse(vec![]); 3]);
}

#[cfg(unix)]
fn dem_files_in(dir : &std::path::Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir).unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("crosscheck-") && name.ends_with(".dem")
        })
        .collect()
}

#[cfg(unix)]
#[test]
fn interrupted_harness_leaves_no_dem_behind() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::thread;
    use std::time::{Duration, Instant};

    let tmp = tempfile::tempdir().unwrap();
    let decoder = tmp.path().join("hang.sh");
    std::fs::write(&decoder, "#!/bin/sh\nexec sleep 5\n").unwrap();
    std::fs::set_permissions(&decoder, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut harness = Command::new(env!("CARGO_BIN_EXE_crosscheck"))
        .env("TMPDIR", tmp.path())
        .env("DEM_CROSSCHECK_DECODER", &decoder)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while dem_files_in(tmp.path()).is_empty() {
        assert!(harness.try_wait().unwrap().is_none(), "harness exited before starting the decoder");
        assert!(Instant::now() < deadline, "no DEM file appeared");
        thread::sleep(Duration::from_millis(20));
    }

    let kill = Command::new("kill").args(["-INT", &harness.id().to_string()]).status().unwrap();
    assert!(kill.success());
    let status = harness.wait().unwrap();
    assert_eq!(status.code(), Some(130));
    assert_eq!(dem_files_in(tmp.path()), Vec::<PathBuf>::new());
}

#[test]
fn harness_binary_exit_codes() {
    let pass = Command::new(env!("CARGO_BIN_EXE_crosscheck"))
        .env("DEM_CROSSCHECK_DECODER", env!("CARGO_BIN_EXE_oracle_decode"))
        .env("DEM_CROSSCHECK_FORMAT", "sparse")
        .output()
        .unwrap();
    assert_eq!(pass.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&pass.stdout).contains("PASS: all 1000 syndromes match!"));

    let broken = Command::new(env!("CARGO_BIN_EXE_crosscheck"))
        .env("DEM_CROSSCHECK_DECODER", "/nonexistent/decoder")
        .output()
        .unwrap();
    assert_eq!(broken.status.code(), Some(2));
}
