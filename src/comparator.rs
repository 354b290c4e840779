use tracing::{debug, info, warn};

use crate::decoder::{Decoder, FaultVector};
use crate::error::{CrosscheckError, Result};
use crate::syndrome_sampler::{format_syndrome, Bitstring};

/// First batch position where the decoders disagreed, with their raw outputs
#[derive(Debug, Clone, PartialEq)]
pub struct Counterexample {
    pub index : usize,
    pub syndrome : Bitstring,
    pub candidate : FaultVector,
    pub reference : FaultVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MismatchReport {
    pub total : usize,
    pub mismatches : usize,
    pub first : Counterexample,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass { total : usize },
    ComparisonMismatch(MismatchReport),
}

impl Verdict {
    pub fn is_pass(self : &Self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    /// Process exit code: 0 on agreement, 1 on any mismatch
    pub fn exit_code(self : &Self) -> u8 {
        match self {
            Verdict::Pass { .. } => 0,
            Verdict::ComparisonMismatch(_) => 1,
        }
    }

    pub fn summary(self : &Self) -> String {
        match self {
            Verdict::Pass { total } => format!("PASS: all {} syndromes match!", total),
            Verdict::ComparisonMismatch(MismatchReport { total, mismatches, first }) => format!(
                "FAIL: {}/{} mismatches\n  First at {}: syn=[{}] candidate={} reference={}",
                mismatches,
                total,
                first.index,
                format_syndrome(&first.syndrome).replace(' ', ", "),
                first.candidate,
                first.reference,
            ),
        }
    }
}

/// Decode the same batch with both decoders and compare position by position
/// after normalizing each output to sorted, deduplicated fault indices.
///
/// Adapter failures abort with an error; disagreement is a [`Verdict`].
pub fn compare(
    dem_text : &str,
    syndromes : &[Bitstring],
    candidate : &mut dyn Decoder,
    reference : &mut dyn Decoder,
) -> Result<Verdict> {
    let candidate_out = decode_checked(candidate, dem_text, syndromes)?;
    let reference_out = decode_checked(reference, dem_text, syndromes)?;

    let mut mismatches = 0usize;
    let mut first = None;
    for (index, (c, r)) in candidate_out.iter().zip(reference_out.iter()).enumerate() {
        if c.normalized() == r.normalized() {
            continue;
        }
        mismatches += 1;
        if first.is_none() {
            first = Some(Counterexample {
                index,
                syndrome: syndromes[index].clone(),
                candidate: c.clone(),
                reference: r.clone(),
            });
        }
    }

    let total = syndromes.len();
    match first {
        None => {
            info!(total, "decoders agree");
            Ok(Verdict::Pass { total })
        }
        Some(first) => {
            warn!(total, mismatches, first = first.index, "decoders disagree");
            Ok(Verdict::ComparisonMismatch(MismatchReport { total, mismatches, first }))
        }
    }
}

fn decode_checked(decoder : &mut dyn Decoder, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>> {
    let name = decoder.name();
    debug!(decoder = %name, batch = syndromes.len(), "decoding batch");
    let out = decoder.decode_batch(dem_text, syndromes)?;
    if out.len() != syndromes.len() {
        return Err(CrosscheckError::process(
            format!("{} returned {} fault vectors for {} syndromes", name, out.len(), syndromes.len()),
            "",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector_error_model::build_repetition_dem;
    use crate::graph_oracle::GraphOracleDecoder;
    use crate::syndrome_sampler::sample_syndromes;

    /// Replays canned outputs
    struct Canned(Vec<FaultVector>);

    impl Decoder for Canned {
        fn decode_batch(&mut self, _ : &str, _ : &[Bitstring]) -> Result<Vec<FaultVector>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> String {
            "canned".to_string()
        }
    }

    /// Graph oracle that forgets L0 whenever the given detector fires
    struct DropsL0When(usize);

    impl Decoder for DropsL0When {
        fn decode_batch(&mut self, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>> {
            let honest = GraphOracleDecoder.decode_batch(dem_text, syndromes)?;
            Ok(honest.into_iter().zip(syndromes).map(|(faults, syndrome)| match faults {
                FaultVector::Sparse(indices) if syndrome[self.0] => FaultVector::Sparse(indices.into_iter().filter(|&i| i != 0).collect()),
                other => other,
            }).collect())
        }

        fn name(&self) -> String {
            "drops-l0".to_string()
        }
    }

    #[test]
    fn oracle_agrees_with_itself() {
        let dem = build_repetition_dem(5, 0.1).unwrap();
        let syndromes = sample_syndromes(1000, 4, 42);
        let verdict = compare(&dem, &syndromes, &mut GraphOracleDecoder, &mut GraphOracleDecoder).unwrap();
        assert_eq!(verdict, Verdict::Pass { total: 1000 });
        assert_eq!(verdict.summary(), "PASS: all 1000 syndromes match!");
        assert_eq!(verdict.exit_code(), 0);
    }

    #[test]
    fn dense_and_sparse_outputs_compare_equal() {
        let syndromes = vec![vec![true, true], vec![false, false]];
        let mut dense = Canned(vec![FaultVector::Dense(vec![1, 0, 1]), FaultVector::Dense(vec![0, 0, 0])]);
        let mut sparse = Canned(vec![FaultVector::Sparse(vec![2, 0]), FaultVector::Sparse(vec![])]);
        assert!(compare("", &syndromes, &mut dense, &mut sparse).unwrap().is_pass());
    }

    #[test]
    fn first_mismatch_is_reported_raw() {
        let syndromes = vec![vec![false, false], vec![true, true], vec![true, false], vec![true, true]];
        let mut candidate = Canned(vec![
            FaultVector::Dense(vec![0]),
            FaultVector::Dense(vec![0]),
            FaultVector::Dense(vec![0]),
            FaultVector::Dense(vec![0]),
        ]);
        let mut reference = Canned(vec![
            FaultVector::Sparse(vec![]),
            FaultVector::Sparse(vec![0]),
            FaultVector::Sparse(vec![]),
            FaultVector::Sparse(vec![0]),
        ]);
        let verdict = compare("", &syndromes, &mut candidate, &mut reference).unwrap();
        let Verdict::ComparisonMismatch(report) = &verdict else { panic!("expected mismatch, got {:?}", verdict) };
        assert_eq!(report.total, 4);
        assert_eq!(report.mismatches, 2);
        assert_eq!(report.first.index, 1);
        assert_eq!(report.first.syndrome, vec![true, true]);
        assert_eq!(report.first.candidate, FaultVector::Dense(vec![0]));
        assert_eq!(report.first.reference, FaultVector::Sparse(vec![0]));
        assert_eq!(verdict.exit_code(), 1);
        assert_eq!(verdict.summary(), "FAIL: 2/4 mismatches\n  First at 1: syn=[1, 1] candidate=[0] reference=[0]");
    }

    #[test]
    fn mutated_decoder_is_caught_at_first_affected_syndrome() {
        let dem = build_repetition_dem(5, 0.1).unwrap();
        let syndromes = sample_syndromes(1000, 4, 42);
        let expected_first = syndromes.iter().position(|s| {
            s[1] && GraphOracleDecoder.decode_batch(&dem, &[s.clone()]).unwrap()[0].normalized() == vec![0]
        });

        let verdict = compare(&dem, &syndromes, &mut DropsL0When(1), &mut GraphOracleDecoder).unwrap();
        match (verdict, expected_first) {
            (Verdict::ComparisonMismatch(report), Some(index)) => {
                assert_eq!(report.first.index, index);
                assert_eq!(report.first.candidate, FaultVector::Sparse(vec![]));
                assert_eq!(report.first.reference, FaultVector::Sparse(vec![0]));
            }
            (verdict, expected) => panic!("verdict {:?} with expected first mismatch {:?}", verdict, expected),
        }
    }

    #[test]
    fn short_output_is_an_adapter_error_not_a_mismatch() {
        let syndromes = vec![vec![false], vec![false]];
        let mut short = Canned(vec![FaultVector::Sparse(vec![])]);
        let mut full = Canned(vec![FaultVector::Sparse(vec![]), FaultVector::Sparse(vec![])]);
        assert!(matches!(compare("", &syndromes, &mut short, &mut full), Err(CrosscheckError::DecoderProcess { .. })));
    }

    #[test]
    fn all_zero_syndromes_agree_on_empty_faults() {
        for d in 2..10 {
            let dem = build_repetition_dem(d, 0.05).unwrap();
            let syndromes = vec![vec![false; d - 1]; 3];
            let out = GraphOracleDecoder.decode_batch(&dem, &syndromes).unwrap();
            assert!(out.iter().all(|f| f.normalized().is_empty()));
        }
    }
}
