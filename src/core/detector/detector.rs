//! Stack detection over the numeric frame sequence.

use super::types::*;
use crate::core::catalog::{Catalog, FileRecord};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

/// Frames sorted by number. Records without a numeric stem are not part of it.
#[derive(Debug)]
pub struct NumericSequence<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> NumericSequence<'a> {
    pub fn build(catalog: &'a Catalog) -> Self {
        let mut by_number: BTreeMap<u64, Vec<&'a FileRecord>> = BTreeMap::new();
        for record in catalog.records() {
            if let Some(number) = record.numeric_stem() {
                by_number.entry(number).or_default().push(record);
            }
        }

        Self {
            frames: by_number
                .into_iter()
                .map(|(number, records)| Frame { number, records })
                .collect(),
        }
    }

    pub fn frames(&self) -> &[Frame<'a>] {
        &self.frames
    }
}

/// Absolute distance between two timestamps in seconds
fn seconds_between(a: SystemTime, b: SystemTime) -> f64 {
    match a.duration_since(b) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => e.duration().as_secs_f64(),
    }
}

/// Finds in-camera stacks: orphan JPEGs preceded by a tight run of frames
pub struct StackDetector {
    config: DetectorConfig,
}

impl StackDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate every orphan JPEG with a numeric stem as a stack output.
    ///
    /// Outputs are visited in frame order. Frames claimed by an accepted
    /// stack, or held back by a burst rejection, are never claimed again.
    pub fn detect<'a>(
        &self,
        catalog: &'a Catalog,
        date_filter: Option<NaiveDate>,
    ) -> DetectionResult<'a> {
        let sequence = NumericSequence::build(catalog);
        let frames = sequence.frames();
        let mut claimed: HashSet<u64> = HashSet::new();
        let mut stacks = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            for output in frame.records.iter().copied() {
                if !output.is_jpeg() || catalog.has_raw(output.stem_key()) {
                    continue;
                }
                if claimed.contains(&frame.number) {
                    continue;
                }
                if let Some(date) = date_filter {
                    if output.modified_date() != Some(date) {
                        continue;
                    }
                }

                let candidate = self.evaluate(output, frame.number, &frames[..index], &claimed);

                match &candidate.verdict {
                    Verdict::Accepted => {
                        tracing::debug!(
                            output = output.file_name(),
                            inputs = candidate.input_count(),
                            "Accepted stack"
                        );
                    }
                    Verdict::Rejected(reason) => {
                        tracing::debug!(
                            output = output.file_name(),
                            inputs = candidate.input_count(),
                            reason = %reason,
                            "Rejected stack candidate"
                        );
                    }
                }

                if candidate.is_accepted() || candidate.is_burst() {
                    claimed.extend(candidate.inputs.iter().map(|f| f.number));
                    claimed.insert(frame.number);
                }
                stacks.push(candidate);
            }
        }

        DetectionResult { stacks }
    }

    /// Decide one candidate. `before` holds the frames numbered below the
    /// output, in ascending order.
    fn evaluate<'a>(
        &self,
        output: &'a FileRecord,
        output_number: u64,
        before: &[Frame<'a>],
        claimed: &HashSet<u64>,
    ) -> CandidateStack<'a> {
        let Some(output_time) = output.modified() else {
            return CandidateStack {
                output,
                inputs: Vec::new(),
                verdict: Verdict::Rejected(RejectionReason::MissingOutputTimestamp),
            };
        };

        let (mut inputs, stopped_by) = self.walk_back(output_number, output_time, before, claimed);
        inputs.reverse();

        if !inputs.is_empty() {
            let run = self.burst_run(before, claimed);
            if run.len() > self.config.max_inputs {
                let mut burst: Vec<Frame<'a>> = run.into_iter().cloned().collect();
                burst.reverse();
                return CandidateStack {
                    output,
                    verdict: Verdict::Rejected(RejectionReason::BurstDetected {
                        run_length: burst.len(),
                        max_inputs: self.config.max_inputs,
                        interval_secs: self.config.burst_interval_secs,
                    }),
                    inputs: burst,
                };
            }
        }

        let count = inputs.len();
        let verdict = if count < self.config.min_inputs {
            match stopped_by {
                WalkStop::OutputLag { seconds, .. } if count == 0 => {
                    Verdict::Rejected(RejectionReason::OutputLagExceeded {
                        lag_secs: seconds,
                        limit_secs: self.config.max_output_lag_secs,
                    })
                }
                _ => Verdict::Rejected(RejectionReason::TooFewInputs {
                    count,
                    min: self.config.min_inputs,
                    stopped_by,
                }),
            }
        } else if count > self.config.max_inputs {
            Verdict::Rejected(RejectionReason::TooManyInputs {
                count,
                max: self.config.max_inputs,
            })
        } else {
            Verdict::Accepted
        };

        CandidateStack {
            output,
            inputs,
            verdict,
        }
    }

    /// Collect input frames backward from the output, nearest first
    fn walk_back<'a>(
        &self,
        output_number: u64,
        output_time: SystemTime,
        before: &[Frame<'a>],
        claimed: &HashSet<u64>,
    ) -> (Vec<Frame<'a>>, WalkStop) {
        let mut inputs: Vec<Frame<'a>> = Vec::new();
        let mut prev_number = output_number;
        let mut prev_time = output_time;

        for frame in before.iter().rev() {
            if inputs.len() >= self.config.max_inputs {
                return (inputs, WalkStop::InputLimit);
            }
            if prev_number - frame.number > 1 {
                return (
                    inputs,
                    WalkStop::NumericGap {
                        from: prev_number,
                        to: frame.number,
                    },
                );
            }
            if claimed.contains(&frame.number) {
                return (inputs, WalkStop::AlreadyClaimed { number: frame.number });
            }
            if !frame.has_raw() {
                return (inputs, WalkStop::NotAnInput { number: frame.number });
            }
            let Some(time) = frame.time() else {
                return (inputs, WalkStop::MissingTimestamp { number: frame.number });
            };

            let gap = seconds_between(prev_time, time);
            if inputs.is_empty() {
                if gap > self.config.max_output_lag_secs {
                    return (
                        inputs,
                        WalkStop::OutputLag {
                            number: frame.number,
                            seconds: gap,
                        },
                    );
                }
            } else if gap > self.config.max_input_gap_secs {
                return (
                    inputs,
                    WalkStop::InputGap {
                        number: frame.number,
                        seconds: gap,
                    },
                );
            }

            inputs.push(frame.clone());
            prev_number = frame.number;
            prev_time = time;
        }

        let stop = if inputs.len() >= self.config.max_inputs {
            WalkStop::InputLimit
        } else {
            WalkStop::SequenceStart
        };
        (inputs, stop)
    }

    /// The unbroken tight run ending at the frame just before the output.
    ///
    /// Not capped: it keeps going while frames are adjacent, unclaimed,
    /// hold a raw file and sit within the burst interval of each other.
    fn burst_run<'b, 'a>(
        &self,
        before: &'b [Frame<'a>],
        claimed: &HashSet<u64>,
    ) -> Vec<&'b Frame<'a>> {
        let mut run: Vec<&'b Frame<'a>> = Vec::new();
        let mut prev: Option<(u64, SystemTime)> = None;

        for frame in before.iter().rev() {
            if claimed.contains(&frame.number) || !frame.has_raw() {
                break;
            }
            let Some(time) = frame.time() else {
                break;
            };
            if let Some((prev_number, prev_time)) = prev {
                if prev_number - frame.number != 1
                    || seconds_between(prev_time, time) > self.config.burst_interval_secs
                {
                    break;
                }
            }
            run.push(frame);
            prev = Some((frame.number, time));
        }

        run
    }
}

impl Default for StackDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
