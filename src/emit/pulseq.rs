// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulseq 1.4.1 text writer.
//!
//! Every block carries at most one event: an RF pulse, an ADC, or nothing
//! (pure delay). RF pulses are rectangular, sampled on the RF raster as a
//! constant magnitude shape plus a phase shape. Identical events and shapes
//! are stored once and referenced by id.
//!
//! Block durations are written in units of the block raster and must be
//! integer multiples of it.

use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use super::SequenceEmitter;
use crate::config::{OutputConfig, OutputFormat};
use crate::error::{Result, ValidationError};
use crate::sequence::{Acquisition, Block, GeneratedSequence, RfPulse};

/// Shape samples are quantized to 1e-7 before compression.
const QUANT_SCALE: f64 = 1e7;

/// Allowed deviation from an integer number of raster units.
const RASTER_TOLERANCE: f64 = 1e-6;

/// Pulseq text emitter.
#[derive(Debug, Clone, Default)]
pub struct PulseqEmitter {
    output: OutputConfig,
}

impl PulseqEmitter {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    fn build(&self, sequence: &GeneratedSequence) -> Result<PulseqTables> {
        let mut tables = PulseqTables::default();

        for (i, sb) in sequence.blocks().iter().enumerate() {
            let block_number = i + 1;
            let duration = raster_units(
                block_number,
                sb.block.duration_s(),
                self.output.block_raster_s,
            )?;

            let (rf, adc) = match &sb.block {
                Block::Rf(pulse) => (self.add_rf(&mut tables, pulse), 0),
                Block::Acquisition(acq) => (0, add_adc(&mut tables, acq)),
                Block::Delay(_) => (0, 0),
            };

            tables.blocks.push(BlockRow { duration, rf, adc });
        }

        tables.total_units = tables.blocks.iter().map(|b| b.duration).sum();
        debug!(
            blocks = tables.blocks.len(),
            rf_events = tables.rf.len(),
            adc_events = tables.adc.len(),
            shapes = tables.shapes.len(),
            "Built Pulseq tables"
        );
        Ok(tables)
    }

    fn add_rf(&self, tables: &mut PulseqTables, pulse: &RfPulse) -> u32 {
        let num_samples = ((pulse.duration_s / self.output.rf_raster_s).round() as usize).max(1);

        // A negative flip is a positive amplitude with the signal phase turned by π
        let amplitude = pulse.amplitude_hz();
        let (amplitude, phase_cycles) = if amplitude < 0.0 {
            (-amplitude, 0.5)
        } else {
            (amplitude, 0.0)
        };

        let mag_id = tables.add_shape(&vec![1.0; num_samples]);
        let phase_id = tables.add_shape(&vec![phase_cycles; num_samples]);

        let event = RfEvent {
            amplitude_hz: amplitude,
            mag_id,
            phase_id,
            delay_us: 0,
            freq_hz: pulse.freq_offset_hz,
            phase_rad: pulse.phase_offset_rad,
        };
        let key = vec![
            event.amplitude_hz.to_bits(),
            u64::from(mag_id),
            u64::from(phase_id),
            event.delay_us,
            event.freq_hz.to_bits(),
            event.phase_rad.to_bits(),
        ];
        tables.rf.find_or_insert(key, event)
    }

    fn render(
        &self,
        sequence: &GeneratedSequence,
        tables: &PulseqTables,
        out: &mut dyn Write,
    ) -> Result<()> {
        writeln!(out, "# Pulseq sequence file")?;
        writeln!(out, "# Created by cest-mrf-seq {}", crate::VERSION)?;
        writeln!(out)?;

        writeln!(out, "[VERSION]")?;
        writeln!(out, "major 1")?;
        writeln!(out, "minor 4")?;
        writeln!(out, "revision 1")?;
        writeln!(out)?;

        writeln!(out, "[DEFINITIONS]")?;
        writeln!(out, "AdcRasterTime {}", self.output.adc_raster_s)?;
        writeln!(out, "BlockDurationRaster {}", self.output.block_raster_s)?;
        writeln!(out, "GradientRasterTime {}", self.output.gradient_raster_s)?;
        writeln!(out, "RadiofrequencyRasterTime {}", self.output.rf_raster_s)?;
        for (name, value) in sequence.metadata() {
            writeln!(out, "{name} {value}")?;
        }
        writeln!(
            out,
            "TotalDuration {}",
            tables.total_units as f64 * self.output.block_raster_s
        )?;
        writeln!(out)?;

        writeln!(out, "# Format of blocks:")?;
        writeln!(out, "# NUM DUR RF  GX  GY  GZ  ADC  EXT")?;
        writeln!(out, "[BLOCKS]")?;
        for (i, b) in tables.blocks.iter().enumerate() {
            writeln!(
                out,
                "{:>4} {:>7} {:>3} {:>3} {:>3} {:>3} {:>3} {:>3}",
                i + 1,
                b.duration,
                b.rf,
                0,
                0,
                0,
                b.adc,
                0
            )?;
        }
        writeln!(out)?;

        if !tables.rf.is_empty() {
            writeln!(out, "# Format of RF events:")?;
            writeln!(out, "# id amplitude mag_id phase_id time_shape_id delay freq phase")?;
            writeln!(out, "# ..        Hz   ....     ....          ....    us   Hz   rad")?;
            writeln!(out, "[RF]")?;
            for (id, rf) in tables.rf.iter() {
                writeln!(
                    out,
                    "{} {} {} {} {} {} {} {}",
                    id,
                    rf.amplitude_hz,
                    rf.mag_id,
                    rf.phase_id,
                    0,
                    rf.delay_us,
                    rf.freq_hz,
                    rf.phase_rad
                )?;
            }
            writeln!(out)?;
        }

        if !tables.adc.is_empty() {
            writeln!(out, "# Format of ADC events:")?;
            writeln!(out, "# id num dwell delay freq phase")?;
            writeln!(out, "# ..  ..    ns    us   Hz   rad")?;
            writeln!(out, "[ADC]")?;
            for (id, adc) in tables.adc.iter() {
                writeln!(
                    out,
                    "{} {} {} {} {} {}",
                    id, adc.num_samples, adc.dwell_ns, adc.delay_us, 0, 0
                )?;
            }
            writeln!(out)?;
        }

        if !tables.shapes.is_empty() {
            writeln!(out, "# Sequence Shapes")?;
            writeln!(out, "[SHAPES]")?;
            writeln!(out)?;
            for (id, shape) in tables.shapes.iter() {
                writeln!(out, "shape_id {id}")?;
                writeln!(out, "num_samples {}", shape.num_samples)?;
                for v in &shape.data {
                    writeln!(out, "{v}")?;
                }
                writeln!(out)?;
            }
        }

        Ok(())
    }
}

impl SequenceEmitter for PulseqEmitter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pulseq
    }

    fn write(&self, sequence: &GeneratedSequence, out: &mut dyn Write) -> Result<()> {
        let tables = self.build(sequence)?;
        self.render(sequence, &tables, out)
    }
}

fn add_adc(tables: &mut PulseqTables, acq: &Acquisition) -> u32 {
    let event = AdcEvent {
        num_samples: acq.num_samples,
        dwell_ns: (acq.dwell_s() * 1e9).round() as u64,
        delay_us: 0,
    };
    let key = vec![u64::from(event.num_samples), event.dwell_ns, event.delay_us];
    tables.adc.find_or_insert(key, event)
}

/// Duration as an integer count of `raster_s`.
fn raster_units(block: usize, duration_s: f64, raster_s: f64) -> Result<u64> {
    let units = duration_s / raster_s;
    let rounded = units.round();
    if rounded < 0.0 || (units - rounded).abs() > RASTER_TOLERANCE {
        return Err(ValidationError::Raster {
            block,
            duration_s,
            raster_s,
        }
        .into());
    }
    Ok(rounded as u64)
}

/// Run-length compression of a shape's quantized derivative.
///
/// A run of one value is written as `v`; a run of `n >= 2` as `v v n-2`.
/// The raw samples are kept when compression does not shorten the shape.
pub fn compress_shape(samples: &[f64]) -> Shape {
    let scaled: Vec<f64> = samples.iter().map(|s| s * QUANT_SCALE).collect();

    // Quantized derivative with the rounding error fed back so the
    // cumulative sum tracks the scaled samples.
    let mut datq = Vec::with_capacity(scaled.len());
    let mut prev = 0.0;
    for &s in &scaled {
        datq.push((s - prev).round());
        prev = s;
    }
    let mut cumsum = 0.0;
    let mut prev_err = 0.0;
    let mut datd = Vec::with_capacity(datq.len());
    for (i, (&q, &s)) in datq.iter().zip(&scaled).enumerate() {
        cumsum += q;
        let err = (s - cumsum).round();
        let correction = if i == 0 { 0.0 } else { err - prev_err };
        prev_err = err;
        datd.push(q + correction);
    }

    let mut compressed = Vec::new();
    let mut i = 0;
    while i < datd.len() {
        let value = datd[i];
        let mut run = 1;
        while i + run < datd.len() && datd[i + run] == value {
            run += 1;
        }
        let v = value / QUANT_SCALE + 0.0;
        compressed.push(v);
        if run >= 2 {
            compressed.push(v);
            compressed.push((run - 2) as f64);
        }
        i += run;
    }

    if compressed.len() < samples.len() {
        Shape {
            num_samples: samples.len(),
            data: compressed,
        }
    } else {
        Shape {
            num_samples: samples.len(),
            data: samples.iter().map(|s| s + 0.0).collect(),
        }
    }
}

/// A shape as written to `[SHAPES]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub num_samples: usize,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct BlockRow {
    duration: u64,
    rf: u32,
    adc: u32,
}

#[derive(Debug, Clone, Copy)]
struct RfEvent {
    amplitude_hz: f64,
    mag_id: u32,
    phase_id: u32,
    delay_us: u64,
    freq_hz: f64,
    phase_rad: f64,
}

#[derive(Debug, Clone, Copy)]
struct AdcEvent {
    num_samples: u32,
    dwell_ns: u64,
    delay_us: u64,
}

/// Events numbered from 1 in insertion order, deduplicated by key.
#[derive(Debug)]
struct EventLibrary<T> {
    events: Vec<T>,
    ids: HashMap<Vec<u64>, u32>,
}

impl<T> Default for EventLibrary<T> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            ids: HashMap::new(),
        }
    }
}

impl<T> EventLibrary<T> {
    fn find_or_insert(&mut self, key: Vec<u64>, event: T) -> u32 {
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        self.events.push(event);
        let id = self.events.len() as u32;
        self.ids.insert(key, id);
        id
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.events.iter().enumerate().map(|(i, e)| (i + 1, e))
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Default)]
struct PulseqTables {
    blocks: Vec<BlockRow>,
    rf: EventLibrary<RfEvent>,
    adc: EventLibrary<AdcEvent>,
    shapes: EventLibrary<Shape>,
    total_units: u64,
}

impl PulseqTables {
    fn add_shape(&mut self, samples: &[f64]) -> u32 {
        let shape = compress_shape(samples);
        let mut key = Vec::with_capacity(shape.data.len() + 1);
        key.push(shape.num_samples as u64);
        key.extend(shape.data.iter().map(|v| v.to_bits()));
        self.shapes.find_or_insert(key, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sequence::BlockSequenceAssembler;
    use crate::test_utils::{definitions, two_measurement_set};

    fn render(seq: &GeneratedSequence) -> String {
        let mut out = Vec::new();
        PulseqEmitter::default().write(seq, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sequence() -> GeneratedSequence {
        BlockSequenceAssembler::default()
            .assemble(&definitions(two_measurement_set()))
            .unwrap()
    }

    /// Data lines of a section, up to the next blank line.
    fn section<'a>(text: &'a str, header: &str) -> Vec<&'a str> {
        text.lines()
            .skip_while(|l| *l != header)
            .skip(1)
            .take_while(|l| !l.trim().is_empty())
            .collect()
    }

    fn fields(line: &str) -> Vec<&str> {
        line.split_whitespace().collect()
    }

    // =========================================================================
    // Shape compression
    // =========================================================================

    #[test]
    fn test_compress_constant_shape() {
        let shape = compress_shape(&[1.0; 100]);
        assert_eq!(shape.num_samples, 100);
        assert_eq!(shape.data, vec![1.0, 0.0, 0.0, 97.0]);

        let zeros = compress_shape(&[0.0; 5]);
        assert_eq!(zeros.data, vec![0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_compress_keeps_raw_when_not_shorter() {
        let ramp = [0.0, 0.25, 0.5, 0.75];
        let shape = compress_shape(&ramp);
        assert_eq!(shape.data, ramp.to_vec());

        let single = compress_shape(&[0.5]);
        assert_eq!(single.data, vec![0.5]);
    }

    #[test]
    fn test_compress_two_runs() {
        // five ones then five zeros -> derivative 1 0 0 0 0 -1 0 0 0 0
        let mut samples = vec![1.0; 5];
        samples.extend([0.0; 5]);
        let shape = compress_shape(&samples);
        assert_eq!(shape.num_samples, 10);
        assert_eq!(shape.data, vec![1.0, 0.0, 0.0, 2.0, -1.0, 0.0, 0.0, 2.0]);

        // the same two runs over eight samples do not shrink
        let short = compress_shape(&[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(short.data.len(), short.num_samples);
    }

    // =========================================================================
    // Raster
    // =========================================================================

    #[test]
    fn test_raster_units() {
        assert_eq!(raster_units(1, 0.98, 10e-6).unwrap(), 98_000);
        assert_eq!(raster_units(1, 0.0, 10e-6).unwrap(), 0);
        let err = raster_units(7, 12.5e-6, 10e-6).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Raster { block: 7, .. })
        ));
    }

    // =========================================================================
    // Full file
    // =========================================================================

    #[test]
    fn test_sections_present() {
        let text = render(&sequence());
        for header in ["[VERSION]", "[DEFINITIONS]", "[BLOCKS]", "[RF]", "[ADC]", "[SHAPES]"] {
            assert!(text.contains(header), "missing {header}");
        }
        assert_eq!(section(&text, "[VERSION]"), vec!["major 1", "minor 4", "revision 1"]);
    }

    #[test]
    fn test_definitions_echo_metadata() {
        let seq = sequence();
        let text = render(&seq);
        let defs = section(&text, "[DEFINITIONS]");
        assert!(defs.contains(&"BlockDurationRaster 0.00001"));
        assert!(defs.contains(&"B0 9.4"));
        assert!(defs.contains(&"offsets_ppm 0 5"));
        assert!(defs.contains(&"SLflag 1 1"));
        let id_line = format!("seq_id_string {}", seq.seq_id());
        assert!(defs.iter().any(|l| *l == id_line));
        assert!(defs.iter().any(|l| l.starts_with("TotalDuration ")));
    }

    #[test]
    fn test_blocks_table() {
        let seq = sequence();
        let text = render(&seq);
        let blocks = section(&text, "[BLOCKS]");
        assert_eq!(blocks.len(), seq.len());

        // Pre-spin-lock: 0.1 ms = 10 raster units, with an RF event
        let first = fields(blocks[0]);
        assert_eq!(first[0], "1");
        assert_eq!(first[1], "10");
        assert_ne!(first[2], "0");

        // Last block of measurement 0 is the acquisition: 1 ms, ADC only
        let adc_row = fields(blocks[9]);
        assert_eq!(adc_row[1], "100");
        assert_eq!(adc_row[2], "0");
        assert_eq!(adc_row[6], "1");

        // Recovery delay before measurement 1: 980 ms, no events
        let recovery = fields(blocks[10]);
        assert_eq!(recovery[1], "98000");
        assert!(recovery[2..].iter().all(|f| *f == "0"));
    }

    #[test]
    fn test_identical_events_share_ids() {
        let text = render(&sequence());
        let blocks = section(&text, "[BLOCKS]");
        // Pre-spin-lock of measurement 0 (block 1) and 1 (block 12)
        assert_eq!(fields(blocks[0])[2], fields(blocks[11])[2]);
        // Excitations (blocks 8 and 15)
        assert_eq!(fields(blocks[7])[2], fields(blocks[14])[2]);
        // Single ADC event
        assert_eq!(section(&text, "[ADC]"), vec!["1 1 1000000 0 0 0"]);
    }

    #[test]
    fn test_shapes_deduplicated_per_length() {
        let text = render(&sequence());
        let ids = text.lines().filter(|l| l.starts_with("shape_id ")).count();
        // sample counts 100, 2500, 200, 5000, 2100, 10000; magnitude and phase each
        assert_eq!(ids, 12);
    }

    #[test]
    fn test_rf_event_values() {
        let text = render(&sequence());
        let rf = section(&text, "[RF]");
        // Event 1 is the 90° pre-spin-lock: 2500 Hz, phase π/2, on resonance
        let first = fields(rf[0]);
        assert_eq!(first[0], "1");
        let amp: f64 = first[1].parse().unwrap();
        assert!((amp - 2500.0).abs() < 1e-9);
        assert_eq!(first[4], "0");
        assert_eq!(first[6], "0");
        let phase: f64 = first[7].parse().unwrap();
        assert!((phase - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_negative_tip_uses_phase_shape() {
        let mut set = two_measurement_set();
        set.sl_fa = Some(vec![-45.0, 90.0]);
        let seq = BlockSequenceAssembler::default()
            .assemble(&definitions(set))
            .unwrap();
        let text = render(&seq);
        let rf = section(&text, "[RF]");
        let amp: f64 = fields(rf[0])[1].parse().unwrap();
        assert!(amp > 0.0);
        // a phase shape holding 0.5 cycles exists
        assert!(text.lines().any(|l| l == "0.5"));
    }

    #[test]
    fn test_off_raster_block_fails() {
        let mut set = two_measurement_set();
        set.tp = Some(vec![0.0033, 0.01]);
        let seq = BlockSequenceAssembler::default()
            .assemble(&definitions(set))
            .unwrap();
        let mut out = Vec::new();
        let err = PulseqEmitter::default().write(&seq, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Raster { block: 2, .. })
        ));
        assert!(out.is_empty());
    }
}
