//! Status display lines for the USB debug stream.
//!
//! Numbers are printed fixed-point with three truncated decimals, without
//! going through float formatting. Each row fits one 64-byte CDC packet.

use core::fmt::{self, Write};

use crate::state::AttitudeReport;

pub const LINE_CAPACITY: usize = 64;
pub type Line = heapless::String<LINE_CAPACITY>;

pub const ROW_COUNT: usize = 7;

/// `f32` shown as `[-]int.ddd`, truncated toward zero.
#[derive(Clone, Copy, Debug)]
pub struct Fixed(pub f32);

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("nan");
        }
        if v.is_infinite() {
            return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
        }
        let a = if v < 0.0 { -v } else { v };
        let whole = a as u32;
        let frac = (((a - whole as f32) * 1000.0) as u32).min(999);
        let sign = if v < 0.0 && (whole > 0 || frac > 0) { "-" } else { "" };
        write!(f, "{}{}.{:03}", sign, whole, frac)
    }
}

fn vec_row(line: &mut Line, tag: &str, v: &[f32], scale: f32) -> fmt::Result {
    line.push_str(tag).map_err(|_| fmt::Error)?;
    for x in v {
        write!(line, " {}", Fixed(x * scale))?;
    }
    line.push_str("\r\n").map_err(|_| fmt::Error)
}

/// One row of the status table. Rows past `ROW_COUNT` are empty.
///
/// Fails only if the row outgrows `LINE_CAPACITY`.
pub fn format_row(report: &AttitudeReport, row: usize) -> Result<Line, fmt::Error> {
    let mut line = Line::new();
    let s = &report.sample;
    let deg = 180.0 / core::f32::consts::PI;
    match row {
        0 => vec_row(&mut line, "[ACC]", &s.accel, 1.0),
        1 => vec_row(&mut line, "[GYR]", &s.gyro, 1.0),
        // tesla → microtesla
        2 => vec_row(&mut line, "[MAG]", &s.mag, 1.0e6),
        3 => vec_row(&mut line, "[EUL]", &report.eulers, deg),
        4 => vec_row(&mut line, "[QUA]", &report.quaternion, 1.0),
        5 => write!(
            line,
            "[SET] t={} r={} p={} y={}\r\n",
            Fixed(report.desired_thrust),
            Fixed(report.desired_attitude[0] * deg),
            Fixed(report.desired_attitude[1] * deg),
            Fixed(report.desired_attitude[2] * deg),
        ),
        6 => write!(
            line,
            "[ESC] {} {} {} {} div={} rej={}\r\n",
            Fixed(report.duty[0]),
            Fixed(report.duty[1]),
            Fixed(report.duty[2]),
            Fixed(report.duty[3]),
            report.divergence_resets,
            report.rejected_samples,
        ),
        _ => Ok(()),
    }?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SensorSample;

    fn fixed(v: f32) -> heapless::String<32> {
        let mut s = heapless::String::new();
        write!(s, "{}", Fixed(v)).unwrap();
        s
    }

    #[test]
    fn fixed_point_truncates_and_keeps_sign() {
        assert_eq!(fixed(1.5).as_str(), "1.500");
        assert_eq!(fixed(-0.25).as_str(), "-0.250");
        assert_eq!(fixed(12.125).as_str(), "12.125");
        assert_eq!(fixed(-3.0).as_str(), "-3.000");
        assert_eq!(fixed(0.0).as_str(), "0.000");
        // below the last digit: no stray minus
        assert_eq!(fixed(-0.0004).as_str(), "0.000");
        assert_eq!(fixed(f32::NAN).as_str(), "nan");
        assert_eq!(fixed(f32::NEG_INFINITY).as_str(), "-inf");
    }

    #[test]
    fn rows_render_units() {
        let report = AttitudeReport {
            sample: SensorSample {
                accel: [0.0, 0.5, 9.75],
                gyro: [0.0; 3],
                // 2^-15 T and -2^-14 T: exact in f32, and exact after ×1e6
                mag: [3.0517578125e-5, 0.0, -6.103515625e-5],
            },
            eulers: [0.5, -1.0, 0.0],
            quaternion: [1.0, 0.0, 0.0, 0.0],
            desired_thrust: 0.3,
            desired_attitude: [0.1, 0.0, 0.0],
            duty: [0.5, 0.625, 0.75, 1.0],
            divergence_resets: 1,
            rejected_samples: 4,
            ..AttitudeReport::default()
        };

        let row = |n| format_row(&report, n).unwrap();
        assert_eq!(row(0).as_str(), "[ACC] 0.000 0.500 9.750\r\n");
        assert_eq!(row(2).as_str(), "[MAG] 30.517 0.000 -61.035\r\n");
        // 28.6479 and -57.2958 degrees, well clear of a digit boundary
        assert_eq!(row(3).as_str(), "[EUL] 28.647 -57.295 0.000\r\n");
        assert_eq!(row(4).as_str(), "[QUA] 1.000 0.000 0.000 0.000\r\n");
        assert_eq!(row(5).as_str(), "[SET] t=0.300 r=5.729 p=0.000 y=0.000\r\n");
        assert_eq!(row(6).as_str(), "[ESC] 0.500 0.625 0.750 1.000 div=1 rej=4\r\n");
        assert!(row(ROW_COUNT).is_empty());
    }

    #[test]
    fn worst_case_rows_fit_one_packet() {
        let big = -999.999;
        let report = AttitudeReport {
            sample: SensorSample {
                accel: [big; 3],
                gyro: [big; 3],
                mag: [-9.99e-4; 3],
            },
            eulers: [-3.14159; 3],
            quaternion: [-0.999; 4],
            desired_thrust: 1.2,
            desired_attitude: [-0.15; 3],
            duty: [1.0; 4],
            divergence_resets: u32::MAX,
            rejected_samples: u32::MAX,
        };
        for row in 0..ROW_COUNT {
            let line = format_row(&report, row).unwrap();
            assert!(line.ends_with("\r\n"), "row {} truncated: {}", row, line);
        }
    }

    #[test]
    fn overflowing_row_is_an_error() {
        // four ten-digit duties plus both counters exceed one packet
        let report = AttitudeReport {
            duty: [-4.0e9; 4],
            divergence_resets: u32::MAX,
            rejected_samples: u32::MAX,
            ..AttitudeReport::default()
        };
        assert_eq!(format_row(&report, 6), Err(fmt::Error));
    }
}
