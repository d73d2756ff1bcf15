//! Source waveforms: DC, SIN, PULSE.

use std::f64::consts::TAU;

/// Time-dependent source value.
///
/// These are the only time-varying primitives the transient driver evaluates;
/// the driver calls [`Waveform::value_at`] through `update_time_varying`
/// before each step is stamped.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant value.
    Dc(f64),
    /// `offset + amplitude * sin(2π * frequency * (t - delay))` for
    /// `t >= delay`; `offset` before that.
    Sin {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        delay: f64,
    },
    /// SPICE-style trapezoidal pulse train.
    Pulse {
        v1: f64,
        v2: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        width: f64,
        period: f64,
    },
}

impl Waveform {
    pub fn dc(value: f64) -> Self {
        Waveform::Dc(value)
    }

    pub fn sin(offset: f64, amplitude: f64, frequency: f64) -> Self {
        Waveform::Sin {
            offset,
            amplitude,
            frequency,
            delay: 0.0,
        }
    }

    pub fn sin_delayed(offset: f64, amplitude: f64, frequency: f64, delay: f64) -> Self {
        Waveform::Sin {
            offset,
            amplitude,
            frequency,
            delay,
        }
    }

    pub fn pulse(v1: f64, v2: f64, delay: f64, rise: f64, fall: f64, width: f64, period: f64) -> Self {
        Waveform::Pulse {
            v1,
            v2,
            delay,
            rise,
            fall,
            width,
            period,
        }
    }

    /// Instantaneous value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        match *self {
            Waveform::Dc(value) => value,
            Waveform::Sin {
                offset,
                amplitude,
                frequency,
                delay,
            } => {
                if t < delay {
                    offset
                } else {
                    offset + amplitude * (TAU * frequency * (t - delay)).sin()
                }
            }
            Waveform::Pulse {
                v1,
                v2,
                delay,
                rise,
                fall,
                width,
                period,
            } => {
                if t < delay {
                    return v1;
                }
                let mut tau = t - delay;
                if period > 0.0 {
                    tau %= period;
                }
                if tau < rise {
                    if rise <= 0.0 {
                        v2
                    } else {
                        v1 + (v2 - v1) * tau / rise
                    }
                } else if tau < rise + width {
                    v2
                } else if tau < rise + width + fall {
                    if fall <= 0.0 {
                        v1
                    } else {
                        v2 + (v1 - v2) * (tau - rise - width) / fall
                    }
                } else {
                    v1
                }
            }
        }
    }

    /// Whether the value actually depends on time.
    pub fn is_time_varying(&self) -> bool {
        !matches!(self, Waveform::Dc(_))
    }

    /// All numeric fields, for parameter validation.
    pub fn params(&self) -> Vec<f64> {
        match *self {
            Waveform::Dc(value) => vec![value],
            Waveform::Sin {
                offset,
                amplitude,
                frequency,
                delay,
            } => vec![offset, amplitude, frequency, delay],
            Waveform::Pulse {
                v1,
                v2,
                delay,
                rise,
                fall,
                width,
                period,
            } => vec![v1, v2, delay, rise, fall, width, period],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_is_constant() {
        let w = Waveform::dc(5.0);
        assert_eq!(w.value_at(0.0), 5.0);
        assert_eq!(w.value_at(1.0), 5.0);
        assert!(!w.is_time_varying());
    }

    #[test]
    fn test_sin_basic() {
        // SIN(0 10 1000): zero at t = 0, peak 10 at quarter period.
        let w = Waveform::sin(0.0, 10.0, 1000.0);
        assert!(w.value_at(0.0).abs() < 1e-12);
        assert!(
            (w.value_at(0.25e-3) - 10.0).abs() < 1e-9,
            "peak = {} (expected 10)",
            w.value_at(0.25e-3)
        );
        assert!((w.value_at(0.75e-3) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sin_holds_offset_before_delay() {
        let w = Waveform::sin_delayed(1.0, 10.0, 1000.0, 1e-3);
        assert_eq!(w.value_at(0.5e-3), 1.0);
        assert!(w.value_at(1e-3 + 0.25e-3) > 10.9);
    }

    #[test]
    fn test_pulse_edges() {
        // PULSE(0 5 1u 1u 1u 3u 10u)
        let w = Waveform::pulse(0.0, 5.0, 1e-6, 1e-6, 1e-6, 3e-6, 10e-6);
        assert_eq!(w.value_at(0.0), 0.0, "before delay");
        assert!((w.value_at(1.5e-6) - 2.5).abs() < 1e-9, "mid-rise");
        assert_eq!(w.value_at(3e-6), 5.0, "flat top");
        assert!((w.value_at(5.5e-6) - 2.5).abs() < 1e-9, "mid-fall");
        assert_eq!(w.value_at(8e-6), 0.0, "back at v1");
    }

    #[test]
    fn test_pulse_is_periodic() {
        let w = Waveform::pulse(0.0, 5.0, 0.0, 1e-6, 1e-6, 3e-6, 10e-6);
        assert!((w.value_at(2e-6) - w.value_at(12e-6)).abs() < 1e-12);
        assert!((w.value_at(2e-6) - w.value_at(102e-6)).abs() < 1e-12);
    }

    #[test]
    fn test_pulse_zero_rise_fall() {
        let w = Waveform::pulse(0.0, 1.0, 0.0, 0.0, 0.0, 5e-6, 10e-6);
        assert_eq!(w.value_at(1e-6), 1.0);
        assert_eq!(w.value_at(6e-6), 0.0);
    }
}
