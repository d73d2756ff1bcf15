//! End-to-end scenarios: canonical circuits with known answers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use switchsim_core::Component;
use switchsim_devices::{
    BodyDiode, Capacitor, Diode, GateDrive, Inductor, Mosfet, Resistor, VoltageSource, Waveform,
};
use switchsim_solver::{
    IntegrationMethod, SimError, SimParams, finalize, initialize_stepped, run, solve_dc,
    step_forward,
};

fn divider() -> Vec<Box<dyn Component>> {
    vec![
        Box::new(VoltageSource::dc("V1", "1", "0", 10.0)),
        Box::new(Resistor::new("R1", "1", "2", 1000.0)),
        Box::new(Resistor::new("R2", "2", "0", 1000.0)),
    ]
}

#[test]
fn voltage_divider_dc() {
    // Without the gmin leak the divider is exact.
    let mut params = SimParams::default();
    params.gmin = 0.0;

    let dc = solve_dc(&divider(), &params).unwrap();

    assert!((dc.voltage("1") - 10.0).abs() < 1e-10, "V(1) = {}", dc.voltage("1"));
    assert!((dc.voltage("2") - 5.0).abs() < 1e-10, "V(2) = {}", dc.voltage("2"));
    assert!(
        (dc.current("V1").unwrap() + 0.005).abs() < 1e-10,
        "I(V1) = {:?}",
        dc.current("V1")
    );
}

#[test]
fn dc_matches_transient_start_for_constant_sources() {
    let dc = solve_dc(&divider(), &SimParams::default()).unwrap();
    let params = SimParams::new(0.0, 10e-6, 1e-6, IntegrationMethod::BackwardEuler);
    let result = run(divider(), params).unwrap();

    let v2 = result.get_voltage("2").unwrap();
    assert!((v2[0] - dc.voltage("2")).abs() < 1e-12, "t0 point is the operating point");
    // Nothing moves in a purely resistive circuit.
    assert!((v2[v2.len() - 1] - dc.voltage("2")).abs() < 1e-9);
}

#[test]
fn rc_charging_follows_the_exponential() {
    // V1 -- 1k -- out -- 1uF to ground, charging from rest. tau = 1 ms.
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::dc("V1", "in", "0", 5.0)),
            Box::new(Resistor::new("R1", "in", "out", 1000.0)),
            Box::new(Capacitor::new("C1", "out", "0", 1e-6).with_ic(0.0)),
        ]
    };
    let params = SimParams::new(0.0, 5e-3, 100e-9, IntegrationMethod::BackwardEuler);
    let result = run(circuit(), params).unwrap();

    let time = result.get_time_vector();
    let v_out = result.get_voltage("out").unwrap();

    // V(out) at t = 1 ms = tau: 5 * (1 - e^-1) = 3.1606.
    let idx = result.index_at(1e-3).unwrap();
    assert!(
        (v_out[idx] - 3.1606).abs() < 0.05,
        "V(out) at tau = {} (expected ~3.1606)",
        v_out[idx]
    );

    // Monotone non-decreasing after the explicit-IC takeover (the t0 record
    // is the capacitor-open operating point).
    for i in 2..time.len() {
        assert!(
            v_out[i] + 1e-9 >= v_out[i - 1],
            "V(out) not monotone at step {i}: {} -> {}",
            v_out[i - 1],
            v_out[i]
        );
    }

    // 5% relative accuracy at 1, 2 and 5 tau.
    for tau_mult in [1.0, 2.0, 5.0] {
        let t = tau_mult * 1e-3;
        let idx = result.index_at(t).unwrap();
        let expected = 5.0 * (1.0 - (-tau_mult).exp());
        let rel = (v_out[idx] - expected).abs() / expected;
        assert!(
            rel < 0.05,
            "V(out) at {tau_mult} tau = {} (expected {expected}, rel err {rel})",
            v_out[idx]
        );
    }
}

#[test]
fn half_wave_rectifier_clips_negative_lobes() {
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::new("V1", "in", "0", Waveform::sin(0.0, 10.0, 1000.0))),
            Box::new(Diode::new("D1", "in", "out").with_vf(0.7)),
            Box::new(Resistor::new("R1", "out", "0", 100.0)),
        ]
    };
    let params = SimParams::new(0.0, 3e-3, 10e-6, IntegrationMethod::BackwardEuler);
    let result = run(circuit(), params).unwrap();

    let v_out = result.get_voltage("out").unwrap();
    let i_d = result.get_current("D1").unwrap();

    let mut peak = f64::NEG_INFINITY;
    for (&v, &i) in v_out.iter().zip(i_d.iter()) {
        assert!(v >= -1e-6, "rectified output went negative: {v}");
        assert!(i >= -1e-12, "diode current went negative: {i}");
        peak = peak.max(v);
    }
    // Peak: (10 - 0.7) * 100 / 100.001.
    assert!((peak - 9.3).abs() < 0.05, "peak V(out) = {peak} (expected ~9.3)");

    // The negative source lobes must be fully blocked.
    let idx = result.index_at(0.75e-3).unwrap();
    assert!(v_out[idx].abs() < 1e-6, "V(out) during negative lobe = {}", v_out[idx]);
}

#[test]
fn buck_converter_reaches_half_input() {
    // Open-loop synchronous-free buck: 24 V in, 100 kHz, D = 0.5,
    // L = 100 uH, C = 220 uF, R = 5 Ohm, warm-started near steady state.
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::dc("Vin", "in", "0", 24.0)),
            Box::new(
                Mosfet::new(
                    "M1",
                    "in",
                    "sw",
                    GateDrive::Pwm {
                        frequency: 100e3,
                        duty: 0.5,
                        delay: 0.0,
                    },
                )
                .with_ron(1e-3)
                .with_roff(1e9)
                .with_body_diode(BodyDiode { v_f: 0.7, r_on: 1e-3 }),
            ),
            Box::new(Diode::new("D1", "0", "sw").with_vf(0.7).with_ron(1e-3)),
            Box::new(Inductor::new("L1", "sw", "out", 100e-6).with_ic(2.4)),
            Box::new(Capacitor::new("C1", "out", "0", 220e-6).with_ic(12.0)),
            Box::new(Resistor::new("R1", "out", "0", 5.0)),
        ]
    };
    let params = SimParams::new(0.0, 2e-3, 100e-9, IntegrationMethod::BackwardEuler);
    let result = run(circuit(), params).unwrap();

    let time = result.get_time_vector();
    let v_out = result.get_voltage("out").unwrap();

    // Average and ripple over the last 0.5 ms (50 switching periods).
    let start = result.index_at(1.5e-3).unwrap();
    let window = &v_out[start..];
    let avg: f64 = window.iter().sum::<f64>() / window.len() as f64;
    let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = window.iter().cloned().fold(f64::INFINITY, f64::min);

    assert!(
        (11.0..=13.0).contains(&avg),
        "steady-state average V(out) = {avg} (expected 11..13)"
    );
    assert!(
        (max - min) / avg < 0.05,
        "ripple = {} (expected < 5%)",
        (max - min) / avg
    );

    // The MOSFET body diode never forward-biases in a buck.
    let i_body = result.get_current("M1:body").unwrap();
    assert!(i_body.iter().all(|&i| i < 1e-9), "body diode conducted");

    // The freewheel diode carries the inductor current during off phases.
    let i_d1 = result.get_current("D1").unwrap();
    let peak_freewheel = i_d1.iter().cloned().fold(0.0, f64::max);
    assert!(
        peak_freewheel > 1.0,
        "freewheel diode peak = {peak_freewheel} (expected amps)"
    );

    assert_eq!(time.len(), v_out.len());
}

#[test]
fn inductor_bdf2_is_stable() {
    // 24 V across L = 150 uH into 2 Ohm, i0 = 0.1 A: first-order rise toward
    // 12 A with tau = 75 us. BDF2 requested; the first step must silently run
    // Backward Euler.
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::dc("V1", "in", "0", 24.0)),
            Box::new(Inductor::new("L1", "in", "out", 150e-6).with_ic(0.1)),
            Box::new(Resistor::new("R1", "out", "0", 2.0)),
        ]
    };
    let params = SimParams::new(0.0, 50e-6, 1e-6, IntegrationMethod::Bdf2);
    let result = run(circuit(), params).unwrap();

    let i_l = result.get_current("L1").unwrap();

    // Monotone approach, no unbounded growth, no overshoot.
    for i in 2..i_l.len() {
        assert!(
            i_l[i] + 1e-9 >= i_l[i - 1],
            "I(L1) not monotone at step {i}: {} -> {}",
            i_l[i - 1],
            i_l[i]
        );
        assert!(i_l[i] <= 12.0 + 1e-6, "I(L1) overshot: {}", i_l[i]);
    }

    // Analytic endpoint: 12 - 11.9 * exp(-2/3) = 5.89.
    let i_final = *i_l.last().unwrap();
    let expected = 12.0 - 11.9 * (-50.0_f64 / 75.0).exp();
    assert!(
        (i_final - expected).abs() < 0.2,
        "I(L1) at 50 us = {i_final} (expected {expected})"
    );
}

#[test]
fn floating_subnet_survives_via_gmin() {
    // No ground reference anywhere: only the gmin leak pins the potentials.
    let comps: Vec<Box<dyn Component>> = vec![
        Box::new(VoltageSource::dc("V1", "a", "b", 5.0)),
        Box::new(Resistor::new("R1", "a", "b", 1000.0)),
    ];

    let dc = solve_dc(&comps, &SimParams::default()).unwrap();

    let diff = dc.voltage("a") - dc.voltage("b");
    assert!((diff - 5.0).abs() < 1e-6, "V(a) - V(b) = {diff}");
}

#[test]
fn diode_boundary_blocking_and_conducting() {
    let fixture = |v_bias: f64| -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::dc("V1", "in", "0", v_bias)),
            Box::new(Diode::new("D1", "in", "out").with_vf(0.7).with_ron(1e-3)),
            Box::new(Resistor::new("R1", "out", "0", 1.0)),
        ]
    };

    // Just below threshold: exactly zero current.
    let dc = solve_dc(&fixture(0.7 - 0.1), &SimParams::default()).unwrap();
    assert_eq!(dc.current("D1").unwrap(), 0.0, "blocking diode must carry I = 0");

    // Just above threshold into 1 Ohm: I = delta / (R + r_on).
    let delta = 0.1;
    let dc = solve_dc(&fixture(0.7 + delta), &SimParams::default()).unwrap();
    let expected = delta / (1.0 + 1e-3);
    assert!(
        (dc.current("D1").unwrap() - expected).abs() < 1e-9,
        "I(D1) = {:?} (expected {expected})",
        dc.current("D1")
    );
}

#[test]
fn body_diode_conducts_at_extreme_off_ratio() {
    // Drain pulled 5 V below source through 1 Ohm; gate held off with
    // r_off / r_on = 1e12. The body diode must pick up the current.
    let comps: Vec<Box<dyn Component>> = vec![
        Box::new(VoltageSource::dc("V1", "in", "0", -5.0)),
        Box::new(Resistor::new("R1", "in", "d", 1.0)),
        Box::new(
            Mosfet::new("M1", "d", "0", GateDrive::Logic(false))
                .with_ron(1e-3)
                .with_roff(1e9)
                .with_body_diode(BodyDiode { v_f: 0.7, r_on: 1e-3 }),
        ),
    ];

    let dc = solve_dc(&comps, &SimParams::default()).unwrap();

    let expected = (5.0 - 0.7) / (1.0 + 1e-3);
    let i_body = dc.current("M1:body").unwrap();
    assert!(
        (i_body - expected).abs() < 1e-5,
        "I(body) = {i_body} (expected {expected})"
    );
    // Drain sits one forward drop below the source.
    assert!((dc.voltage("d") + 0.7).abs() < 0.01, "V(d) = {}", dc.voltage("d"));
}

#[test]
fn identical_runs_are_bit_identical() {
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::new("V1", "in", "0", Waveform::sin(0.0, 10.0, 1000.0))),
            Box::new(Diode::new("D1", "in", "out").with_vf(0.7)),
            Box::new(Resistor::new("R1", "out", "0", 100.0)),
        ]
    };
    let params = SimParams::new(0.0, 1e-3, 10e-6, IntegrationMethod::BackwardEuler);

    let a = run(circuit(), params.clone()).unwrap();
    let b = run(circuit(), params).unwrap();

    assert_eq!(a.get_time_vector(), b.get_time_vector());
    assert_eq!(a.get_voltage("out").unwrap(), b.get_voltage("out").unwrap());
    assert_eq!(a.get_current("D1").unwrap(), b.get_current("D1").unwrap());
}

#[test]
fn stepped_mode_matches_batch_mode() {
    let circuit = || -> Vec<Box<dyn Component>> {
        vec![
            Box::new(VoltageSource::new("V1", "in", "0", Waveform::sin(0.0, 10.0, 1000.0))),
            Box::new(Diode::new("D1", "in", "out").with_vf(0.7)),
            Box::new(Resistor::new("R1", "out", "0", 100.0)),
        ]
    };
    let params = SimParams::new(0.0, 1e-3, 10e-6, IntegrationMethod::BackwardEuler);

    let batch = run(circuit(), params.clone()).unwrap();

    let mut ctx = initialize_stepped(circuit(), params).unwrap();
    while !ctx.is_done() {
        step_forward(&mut ctx).unwrap();
    }
    let stepped = finalize(ctx);

    assert_eq!(batch.get_time_vector(), stepped.get_time_vector());
    assert_eq!(
        batch.get_voltage("out").unwrap(),
        stepped.get_voltage("out").unwrap()
    );
}

#[test]
fn stepped_mode_allows_gate_toggling() {
    // Externally commutated switch: 12 V through the MOSFET into a 10 Ohm
    // load, toggled by the embedding code halfway through.
    let comps: Vec<Box<dyn Component>> = vec![
        Box::new(VoltageSource::dc("V1", "in", "0", 12.0)),
        Box::new(
            Mosfet::new("M1", "in", "out", GateDrive::Logic(false))
                .with_ron(1e-3)
                .with_roff(1e9),
        ),
        Box::new(Resistor::new("R1", "out", "0", 10.0)),
    ];
    let params = SimParams::new(0.0, 100e-6, 1e-6, IntegrationMethod::BackwardEuler);

    let mut ctx = initialize_stepped(comps, params).unwrap();
    for step in 0..100 {
        if step == 50 {
            ctx.component_mut::<Mosfet>("M1").unwrap().set_gate(true);
        }
        step_forward(&mut ctx).unwrap();
    }
    let result = finalize(ctx);

    let v_out = result.get_voltage("out").unwrap();
    // Points: t0 + 100 steps; gate flips effective from step index 51.
    assert!(v_out[25].abs() < 1e-3, "off phase V(out) = {}", v_out[25]);
    assert!(
        (v_out[80] - 12.0).abs() < 0.1,
        "on phase V(out) = {}",
        v_out[80]
    );
}

#[test]
fn cancellation_truncates_results() {
    let circuit: Vec<Box<dyn Component>> = vec![
        Box::new(VoltageSource::dc("V1", "in", "0", 5.0)),
        Box::new(Resistor::new("R1", "in", "out", 1000.0)),
        Box::new(Capacitor::new("C1", "out", "0", 1e-6)),
    ];
    let params = SimParams::new(0.0, 1e-3, 1e-6, IntegrationMethod::BackwardEuler);

    let flag = Arc::new(AtomicBool::new(false));
    let mut ctx = initialize_stepped(circuit, params).unwrap();
    ctx.set_cancel_flag(Arc::clone(&flag));

    for _ in 0..10 {
        step_forward(&mut ctx).unwrap();
    }
    flag.store(true, Ordering::Relaxed);
    switchsim_solver::transient::drive(&mut ctx).unwrap();
    let result = finalize(ctx);

    assert!(result.truncated, "cancelled run must be marked truncated");
    assert_eq!(result.get_time_vector().len(), 11, "t0 plus the 10 manual steps");
}

#[test]
fn invalid_inputs_rejected() {
    let bad = SimParams::new(0.0, -1.0, 1e-6, IntegrationMethod::BackwardEuler);
    let err = run(divider(), bad).unwrap_err();
    assert!(matches!(err, SimError::InvalidInput(_)));

    let dupes: Vec<Box<dyn Component>> = vec![
        Box::new(Resistor::new("R1", "a", "0", 1.0)),
        Box::new(Resistor::new("R1", "b", "0", 1.0)),
    ];
    let err = run(dupes, SimParams::default()).unwrap_err();
    assert!(matches!(err, SimError::InvalidInput(_)), "got {err}");
}

#[test]
fn statistics_count_lcp_work() {
    let circuit: Vec<Box<dyn Component>> = vec![
        Box::new(VoltageSource::new("V1", "in", "0", Waveform::sin(0.0, 10.0, 1000.0))),
        Box::new(Diode::new("D1", "in", "out").with_vf(0.7)),
        Box::new(Resistor::new("R1", "out", "0", 100.0)),
    ];
    let params = SimParams::new(0.0, 1e-3, 10e-6, IntegrationMethod::BackwardEuler);
    let result = run(circuit, params).unwrap();

    let stats = &result.info.stats;
    assert_eq!(stats.total_steps, 100);
    assert_eq!(stats.failed_steps, 0);
    assert_eq!(stats.lcp_solves, 100, "one LCP solve per step with a diode present");
    assert!(stats.lcp_iterations_max >= 1);
    assert!(stats.avg_lcp_iterations() > 0.0);
    assert_eq!(result.info.method, "backward-euler");
    assert!(result.info.execution_time >= 0.0);
}
