#![allow(dead_code, unused_macros)]
use simbolo::SerCurve;

/// Fraction of positions where two symbol streams differ.
macro_rules! symbol_error {
    ($thing1:expr, $thing2:expr) => {
        $thing1
            .iter()
            .cloned()
            .zip($thing2.iter().cloned())
            .map(|(t1, t2)| if t1 == t2 { 0f64 } else { 1f64 })
            .sum::<f64>()
            / $thing1.len() as f64
    };
}

/// Simulated and theoretical curves over the same sweep.
macro_rules! both_curves {
    ($config:expr) => {{
        let config = $config;
        (
            simbolo::link::simulate_ser(&config).unwrap(),
            simbolo::link::theoretical_curve(&config).unwrap(),
        )
    }};
}

pub fn within_order_of_magnitude(simulated: f64, theory: f64) -> bool {
    simulated > 0f64 && (simulated / theory).log10().abs() < 1f64
}

pub fn relative_error(simulated: f64, theory: f64) -> f64 {
    ((simulated - theory) / theory).abs()
}

pub fn assert_non_increasing(curve: &SerCurve) {
    for (w, (e, ser)) in curve.sers.windows(2).zip(curve.points()) {
        assert!(w[1] <= w[0], "SER rises after {} dB ({} -> {})", e, ser, w[1]);
    }
}

/// Print a curve next to its theory the way the sweep logs read.
pub fn report(name: &str, simulated: &SerCurve, theory: &SerCurve) {
    println!("{}:", name);
    for ((e, sim), th) in simulated.points().zip(theory.sers.iter()) {
        println!("  {:>5.1} dB  sim {:.4e}  theory {:.4e}", e, sim, th);
    }
}
