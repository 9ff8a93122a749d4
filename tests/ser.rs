use rand::{rngs::StdRng, SeedableRng};
use rstest::rstest;

#[macro_use]
mod util;

use simbolo::{
    linspace, random_symbols,
    ser::{ser_awgn, ser_rayleigh, ser_rician},
    Coherence, LinkConfig, Modem, Modulation,
};
use util::{assert_non_increasing, relative_error, report, within_order_of_magnitude};

const NUM_SYMBOLS: usize = 1_000_000;

#[rstest]
#[case("bpsk", Modulation::Psk, 2)]
#[case("qpsk", Modulation::Psk, 4)]
#[case("16-qam", Modulation::Qam, 16)]
#[case("16-psk", Modulation::Psk, 16)]
fn awgn_simulation_matches_theory(
    #[case] name: &str,
    #[case] modulation: Modulation,
    #[case] m: usize,
) {
    let config = LinkConfig::new(modulation, m)
        .with_num_symbols(NUM_SYMBOLS)
        .with_ebn0_dbs(linspace(0f64, 8f64, 5))
        .with_seed(m as u64);
    let (simulated, theory) = both_curves!(config);
    report(name, &simulated, &theory);

    for ((e, sim), th) in simulated.points().zip(theory.sers.iter()) {
        assert!(
            within_order_of_magnitude(sim, *th),
            "{} at {} dB: simulated {} theory {}",
            name,
            e,
            sim,
            th
        );
    }
    assert_non_increasing(&simulated);
    assert_non_increasing(&theory);
}

#[rstest]
#[case(Modulation::Qam, 16)]
#[case(Modulation::Qam, 64)]
#[case(Modulation::Pam, 4)]
#[case(Modulation::Psk, 8)]
fn exact_forms_are_tight(#[case] modulation: Modulation, #[case] m: usize) {
    // Square QAM and PAM are exact; 8-PSK's bound is tight at moderate SNR.
    let config = LinkConfig::new(modulation, m)
        .with_num_symbols(400_000)
        .with_ebn0_dbs([4f64, 8f64])
        .with_seed(17);
    let (simulated, theory) = both_curves!(config);

    for (sim, th) in simulated.sers.iter().zip(theory.sers.iter()) {
        assert!(relative_error(*sim, *th) < 0.1, "{} vs {}", sim, th);
    }
}

#[rstest]
#[case(Coherence::Coherent, 4)]
#[case(Coherence::Coherent, 16)]
#[case(Coherence::Noncoherent, 2)]
#[case(Coherence::Noncoherent, 8)]
fn fsk_simulation_matches_theory(#[case] coherence: Coherence, #[case] m: usize) {
    let config = LinkConfig::new(Modulation::Fsk(coherence), m)
        .with_num_symbols(100_000)
        .with_ebn0_dbs([0f64, 4f64])
        .with_seed(23);
    let (simulated, theory) = both_curves!(config);

    for (sim, th) in simulated.sers.iter().zip(theory.sers.iter()) {
        assert!(relative_error(*sim, *th) < 0.1, "{} vs {}", sim, th);
    }
}

#[rstest]
#[case(Modulation::Psk, 2)]
#[case(Modulation::Psk, 32)]
#[case(Modulation::Qam, 256)]
#[case(Modulation::Pam, 16)]
#[case(Modulation::Fsk(Coherence::Coherent), 8)]
#[case(Modulation::Fsk(Coherence::Noncoherent), 128)]
fn theory_is_monotone(#[case] modulation: Modulation, #[case] m: usize) {
    let ebn0s: Vec<f64> = linspace(-4f64, 20f64, 25).collect();
    let sers = ser_awgn(&ebn0s, modulation, m).unwrap();
    for w in sers.windows(2) {
        assert!(w[1] <= w[0]);
    }
    assert!(sers.iter().all(|&s| (0f64..=1f64).contains(&s)));

    if modulation.is_planar() {
        for faded in [
            ser_rayleigh(&ebn0s, modulation, m).unwrap(),
            ser_rician(5f64, &ebn0s, modulation, m).unwrap(),
        ] {
            for w in faded.windows(2) {
                assert!(w[1] <= w[0]);
            }
            // Fading never helps.
            for (f, a) in faded.iter().zip(sers.iter()) {
                assert!(f >= a);
            }
        }
    }
}

#[test]
fn rician_without_line_of_sight_is_rayleigh() {
    let ebn0s: Vec<f64> = linspace(0f64, 20f64, 6).collect();
    for (modulation, m) in [
        (Modulation::Psk, 2),
        (Modulation::Psk, 8),
        (Modulation::Qam, 16),
        (Modulation::Pam, 4),
    ] {
        let rayleigh = ser_rayleigh(&ebn0s, modulation, m).unwrap();
        let exact = ser_rician(f64::NEG_INFINITY, &ebn0s, modulation, m).unwrap();
        let weak = ser_rician(-40f64, &ebn0s, modulation, m).unwrap();

        for ((r, e), w) in rayleigh.iter().zip(exact.iter()).zip(weak.iter()) {
            assert!(relative_error(*e, *r) < 1e-7, "{} vs {}", e, r);
            assert!(relative_error(*w, *r) < 1e-3, "{} vs {}", w, r);
        }
    }
}

#[test]
fn detection_is_exact_without_noise() {
    let mut rng = StdRng::seed_from_u64(99);
    for (modulation, m) in [
        (Modulation::Psk, 64),
        (Modulation::Qam, 256),
        (Modulation::Pam, 32),
        (Modulation::Fsk(Coherence::Noncoherent), 64),
    ] {
        let modem = Modem::new(modulation, m).unwrap();
        let data = random_symbols(m, 5_000, &mut rng);
        let rx = modem.demodulate(&modem.modulate(&data).unwrap()).unwrap();
        assert_eq!(symbol_error!(data, rx), 0f64);
    }
}
