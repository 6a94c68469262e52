use super::CaptureDevice;
use crate::battle::state::TurnRng;
use crate::pokemon::{BattlePokemon, StatusCondition};
use serde::{Deserialize, Serialize};

pub const MAX_SHAKES: u8 = 4;
/// Critical capture chance out of 1000, before the capture charm doubles it.
pub const CRITICAL_CAPTURE_PER_MILLE: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub captured: bool,
    pub shake_count: u8,
    pub critical: bool,
}

impl CaptureOutcome {
    fn caught(shake_count: u8, critical: bool) -> Self {
        Self {
            captured: true,
            shake_count,
            critical,
        }
    }
}

/// Sleep and freeze double the catch value, any other status gives 1.5x.
pub fn status_multiplier(status: Option<StatusCondition>) -> f64 {
    match status {
        Some(StatusCondition::Sleep(_)) | Some(StatusCondition::Freeze) => 2.0,
        Some(_) => 1.5,
        None => 1.0,
    }
}

/// Modified catch value: `((3*max - 2*hp) * rate * device) / (3*max) * status`.
pub fn catch_value(target: &BattlePokemon, catch_rate: u8, device: CaptureDevice) -> f64 {
    let max_hp = target.max_hp().max(1) as f64;
    let hp = target.current_hp() as f64;
    let hp_factor = (3.0 * max_hp - 2.0 * hp) / (3.0 * max_hp);
    hp_factor * catch_rate as f64 * device.multiplier() * status_multiplier(target.status)
}

/// Threshold a 0..=65535 shake roll must stay under.
pub fn shake_threshold(catch_value: f64) -> u32 {
    if catch_value <= 0.0 {
        return 0;
    }
    (1_048_560.0 / (16_711_680.0 / catch_value).sqrt().sqrt()) as u32
}

/// Rolls a capture attempt. RNG draws, in order: the critical roll, then one
/// roll per shake until the first failure. Master devices and catch values of
/// 255 or more capture without rolling.
pub fn resolve_capture(
    target: &BattlePokemon,
    catch_rate: u8,
    device: CaptureDevice,
    capture_charm: bool,
    rng: &mut TurnRng,
) -> CaptureOutcome {
    if device == CaptureDevice::Master {
        return CaptureOutcome::caught(MAX_SHAKES, false);
    }
    let value = catch_value(target, catch_rate, device);
    if value >= 255.0 {
        return CaptureOutcome::caught(MAX_SHAKES, false);
    }

    let critical_chance = if capture_charm {
        CRITICAL_CAPTURE_PER_MILLE * 2
    } else {
        CRITICAL_CAPTURE_PER_MILLE
    };
    let critical = rng.next_in_range("critical capture", 1, 1000) <= critical_chance;
    let shakes_needed = if critical { 1 } else { MAX_SHAKES };

    let threshold = shake_threshold(value);
    let mut shake_count = 0;
    while shake_count < shakes_needed {
        if rng.next_in_range("capture shake", 0, u16::MAX) as u32 >= threshold {
            return CaptureOutcome {
                captured: false,
                shake_count,
                critical,
            };
        }
        shake_count += 1;
    }
    CaptureOutcome::caught(shake_count, critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::TestPokemonBuilder;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn full_hp_target() -> BattlePokemon {
        TestPokemonBuilder::new("growlithe", 1).wild().build()
    }

    #[rstest]
    #[case(None, 1.0)]
    #[case(Some(StatusCondition::Sleep(2)), 2.0)]
    #[case(Some(StatusCondition::Freeze), 2.0)]
    #[case(Some(StatusCondition::Paralysis), 1.5)]
    #[case(Some(StatusCondition::Toxic(3)), 1.5)]
    fn status_bonus(#[case] status: Option<StatusCondition>, #[case] expected: f64) {
        assert_eq!(status_multiplier(status), expected);
    }

    #[test]
    fn full_hp_catch_value_is_a_third_of_the_rate() {
        let value = catch_value(&full_hp_target(), 45, CaptureDevice::Basic);
        assert!((value - 15.0).abs() < 1e-9);
        assert_eq!(shake_threshold(value), 32274);
    }

    #[test]
    fn master_device_never_rolls() {
        let mut rng = TurnRng::new_for_test(vec![]);
        let outcome = resolve_capture(&full_hp_target(), 3, CaptureDevice::Master, false, &mut rng);
        assert!(outcome.captured);
    }

    #[test]
    fn first_failed_shake_stops_the_attempt() {
        // no critical, two good shakes, then a failure
        let mut rng = TurnRng::new_for_test(vec![500, 0, 0, 60000, 0]);
        let outcome = resolve_capture(&full_hp_target(), 45, CaptureDevice::Basic, false, &mut rng);
        assert_eq!(
            outcome,
            CaptureOutcome {
                captured: false,
                shake_count: 2,
                critical: false
            }
        );
    }

    #[rstest]
    #[case(false, 30, false)]
    #[case(true, 30, true)]
    fn capture_charm_doubles_critical_chance(#[case] charm: bool, #[case] roll: u16, #[case] critical: bool) {
        let mut rng = TurnRng::new_for_test(vec![roll, 0, 0, 0, 0]);
        let outcome = resolve_capture(&full_hp_target(), 45, CaptureDevice::Basic, charm, &mut rng);
        assert!(outcome.captured);
        assert_eq!(outcome.critical, critical);
        assert_eq!(outcome.shake_count, if critical { 1 } else { 4 });
    }

    #[test]
    fn capture_rate_matches_the_formula() {
        let target = full_hp_target();
        let mut rng = TurnRng::from_seed(0xC0FFEE);
        let trials = 20_000;
        let mut captured = 0;
        let mut broke_free_immediately = 0;
        for _ in 0..trials {
            let outcome = resolve_capture(&target, 45, CaptureDevice::Basic, false, &mut rng);
            if outcome.captured {
                captured += 1;
            }
            if outcome.shake_count == 0 {
                broke_free_immediately += 1;
            }
        }

        let p = shake_threshold(15.0) as f64 / 65536.0;
        let expected = 0.98 * p.powi(4) + 0.02 * p;
        let observed = captured as f64 / trials as f64;
        assert!(
            (observed - expected).abs() < 0.01,
            "observed {observed}, expected {expected}"
        );

        let first_shake_failure = broke_free_immediately as f64 / trials as f64;
        assert!((first_shake_failure - (1.0 - p)).abs() < 0.02);
    }
}
