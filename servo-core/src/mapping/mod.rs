//! Conversion between servo angles and pulse widths.
//!
//! A plain truncating linear map loses a degree or a microsecond on almost every
//! round trip. The mapping here scales the numerator by two before dividing and
//! rounds half up, which makes `angle -> µs -> angle -> µs` reproduce the first
//! pulse width exactly for every calibration range.

use crate::channels::PulseBounds;

/// Largest commanded angle in degrees.
pub const MAX_ANGLE_DEGREES: i32 = 180;

/// Values below this threshold passed to `write` are angles, the rest are µs.
pub const ANGLE_THRESHOLD: i32 = 200;

const FIXED_HALF: i32 = 1;
const FIXED_ONE: i32 = FIXED_HALF * 2;

/// Maps `value` from `[in_min, in_max]` onto `[out_min, out_max]` with
/// fixed-point rounding.
///
/// Division truncates toward zero. An empty input range maps to `out_min`.
pub const fn symmetric_map(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let range_in = in_max - in_min;
    if range_in == 0 {
        return out_min;
    }
    let range_out = out_max - out_min;
    let delta_in = value - in_min;

    ((delta_in * range_out * FIXED_ONE) / range_in + FIXED_HALF) / FIXED_ONE + out_min
}

/// Converts an angle (clamped to `0..=180`) into a pulse width within `bounds`.
pub fn angle_to_us(degrees: i32, bounds: PulseBounds) -> u16 {
    let degrees = degrees.clamp(0, MAX_ANGLE_DEGREES);
    let micros = symmetric_map(
        degrees,
        0,
        MAX_ANGLE_DEGREES,
        i32::from(bounds.min_us),
        i32::from(bounds.max_us),
    );
    bounds.clamp(micros)
}

/// Converts a pulse width into the `0..=180` angle domain.
pub fn us_to_angle(micros: u16, bounds: PulseBounds) -> i32 {
    symmetric_map(
        i32::from(micros),
        i32::from(bounds.min_us),
        i32::from(bounds.max_us),
        0,
        MAX_ANGLE_DEGREES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min_us: u16, max_us: u16) -> PulseBounds {
        PulseBounds::clamped(min_us, max_us)
    }

    #[test]
    fn endpoints_and_midpoint_land_on_calibration() {
        let range = bounds(1_000, 2_000);
        assert_eq!(angle_to_us(0, range), 1_000);
        assert_eq!(angle_to_us(90, range), 1_500);
        assert_eq!(angle_to_us(180, range), 2_000);
    }

    #[test]
    fn angles_outside_domain_are_clamped() {
        let range = bounds(1_000, 2_000);
        assert_eq!(angle_to_us(-45, range), 1_000);
        assert_eq!(angle_to_us(199, range), 2_000);
    }

    #[test]
    fn pulse_width_survives_round_trip_for_every_angle() {
        let ranges = [
            (1_000, 2_000),
            (544, 2_400),
            (500, 2_500),
            (200, 3_000),
            (1_200, 1_250),
            (1_000, 1_001),
        ];
        for (min_us, max_us) in ranges {
            let range = bounds(min_us, max_us);
            for degrees in 0..=MAX_ANGLE_DEGREES {
                let micros = angle_to_us(degrees, range);
                let back = angle_to_us(us_to_angle(micros, range), range);
                assert_eq!(back, micros, "range {min_us}..={max_us}, angle {degrees}");
            }
        }
    }

    #[test]
    fn wide_ranges_recover_the_commanded_angle() {
        let range = bounds(544, 2_400);
        for degrees in 0..=MAX_ANGLE_DEGREES {
            assert_eq!(us_to_angle(angle_to_us(degrees, range), range), degrees);
        }
    }

    #[test]
    fn degenerate_range_maps_to_lower_bound() {
        let range = bounds(1_500, 1_500);
        assert_eq!(us_to_angle(1_500, range), 0);
        assert_eq!(angle_to_us(90, range), 1_500);
    }
}
