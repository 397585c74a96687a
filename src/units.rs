//! Unit conversions and derived ride metrics. All pure.

pub const MILES_TO_KM: f64 = 1.60934;
pub const FEET_TO_METERS: f64 = 0.3048;

/// Assumed average riding speed for the time estimate.
pub const AVG_SPEED_KMH: f64 = 25.0;

pub fn miles_to_km(miles: f64) -> f64 {
    miles * MILES_TO_KM
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_TO_METERS
}

/// Round to one decimal place (canonical precision for km distances).
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Estimated ride time in whole minutes at the assumed average speed.
pub fn estimated_time_min(distance_km: f64) -> i64 {
    (distance_km / AVG_SPEED_KMH * 60.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miles_conversion() {
        assert_eq!(round1(miles_to_km(35.0)), 56.3);
    }

    #[test]
    fn feet_conversion() {
        assert_eq!(feet_to_meters(2000.0).round(), 610.0);
    }

    #[test]
    fn time_estimate() {
        assert_eq!(estimated_time_min(50.0), 120);
        assert_eq!(estimated_time_min(0.0), 0);
        assert_eq!(estimated_time_min(25.0), 60);
    }

    #[test]
    fn round1_half_up() {
        assert_eq!(round1(56.3269), 56.3);
        assert_eq!(round1(40.25), 40.3);
    }
}
