//! ==============================================================================
//! accel.rs - mpu-6050 accelerometer maths and simulated source
//! ==============================================================================
//!
//! purpose:
//!     converts raw 16-bit register values into g / degrees, and produces the
//!     readings the server broadcasts. without hardware attached the raw
//!     registers are drawn at random.
//!
//! register scales:
//!     accel full scale ±2g -> 16384 LSB/g
//!     gyro  FS_SEL 0 ±250°/s -> 131 LSB/°/s
//!
//! ==============================================================================

use rand::Rng;
use serde::Serialize;

pub const ACCEL_SCALE_2G: f64 = 16384.0;
pub const GYRO_LSB_PER_DEG: f64 = 131.0;

/// decode a big-endian register pair read as two's complement
pub fn from_twos_complement(raw: u16) -> f64 {
    f64::from(raw as i16)
}

/// x/y/z acceleration in g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn from_raw(raw: [u16; 3]) -> Self {
        let [x, y, z] = raw.map(|r| from_twos_complement(r) / ACCEL_SCALE_2G);
        Self { x, y, z }
    }

    /// rotation about the x axis in degrees
    pub fn x_rotation(&self) -> f64 {
        self.y.atan2(self.x.hypot(self.z)).to_degrees()
    }

    /// rotation about the y axis in degrees
    pub fn y_rotation(&self) -> f64 {
        -self.x.atan2(self.y.hypot(self.z)).to_degrees()
    }
}

/// angular rate in °/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gyro {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Gyro {
    pub fn from_raw(raw: [u16; 3]) -> Self {
        let [x, y, z] = raw.map(|r| from_twos_complement(r) / GYRO_LSB_PER_DEG);
        Self { x, y, z }
    }
}

/// one broadcast frame: acceleration in g, tilt in degrees, rates in °/s
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub x_rotation: f64,
    pub y_rotation: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
}

impl Reading {
    pub fn new(acc: Acceleration, gyro: Gyro) -> Self {
        Self {
            x: acc.x,
            y: acc.y,
            z: acc.z,
            x_rotation: acc.x_rotation(),
            y_rotation: acc.y_rotation(),
            gyro_x: gyro.x,
            gyro_y: gyro.y,
            gyro_z: gyro.z,
        }
    }

    /// simulated sample: random raw registers through the real conversion
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        let accel: [u16; 3] = rng.gen();
        let gyro: [u16; 3] = rng.gen();
        Self::new(Acceleration::from_raw(accel), Gyro::from_raw(gyro))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn twos_complement_decoding() {
        assert_eq!(from_twos_complement(0x0000), 0.0);
        assert_eq!(from_twos_complement(0x7fff), 32767.0);
        assert_eq!(from_twos_complement(0xffff), -1.0);
        assert_eq!(from_twos_complement(0x8000), -32768.0);
    }

    #[test]
    fn one_g_on_z_is_level() {
        let acc = Acceleration::from_raw([0, 0, 0x4000]);
        assert!(close(acc.z, 1.0));
        assert!(close(acc.x_rotation(), 0.0));
        assert!(close(acc.y_rotation(), 0.0));
    }

    #[test]
    fn tilt_angles() {
        // y == z: 45° about x
        let acc = Acceleration { x: 0.0, y: 0.5, z: 0.5 };
        assert!(close(acc.x_rotation(), 45.0));

        // positive x tilts negative about y
        let acc = Acceleration { x: 0.5, y: 0.0, z: 0.5 };
        assert!(close(acc.y_rotation(), -45.0));
    }

    #[test]
    fn gyro_scale() {
        let gyro = Gyro::from_raw([131, 0, (-262i16) as u16]);
        assert!(close(gyro.x, 1.0));
        assert!(close(gyro.z, -2.0));
    }

    #[test]
    fn random_reading_is_in_range_and_serializes_flat() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let r = Reading::random_with(&mut rng);
            for v in [r.x, r.y, r.z] {
                assert!((-2.0..2.0).contains(&v));
            }
            assert!(r.x_rotation.abs() <= 90.0);
            assert!(r.y_rotation.abs() <= 90.0);
            // ±250°/s full scale
            for v in [r.gyro_x, r.gyro_y, r.gyro_z] {
                assert!(v.abs() <= 32768.0 / GYRO_LSB_PER_DEG);
            }
        }

        let value = serde_json::to_value(Reading::random_with(&mut rng)).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            ["x", "y", "z", "x_rotation", "y_rotation", "gyro_x", "gyro_y", "gyro_z"]
        );
    }

    #[test]
    fn reading_carries_both_sensors() {
        let r = Reading::new(
            Acceleration::from_raw([0, 0, 0x4000]),
            Gyro::from_raw([131, 0, 0]),
        );
        assert!(close(r.z, 1.0));
        assert!(close(r.gyro_x, 1.0));
        assert!(close(r.gyro_y, 0.0));
    }
}
