//! Sensor-mode interaction driver.
//!
//! Deterministic round-trip check against the simulated environment
//! sensors: write a synthetic reading, read it back, compare the
//! text. Mismatches are reported and counted but never abort the
//! remaining rounds.

use std::f64::consts::PI;

use uuid::Uuid;

use crate::api::{LabClient, Peripherals};
use crate::error::LabError;

/// Phase advance between rounds.
pub const PHASE_STEP: f64 = PI / 20.0;

/// Sinusoidal synthetic sensor signal centered on the midpoint of
/// its plausible range.
#[derive(Debug, Clone, Copy)]
pub struct Waveform {
    base: f64,
    amplitude: f64,
}

impl Waveform {
    pub fn from_range(low: f64, high: f64) -> Self {
        Waveform {
            base: (low + high) / 2.0,
            amplitude: (high - low) / 2.0,
        }
    }

    pub fn value(&self, phase: f64) -> f64 {
        self.base + phase.sin() * self.amplitude
    }

    /// Reading formatted to two decimal places.
    pub fn reading(&self, phase: f64) -> String {
        format!("{:.2}", self.value(phase))
    }

    /// Reading snapped to quarter-unit steps, then formatted to two
    /// decimal places. The simulated temperature sensor only resolves
    /// quarter degrees.
    pub fn quantized_reading(&self, phase: f64) -> String {
        let snapped = (self.value(phase) * 4.0).round() * 0.25;
        format!("{snapped:.2}")
    }
}

/// Runs the write/read-back sweep over temperature, pressure and
/// humidity.
pub struct SensorCheck<'a> {
    client: &'a LabClient,
    instance: Uuid,
    rounds: usize,
}

impl<'a> SensorCheck<'a> {
    pub fn new(client: &'a LabClient, instance: Uuid) -> Self {
        SensorCheck {
            client,
            instance,
            rounds: 3,
        }
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Run all rounds; returns how many echo checks failed.
    pub async fn run(&self) -> Result<usize, LabError> {
        // Seed mid-range values before the sweep
        let seed = Peripherals {
            temperature: Some("25.0".to_string()),
            pressure: Some("1005.0".to_string()),
            humidity: Some("45.0".to_string()),
        };
        self.client
            .set_instance_peripherals(self.instance, &seed)
            .await?;

        let temperature = Waveform::from_range(20.0, 30.0);
        let pressure = Waveform::from_range(980.0, 1030.0);
        let humidity = Waveform::from_range(20.0, 70.0);

        let mut mismatches = 0;
        let mut phase = 0.0_f64;
        for round in 0..self.rounds {
            println!();
            println!("Test run {round}...");

            let t = temperature.quantized_reading(phase);
            let p = pressure.reading(phase);
            let h = humidity.reading(phase);

            println!("Setting sensor values : [*] T: {t}, P: {p}, H: {h}");
            let patch = Peripherals {
                temperature: Some(t.clone()),
                pressure: Some(p.clone()),
                humidity: Some(h.clone()),
            };
            self.client
                .set_instance_peripherals(self.instance, &patch)
                .await?;

            let echoed = self.client.instance_peripherals(self.instance).await?;
            println!(
                "Got sensor values : [*] T: {}, P: {}, H: {}",
                echoed.temperature.as_deref().unwrap_or("<missing>"),
                echoed.pressure.as_deref().unwrap_or("<missing>"),
                echoed.humidity.as_deref().unwrap_or("<missing>"),
            );

            check_echo("Temperature", &t, echoed.temperature.as_deref(), &mut mismatches);
            check_echo("Pressure", &p, echoed.pressure.as_deref(), &mut mismatches);
            check_echo("Humidity", &h, echoed.humidity.as_deref(), &mut mismatches);

            phase += PHASE_STEP;
        }

        Ok(mismatches)
    }
}

fn check_echo(sensor: &str, expected: &str, got: Option<&str>, mismatches: &mut usize) {
    let value = got.unwrap_or("<missing>");
    if value != expected {
        println!("{sensor} sensor returned bad value: {value} (set value: {expected})");
        *mismatches += 1;
    }
}
