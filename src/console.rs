//! Console-mode interaction driver.
//!
//! Consumes the live console stream of an instance line by line and
//! reacts to the firmware's test markers: LED-switch notifications
//! trigger a GPIO read-out, button prompts trigger a synthetic
//! press, and the sensor-ranging marker ends the session.

use std::time::Duration;

use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use uuid::Uuid;

use crate::api::{GpioBank, GpioState, LabClient};
use crate::error::LabError;

/// Ceiling on the close handshake when releasing the stream.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One pattern, three mutually exclusive capture groups. Firmware
/// console output is free text; everything the driver reacts to is
/// matched here and nowhere else.
static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Switch \S+ LED(\d)|Please press.*User (button)|\**RANGING (SENSOR)\**)")
        .expect("console line pattern")
});

/// Symbolic action derived from one console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// The firmware toggled a user LED; the number is the LED index
    /// printed by the firmware.
    LedSwitch(u8),
    /// The firmware is waiting for the user button.
    ButtonPrompt,
    /// GPIO testing is over, the firmware moved on to sensor ranging.
    RangingComplete,
}

/// Classify a complete console line into a driver action.
pub fn classify_line(line: &str) -> Option<ConsoleEvent> {
    let caps = LINE_PATTERN.captures(line)?;
    if let Some(led) = caps.get(1) {
        Some(ConsoleEvent::LedSwitch(led.as_str().parse().unwrap_or(0)))
    } else if caps.get(2).is_some() {
        Some(ConsoleEvent::ButtonPrompt)
    } else if caps.get(3).is_some() {
        Some(ConsoleEvent::RangingComplete)
    } else {
        None
    }
}

/// Accumulates decoded console chunks and yields complete
/// newline-terminated lines from the front. A chunk that ends
/// mid-line stays buffered until its terminator arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let offset = self.buf.find('\n')?;
        let line = self.buf[..offset].trim_end_matches('\r').to_string();
        self.buf.drain(..=offset);
        Some(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Streaming,
    Done,
}

pub fn led_label(bit: u8) -> &'static str {
    if bit == 0 { "off" } else { "on" }
}

/// State machine over the console byte stream. `Streaming` until the
/// ranging marker arrives, then `Done`; no further input is consumed
/// after that.
pub struct ConsoleDriver<'a> {
    client: &'a LabClient,
    instance: Uuid,
    buffer: LineBuffer,
    state: DriverState,
}

impl<'a> ConsoleDriver<'a> {
    pub fn new(client: &'a LabClient, instance: Uuid) -> Self {
        ConsoleDriver {
            client,
            instance,
            buffer: LineBuffer::default(),
            state: DriverState::Streaming,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Consume the stream until the ranging marker, the stream end,
    /// or an error. The caller owns the stream and its release.
    pub async fn drive<S>(&mut self, stream: &mut S) -> Result<(), LabError>
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        while self.state == DriverState::Streaming {
            let Some(message) = stream.next().await else {
                break;
            };
            let chunk = match message? {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Message::Close(_) => break,
                _ => continue,
            };
            self.buffer.push(&chunk);
            while self.state == DriverState::Streaming {
                let Some(line) = self.buffer.next_line() else {
                    break;
                };
                self.handle_line(&line).await?;
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), LabError> {
        println!("<< {line}");
        match classify_line(line) {
            Some(ConsoleEvent::LedSwitch(_)) => self.print_leds().await,
            Some(ConsoleEvent::ButtonPrompt) => self.press_button().await,
            Some(ConsoleEvent::RangingComplete) => {
                println!("Test completed");
                self.state = DriverState::Done;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Read the LED bank and print both user LEDs.
    async fn print_leds(&self) -> Result<(), LabError> {
        let gpios = self.client.instance_gpios(self.instance).await?;
        let bits = gpios
            .get("led")
            .and_then(|bank| bank.banks.first())
            .cloned()
            .unwrap_or_default();
        let led6 = led_label(bits.first().copied().unwrap_or(0));
        let led7 = led_label(bits.get(1).copied().unwrap_or(0));
        println!("LED6: {led6} LED7: {led7}");
        Ok(())
    }

    /// Synthetic press: button bit high, then low. Two writes, no
    /// debounce delay.
    async fn press_button(&self) -> Result<(), LabError> {
        for level in [1, 0] {
            let patch: GpioState = [("button".to_string(), GpioBank::single_bit(level))]
                .into_iter()
                .collect();
            self.client.set_instance_gpios(self.instance, &patch).await?;
        }
        Ok(())
    }
}

/// Open the instance console, drive it to completion, and release
/// the stream. The close runs on every exit path with a short
/// ceiling so a wedged peer cannot leak the socket or hang the run.
pub async fn run_console_test(client: &LabClient, instance: Uuid) -> Result<(), LabError> {
    let mut stream = client.open_console(instance).await?;
    let mut driver = ConsoleDriver::new(client, instance);
    let result = driver.drive(&mut stream).await;
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, stream.close(None)).await;
    result
}
