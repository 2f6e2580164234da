//! Listen command implementation

use super::{describe_frame, power_down, power_up};
use crate::backends::Link;
use std::error::Error;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

/// How often the loop wakes up to check for a fault
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Print inbound frames until `count` frames or `duration` have passed
///
/// With neither limit the command runs until interrupted.
pub fn run_listen(
    mut link: Link,
    count: Option<usize>,
    duration: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let frames = power_up(&mut link)?;
    let deadline = duration.map(|d| Instant::now() + d);
    let mut received = 0usize;

    println!("Listening...");
    while count.map_or(true, |n| received < n) {
        let timeout = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) => left.min(POLL_INTERVAL),
                None => break,
            },
            None => POLL_INTERVAL,
        };

        match frames.recv_timeout(timeout) {
            Ok(frame) => {
                received += 1;
                println!("{}", describe_frame(&frame));
                link.transport.resume();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(fault) = link.transport.fault() {
            return Err(format!("transport halted: {}", fault).into());
        }
    }

    power_down(&mut link)?;
    println!("Received {} frame(s)", received);
    Ok(())
}
