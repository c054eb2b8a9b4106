//! Defines the Component trait for work that runs off the thread owning the
//! test. Measuring distance from raw face-tracking frames is the heavy part
//! of each frame, so it runs as a component on its own thread and only the
//! resulting distances travel back to the session.

use crate::distance_source::{Centimeters, DistanceSource, Eye, FaceSample};

use log::{info, warn};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::{borrow::Cow, fmt};

/// A [Component] failed to shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// Frames arrived but none had the eyes tracked.
    NoFaceTracked {
        /// Frames received.
        samples: usize,
    },
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ComponentError::NoFaceTracked { samples } => Cow::from(format!(
                "no face tracked in {} frames",
                samples
            )),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ComponentError {}

/// A processing step that turns each input into one output.
pub trait Component: ToString {
    /// What the component consumes.
    type InData;
    /// What the component produces.
    type OutData;

    /// Converts an input of type A into an output of type B
    fn convert(&mut self, input: Self::InData) -> Self::OutData;

    /// Cleans up once the input channel closes
    fn finalize(&mut self) -> Result<(), ComponentError>;
}

/// Runs the given Component on its own thread. On receiving data of type
/// InData on the input channel, the Component converts them to data of type
/// OutData and sends it to the output channel.
pub fn run_component<C: Component + std::marker::Send + 'static>(
    mut component: Box<C>,
    input: Receiver<<C as Component>::InData>,
    output: Sender<<C as Component>::OutData>,
) -> JoinHandle<()>
where
    <C as Component>::InData: Send + 'static,
    <C as Component>::OutData: Send + 'static,
{
    thread::spawn(move || {
        while let Ok(data) = input.recv() {
            let out_data = component.convert(data);
            if let Err(error) = output.send(out_data) {
                warn!("{} : received error {}.", component.to_string(), error);
            }
        }

        if let Err(component_error) = component.finalize() {
            warn!(
                "{} : error during terminating : {component_error}.",
                component.to_string(),
            );
        }
        info!("{} : terminated.", component.to_string());
    })
}

/// Reduces face-tracking frames to the distance of the eye under test.
/// Untracked frames come out as `None`.
#[derive(Debug, Clone, Default)]
pub struct DistanceMeasurer {
    eye: Option<Eye>,
    samples: usize,
    measured: usize,
}

impl DistanceMeasurer {
    /// Measure `eye`, or both eyes averaged when `None`.
    pub fn new(eye: Option<Eye>) -> Self {
        Self {
            eye,
            samples: 0,
            measured: 0,
        }
    }
}

impl Component for DistanceMeasurer {
    type InData = FaceSample;
    type OutData = Option<Centimeters>;

    fn convert(&mut self, input: FaceSample) -> Option<Centimeters> {
        self.samples += 1;
        let distance = input.distance_cm(self.eye);
        if distance.is_some() {
            self.measured += 1;
        }
        distance
    }

    fn finalize(&mut self) -> Result<(), ComponentError> {
        info!(
            "{} : measured {} of {} frames.",
            self.to_string(),
            self.measured,
            self.samples
        );
        if self.samples > 0 && self.measured == 0 {
            return Err(ComponentError::NoFaceTracked {
                samples: self.samples,
            });
        }
        Ok(())
    }
}

impl ToString for DistanceMeasurer {
    fn to_string(&self) -> String {
        match self.eye {
            Some(eye) => format!("DistanceMeasurer({})", eye),
            None => "DistanceMeasurer(both)".to_string(),
        }
    }
}

/// The receiving end of a [DistanceMeasurer], read without blocking.
pub struct MeasuredDistances {
    rx: Receiver<Option<Centimeters>>,
}

impl MeasuredDistances {
    /// Read distances from the output of a [DistanceMeasurer].
    pub fn new(rx: Receiver<Option<Centimeters>>) -> Self {
        Self { rx }
    }
}

impl Iterator for MeasuredDistances {
    type Item = Centimeters;

    /// Next measured distance, skipping untracked frames. `None` once
    /// nothing is waiting.
    fn next(&mut self) -> Option<Centimeters> {
        loop {
            match self.rx.try_recv() {
                Ok(Some(cm)) => return Some(cm),
                Ok(None) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl DistanceSource for MeasuredDistances {
    fn clear(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
