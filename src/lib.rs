//! EyeChart is the core of a visual acuity self-test. It shows optotypes
//! (ETDRS letters or a tumbling E) sized for the viewer's live distance from
//! the screen, listens for an answer, and walks an adaptive staircase of
//! acuity levels until it can settle on a LogMAR and Snellen score.
//!
//! The pieces, leaves first:
//!
//! - [distance_tracker] smooths the jittery distances coming off a face
//!   tracker ([distance_source], [face_buffer], [dummy_tracker]).
//! - [optotype_sizer] turns an acuity level and a distance into pixels.
//! - [classifier] maps a transcript or a swipe to an answer.
//! - [staircase] decides, trial by trial, whether to stay, step, or stop.
//! - [score] turns the level the staircase stopped on into a score.
//!
//! A [session::TestSession] owns all of it for one eye and is driven purely
//! by [session::SessionEvent]s, which makes a test replayable from a script
//! ([event_decoder]). An [exam::Examination] runs the right eye and then the
//! left, and [export] writes the result out.
//!
//! The `eyechart` binary runs an exam in the terminal against a simulated
//! tracker; `monitor` plots the simulated distance stream.

#![warn(missing_docs)]
pub mod acuity;
pub mod args;
pub mod classifier;
pub mod component;
pub mod config;
pub mod distance_gate;
pub mod distance_source;
pub mod distance_tracker;
pub mod dummy_tracker;
pub mod event_decoder;
pub mod exam;
pub mod export;
pub mod face_buffer;
pub mod gui;
pub mod optotype_sizer;
pub mod score;
pub mod session;
pub mod staircase;
