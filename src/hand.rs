//! Hand landmarks, and the palm detection and hand landmark networks that estimate them.
//!
//! Landmarks follow the 21-point convention of MediaPipe's [Hands] solution.
//!
//! [Hands]: https://google.github.io/mediapipe/solutions/hands

pub mod detection;
pub mod landmark;
pub mod network;
